//! Reply and unsolicited-message framing.
//!
//! All text leaving the modem goes through one of two paths: the reply to
//! the command currently in flight, or an unsolicited notification. Both are
//! delivered through the consumer-supplied callback as a single body followed
//! by a bare `"\r"`; replies additionally get `"\rOK"` appended unless the
//! body already carries its own completion.
use std::sync::Mutex;

/// Emits framed lines through the consumer callback.
///
/// The scratch buffer is a single-writer resource: the mutex is held across
/// the callback invocation, so unsolicited emissions can never interleave
/// with reply bytes. The cooperative scheduling model makes contention
/// impossible today; the barrier is kept for a threaded transport.
pub(crate) struct Framer {
    buff: Mutex<String>,
    func: Box<dyn Fn(&str)>,
}

impl Framer {
    pub(crate) fn new(func: Box<dyn Fn(&str)>) -> Framer {
        Framer {
            buff: Mutex::new(String::with_capacity(1024)),
            func,
        }
    }

    /// Sends `body` as the reply to the command in flight.
    pub(crate) fn reply(&self, body: &str) {
        let mut buff = self.buff.lock().unwrap();
        buff.clear();
        buff.push_str(body);
        let complete = buff.starts_with("> ")
            || buff.starts_with("OK")
            || buff.starts_with("ERROR")
            || buff.starts_with("+CME ERROR");
        if !complete {
            buff.push_str("\rOK");
        }
        debug!(">> {}", quote(&buff));
        (self.func)(&buff);
        (self.func)("\r");
    }

    /// Sends `body` as an unsolicited notification, verbatim.
    pub(crate) fn unsol(&self, body: &str) {
        // The lock itself is the point: no interleaving with reply bytes.
        let _buff = self.buff.lock().unwrap();
        debug!(">> {}", quote(body));
        (self.func)(body);
        (self.func)("\r");
    }
}

/// Renders control characters visibly for log output.
pub(crate) fn quote(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.bytes() {
        match c {
            b'\r' => out.push_str("<CR>"),
            b'\n' => out.push_str("<LF>"),
            32...126 => out.push(c as char),
            c => out.push_str(&format!("\\x{:02x}", c)),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collect() -> (Framer, Rc<RefCell<Vec<String>>>) {
        let sink = Rc::new(RefCell::new(vec![]));
        let s2 = sink.clone();
        let framer = Framer::new(Box::new(move |s| s2.borrow_mut().push(s.to_owned())));
        (framer, sink)
    }

    #[test]
    fn reply_appends_ok() {
        let (f, sink) = collect();
        f.reply("+CSQ: 7,99");
        assert_eq!(*sink.borrow(), vec!["+CSQ: 7,99\rOK".to_owned(), "\r".to_owned()]);
    }
    #[test]
    fn reply_passes_completions_through() {
        for body in &["OK", "ERROR: UNSUPPORTED", "+CME ERROR: 3", "> "] {
            let (f, sink) = collect();
            f.reply(body);
            assert_eq!(*sink.borrow(), vec![body.to_string(), "\r".to_owned()]);
        }
    }
    #[test]
    fn reply_completes_cms_errors() {
        // "+CMS ERROR" is deliberately not in the completion set.
        let (f, sink) = collect();
        f.reply("+CMS ERROR: 304");
        assert_eq!(sink.borrow()[0], "+CMS ERROR: 304\rOK");
    }
    #[test]
    fn unsol_is_verbatim() {
        let (f, sink) = collect();
        f.unsol("RING\r");
        assert_eq!(*sink.borrow(), vec!["RING\r".to_owned(), "\r".to_owned()]);
    }
    #[test]
    fn quoting() {
        assert_eq!(quote("a\r\n\x01"), "a<CR><LF>\\x01");
    }
}
