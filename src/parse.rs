use crate::at::*;
use crate::errors::{ModemError, ModemResult};
use encoding::{Encoding, DecoderTrap};
use encoding::all::ASCII;

named!(pub parse_string(&[u8]) -> String,
       map_res!(
           delimited!(
               tag!("\""),
               take_until!("\""),
               tag!("\"")
           ),
           |data| {
               ASCII.decode(data, DecoderTrap::Replace)
           }
       )
);
named!(pub parse_integer(&[u8]) -> u32,
       map_res!(
           many1!(
               one_of!("0123456789")
           ),
           |data: Vec<char>| {
               let st: String = data.into_iter().collect();
               st.parse()
           }
       )
);
named!(pub parse_unknown(&[u8]) -> String,
       map!(
           many1!(none_of!(",")),
           |data| {
               data.into_iter().collect()
           }
       )
);
named!(pub parse_empty(&[u8]) -> (),
       value!(())
);
named!(pub parse_single_value(&[u8]) -> AtValue,
       alt_complete!(
           map!(parse_string, |s| AtValue::String(s.into())) |
           map!(parse_integer, |i| AtValue::Integer(i)) |
           map!(parse_unknown, |u| AtValue::Unknown(u.into())) |
           map!(parse_empty, |_| AtValue::Empty)
       )
);
named!(pub parse_value(&[u8]) -> AtValue,
       map!(
           do_parse!(
               first: parse_single_value >>
               others: many0!(
                   preceded!(
                       tag!(","),
                       parse_single_value
                   )
               ) >>
               (first, others)
           ),
           |(first, others)| {
               if others.len() == 0 {
                   first
               }
               else {
                   let mut ret = vec![first];
                   ret.extend(others);
                   AtValue::Array(ret)
               }
           }
       )
);
/// Parses the parameter tail of an `AT<cmd>=<params>` command.
///
/// The whole input must be consumed; trailing junk is a parse error, which
/// handlers report as `+CME ERROR: 50`.
pub fn parse_params(input: &str) -> ModemResult<AtValue> {
    use nom::IResult;
    match parse_value(input.as_bytes()) {
        IResult::Done(rest, value) => {
            if rest.is_empty() {
                Ok(value)
            }
            else {
                Err(ModemError::ParseError(::nom::ErrorKind::Eof))
            }
        },
        IResult::Error(_) => Err(ModemError::ParseError(::nom::ErrorKind::Custom(0))),
        IResult::Incomplete(_) => Err(ModemError::ParseError(::nom::ErrorKind::Complete)),
    }
}
/// Parses a decimal integer that may carry a leading `+`, consuming the whole
/// input. Used for phone-number digits and bareword numerics.
pub fn parse_decimal(input: &str) -> Option<i64> {
    let digits = if input.starts_with('+') { &input[1..] } else { input };
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::at::AtValue::*;
    #[test]
    fn value_string() {
        assert_eq!(parse_string(b"\"testing\"").unwrap(),
                   (&[] as &[_], "testing".into()));
        assert_eq!(parse_value(b"\"testing\"").unwrap(),
                   (&[] as &[_], AtValue::String("testing".into())));
    }
    #[test]
    fn value_integer() {
        assert_eq!(parse_integer(b"9001").unwrap(),
                   (&[] as &[_], 9001));
        assert_eq!(parse_value(b"9001").unwrap(),
                   (&[] as &[_], AtValue::Integer(9001)));
    }
    #[test]
    fn value_empty() {
        assert_eq!(parse_empty(b"").unwrap(),
                   (&[] as &[_], ()));
        assert_eq!(parse_value(b"").unwrap(),
                   (&[] as &[_], AtValue::Empty));
    }
    #[test]
    fn value_unknown() {
        assert_eq!(parse_unknown(b"SIM PIN").unwrap(),
                   (&[] as &[_], "SIM PIN".into()));
        assert_eq!(parse_value(b"SIM PIN").unwrap(),
                   (&[] as &[_], AtValue::Unknown("SIM PIN".into())));
    }
    #[test]
    fn value_complex() {
        assert_eq!(
            parse_params("1,\"IP\",\"internet\",,0").unwrap(),
            Array(vec![
                Integer(1),
                String("IP".into()),
                String("internet".into()),
                Empty,
                Integer(0),
            ])
        )
    }
    #[test]
    fn params_trailing_junk() {
        assert!(parse_params("3,\"a\"b").is_err());
    }
    #[test]
    fn decimal() {
        assert_eq!(parse_decimal("+15558"), Some(15558));
        assert_eq!(parse_decimal("15558"), Some(15558));
        assert_eq!(parse_decimal("15558;"), None);
        assert_eq!(parse_decimal(""), None);
    }
}
