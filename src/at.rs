//! Types for dealing with AT commands and their parameters.
use std::fmt;
use crate::errors::{ModemError, ModemResult};

/// Any of a set of types used in AT command parameter lists.
#[derive(Debug, Clone, PartialEq, Eq, is_enum_variant)]
pub enum AtValue {
    /// A string-type value - text surrounded by "quotation marks".
    String(String),
    /// An integer.
    Integer(u32),
    /// Some untyped value - usually 'bareword' strings, i.e. strings that
    /// aren't surrounded in "quotation marks".
    Unknown(String),
    /// An empty value, corresponding to nothing at all.
    Empty,
    /// A comma-separated list of values.
    Array(Vec<AtValue>),
}
macro_rules! at_value_impl {
    ($atv:ident, $($var:ident, $refmeth:ident, $asmeth:ident, $ty:ty),*) => {
        /// This `impl` block provides methods to extract various types
        /// out of an `AtValue`. If the value is not of the desired type,
        /// `ModemError::TypeMismatch` is returned.
        ///
        /// - `as_x` methods take `self`, and return either the type or an error.
        /// - `get_x` methods take `&self`, and return a `&` reference.
        impl $atv {
            $(
                pub fn $refmeth(&self) -> ModemResult<&$ty> {
                    if let $atv::$var(ref i) = *self {
                        Ok(i)
                    }
                    else {
                        Err(ModemError::TypeMismatch)
                    }
                }
                pub fn $asmeth(self) -> ModemResult<$ty> {
                    if let $atv::$var(i) = self {
                        Ok(i)
                    }
                    else {
                        Err(ModemError::TypeMismatch)
                    }
                }
             )*
        }
    }
}
at_value_impl!(AtValue,
               String, get_string, as_string, String,
               Integer, get_integer, as_integer, u32,
               Unknown, get_unknown, as_unknown, String,
               Array, get_array, as_array, Vec<AtValue>);
impl AtValue {
    /// Flattens the value into a positional parameter list.
    ///
    /// A lone value is a list of one; `Empty` is a list of zero. This mirrors
    /// how handlers consume `AT<cmd>=<p1>[,<p2>...]` tails.
    pub fn into_args(self) -> Vec<AtValue> {
        match self {
            AtValue::Array(args) => args,
            AtValue::Empty => vec![],
            x => vec![x],
        }
    }
    /// The textual form of a parameter, however it was quoted.
    ///
    /// `+COPS=1,2,310260` and `+COPS=1,2,"310260"` both name the same
    /// operator; handlers that look names up use this.
    pub fn text(&self) -> ModemResult<String> {
        match *self {
            AtValue::String(ref s) => Ok(s.clone()),
            AtValue::Unknown(ref s) => Ok(s.clone()),
            AtValue::Integer(i) => Ok(i.to_string()),
            _ => Err(ModemError::TypeMismatch),
        }
    }
}
/// Writes the `AtValue` out, as it would appear on the command line.
impl fmt::Display for AtValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::AtValue::*;
        match *self {
            String(ref st) => write!(f, "\"{}\"", st)?,
            Integer(i) => write!(f, "{}", i)?,
            Unknown(ref st) => write!(f, "{}", st)?,
            Empty => {},
            Array(ref val) => {
                for (i, val) in val.iter().enumerate() {
                    let c = if i == 0 { "" } else { "," };
                    write!(f, "{}{}", c, val)?;
                }
            }
        }
        Ok(())
    }
}

/// How a dispatch-table row matches an incoming command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub(crate) enum Matcher {
    /// The whole command must equal the pattern.
    Exact(&'static str),
    /// The command must begin with the pattern.
    Prefix(&'static str),
}
impl Matcher {
    pub(crate) fn matches(&self, cmd: &str) -> bool {
        match *self {
            Matcher::Exact(pat) => cmd == pat,
            Matcher::Prefix(pat) => cmd.starts_with(pat),
        }
    }
}

/// What a dispatch-table row does once it matches.
pub(crate) enum Action {
    /// Send a canned reply verbatim (the framer still appends `OK` where
    /// required).
    Reply(&'static str),
    /// Invoke a handler with the full command string.
    Handler(crate::dispatch::CmdHandler),
    /// Just reply `OK`.
    Default,
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn matcher_exact() {
        assert!(Matcher::Exact("+CSQ").matches("+CSQ"));
        assert!(!Matcher::Exact("+CSQ").matches("+CSQ?"));
    }
    #[test]
    fn matcher_prefix() {
        assert!(Matcher::Prefix("+CHLD=").matches("+CHLD=1"));
        assert!(Matcher::Prefix("D").matches("D15558;"));
        assert!(!Matcher::Prefix("+CHLD=").matches("+CHL"));
    }
    #[test]
    fn args_flatten() {
        assert_eq!(AtValue::Empty.into_args(), vec![]);
        assert_eq!(AtValue::Integer(3).into_args(), vec![AtValue::Integer(3)]);
        assert_eq!(
            AtValue::Array(vec![AtValue::Integer(1), AtValue::Empty]).into_args(),
            vec![AtValue::Integer(1), AtValue::Empty]
        );
    }
}
