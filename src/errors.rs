//! Error handling.
use std::io;

/// Error `enum` for errors raised by this library.
///
/// Most AT-level failures never surface here: command handlers convert them
/// to the wire error strings (`+CME ERROR: n` and friends) directly. This
/// type covers the programmatic API - persistence, snapshots, PDU decoding
/// and parameter parsing.
#[derive(Fail, Debug)]
pub enum ModemError {
    /// Some random I/O error.
    #[fail(display = "An I/O error occurred: {}", _0)]
    IoError(#[cause] io::Error),
    /// An error parsing AT command parameters.
    #[fail(display = "There was an error parsing data.")]
    ParseError(::nom::ErrorKind),
    /// A type mismatch occured when picking apart a parameter list.
    #[fail(display = "Type mismatch in parameter list")]
    TypeMismatch,
    /// A numeric value was out of range for the target type.
    #[fail(display = "Value out of range: {}", _0)]
    ValueOutOfRange(i64),
    /// An error occured parsing an SMS PDU.
    #[fail(display = "Invalid PDU: {}", _0)]
    InvalidPdu(&'static str),
    /// A snapshot was produced by an incompatible version of this library.
    #[fail(display = "Unsupported snapshot version: {}", _0)]
    SnapshotVersion(u8),
    /// A snapshot ended before all of its announced content.
    #[fail(display = "Snapshot data is truncated")]
    SnapshotTruncated,
    /// No call with the given number exists.
    #[fail(display = "No call matches number {}", _0)]
    NoSuchCall(String),
    /// The call table is full.
    #[fail(display = "Too many calls")]
    TooManyCalls,
    /// The SMSC type-of-address byte contradicts the address digits.
    #[fail(display = "Type of address {} does not match the address", _0)]
    BadTypeOfAddress(u8),
}
impl From<io::Error> for ModemError {
    fn from(e: io::Error) -> ModemError {
        ModemError::IoError(e)
    }
}
impl From<::nom::ErrorKind> for ModemError {
    fn from(e: ::nom::ErrorKind) -> ModemError {
        ModemError::ParseError(e)
    }
}
/// Bog-standard result type alias.
pub type ModemResult<T> = Result<T, ModemError>;
