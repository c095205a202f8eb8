//! Typed representations of the error codes the modem reports on the wire.
#![allow(missing_docs)]
/// A CME (mobile equipment) error code, as defined by 3GPP TS 27.007
/// subclause 9.2.
///
/// Only the codes this modem actually emits are represented. The meanings are
/// annotated with `#[fail(display)]` attributes, so the `Display`
/// implementation doubles as documentation; the wire format is always the
/// numeric form (`+CME ERROR: <n>`).
#[derive(FromPrimitive, Fail, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CmeError {
    #[fail(display = "Operation not allowed")]
    NotAllowed = 3,
    #[fail(display = "Operation not supported")]
    NotSupported = 4,
    #[fail(display = "Incorrect password")]
    WrongPassword = 16,
    #[fail(display = "No network service")]
    NoNetwork = 30,
    #[fail(display = "Network not allowed - emergency calls only")]
    NetworkNotAllowed = 32,
    #[fail(display = "Incorrect parameters")]
    IncorrectParameters = 50,
    #[fail(display = "Activation rejected, unspecified")]
    ActivationRejected = 131,
    #[fail(display = "Service option temporarily out of order")]
    ServiceOutOfOrder = 134,
    #[fail(display = "Unknown PDP context")]
    UnknownPdpContext = 143,
    #[fail(display = "Network selection failed")]
    SelectionFailed = 529,
}
