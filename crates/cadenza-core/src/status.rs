//! Status codes returned by collaborators, and the error type built on them.
//!
//! Every external operation (node query, property get/set, graph mutation,
//! render call, file write, clock query) reports a [`Status`]. The core treats
//! any non-success status as fatal: it attaches the failing operation's name
//! via [`CheckStatus::check`] and propagates the resulting [`Error`].

use std::fmt;

/// A four-character code, as used for component types and status tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Creates a code from its four bytes.
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Returns `true` if every byte is printable ASCII.
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    }
}

impl From<i32> for FourCc {
    fn from(value: i32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<FourCc> for i32 {
    fn from(code: FourCc) -> Self {
        i32::from_be_bytes(code.0)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc('{self}')")
    }
}

/// Result code of a collaborator operation.
///
/// Negative codes follow the audio runtime's numeric error space; positive
/// codes are usually four-character tags such as `'typ?'`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// The operation succeeded.
    pub const OK: Self = Self(0);
    /// Generic parameter error.
    pub const PARAM: Self = Self(-50);
    /// The node handle does not refer to a node in the graph.
    pub const NODE_NOT_FOUND: Self = Self(-10860);
    /// The requested connection is not valid (unknown node, cycle, bad bus).
    pub const INVALID_CONNECTION: Self = Self(-10861);
    /// The graph is in a state where the call cannot be made.
    pub const CANNOT_DO_IN_CURRENT_CONTEXT: Self = Self(-10863);
    /// The requested component could not be instantiated.
    pub const COMPONENT_NOT_FOUND: Self = Self(-10864);
    /// A render call asked for more frames than the unit's slice limit.
    pub const TOO_MANY_FRAMES: Self = Self(-10874);
    /// The unit has not been initialized.
    pub const UNINITIALIZED: Self = Self(-10867);
    /// The unit does not support the stream format.
    pub const FORMAT_NOT_SUPPORTED: Self = Self(-10868);
    /// The property value is out of range.
    pub const INVALID_PROPERTY_VALUE: Self = Self(-10851);
    /// The unit does not support the property.
    pub const INVALID_PROPERTY: Self = Self(-10879);
    /// The output file type is not supported.
    pub const UNSUPPORTED_FILE_TYPE: Self = Self(i32::from_be_bytes(*b"typ?"));
    /// The data format is not supported by the file type.
    pub const UNSUPPORTED_DATA_FORMAT: Self = Self(i32::from_be_bytes(*b"fmt?"));
    /// A referenced file does not exist.
    pub const FILE_NOT_FOUND: Self = Self(i32::from_be_bytes(*b"!fnd"));
    /// Writing to a file failed.
    pub const WRITE_FAILED: Self = Self(i32::from_be_bytes(*b"wrt?"));
    /// The output device reported an error.
    pub const DEVICE_ERROR: Self = Self(i32::from_be_bytes(*b"dev!"));

    /// Returns `true` for [`Status::OK`].
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Converts the status into a `Result`, mapping [`Status::OK`] to `Ok(())`.
    pub fn into_result(self) -> std::result::Result<(), Status> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Status {
    /// Renders the code as `'abcd'` when all four bytes are printable,
    /// otherwise as a decimal number.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = FourCc::from(self.0);
        if tag.is_printable() {
            write!(f, "'{tag}'")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({self})")
    }
}

/// Errors raised by the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A collaborator operation returned a non-success status.
    #[error("{operation} ({status})")]
    Status {
        /// Name of the failing operation.
        operation: &'static str,
        /// Status it returned.
        status: Status,
    },

    /// A required node was not present in the graph.
    #[error("no {0} node found in graph")]
    NotFound(&'static str),

    /// More than one synthesizer node was present in the graph.
    #[error("graph contains {0} synthesizer nodes, expected exactly one")]
    MultipleSynths(usize),
}

impl Error {
    /// Returns the collaborator status behind this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for the distinguished "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attaches an operation name to a collaborator status.
pub trait CheckStatus<T> {
    /// Maps `Err(status)` to [`Error::Status`] naming `operation`.
    fn check(self, operation: &'static str) -> Result<T>;
}

impl<T> CheckStatus<T> for std::result::Result<T, Status> {
    fn check(self, operation: &'static str) -> Result<T> {
        self.map_err(|status| {
            tracing::error!(operation, %status, "collaborator call failed");
            Error::Status { operation, status }
        })
    }
}
