/// spmq Error Types
///
/// The closed set of status codes returned by the message engine, the
/// platform primitives and the socket layer.

use std::io;
use thiserror::Error;

/// Main error type for spmq operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// A blocking call was interrupted
    #[error("Interrupted")]
    Interrupted,

    /// Allocation or OS resource exhaustion
    #[error("Out of memory")]
    NoMemory,

    /// Malformed size, flag combination or value type
    #[error("Invalid argument")]
    InvalidArgument,

    /// Resource is busy
    #[error("Resource busy")]
    Busy,

    /// Deadline elapsed before the operation completed
    #[error("Timed out")]
    TimedOut,

    /// Peer refused the connection
    #[error("Connection refused")]
    ConnectionRefused,

    /// Socket or endpoint already closed
    #[error("Object closed")]
    Closed,

    /// Operation would block
    #[error("Try again")]
    Again,

    /// Operation, protocol or option not supported
    #[error("Not supported")]
    NotSupported,

    /// Address already bound
    #[error("Address in use")]
    AddrInUse,

    /// Operation is illegal in the current protocol state
    #[error("Incorrect state")]
    State,

    /// Entry not found
    #[error("Entry not found")]
    NoEntry,

    /// Protocol error
    #[error("Protocol error")]
    Protocol,

    /// Destination unreachable
    #[error("Destination unreachable")]
    Unreachable,

    /// Address is malformed or refers to an unknown transport
    #[error("Address invalid")]
    AddrInvalid,

    /// Permission denied
    #[error("Permission denied")]
    Permission,

    /// Message exceeds the permitted size
    #[error("Message too large")]
    MessageSize,

    /// Connection aborted
    #[error("Connection aborted")]
    ConnectionAborted,

    /// Connection reset by peer
    #[error("Connection reset")]
    ConnectionReset,

    /// Size arithmetic would wrap
    #[error("Size overflow")]
    Overflow,

    /// Option cannot be written
    #[error("Read only resource")]
    ReadOnly,
}

/// Result type alias for spmq operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Every status code, in declaration order.
    pub const ALL: [Error; 21] = [
        Self::Interrupted,
        Self::NoMemory,
        Self::InvalidArgument,
        Self::Busy,
        Self::TimedOut,
        Self::ConnectionRefused,
        Self::Closed,
        Self::Again,
        Self::NotSupported,
        Self::AddrInUse,
        Self::State,
        Self::NoEntry,
        Self::Protocol,
        Self::Unreachable,
        Self::AddrInvalid,
        Self::Permission,
        Self::MessageSize,
        Self::ConnectionAborted,
        Self::ConnectionReset,
        Self::Overflow,
        Self::ReadOnly,
    ];

    /// Check if retrying the same call later may succeed
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Again | Self::TimedOut)
    }

    /// Check if this is a connection error
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Closed
                | Self::ConnectionRefused
                | Self::ConnectionAborted
                | Self::ConnectionReset
                | Self::Unreachable
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted => Self::Interrupted,
            io::ErrorKind::OutOfMemory => Self::NoMemory,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Self::InvalidArgument,
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::WouldBlock => Self::Again,
            io::ErrorKind::Unsupported => Self::NotSupported,
            io::ErrorKind::AddrInUse => Self::AddrInUse,
            io::ErrorKind::NotFound => Self::NoEntry,
            io::ErrorKind::AddrNotAvailable => Self::AddrInvalid,
            io::ErrorKind::PermissionDenied => Self::Permission,
            io::ErrorKind::ConnectionAborted => Self::ConnectionAborted,
            io::ErrorKind::ConnectionReset => Self::ConnectionReset,
            io::ErrorKind::BrokenPipe => Self::Closed,
            // Thread and lock creation only report generic OS failures.
            _ => Self::NoMemory,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::NoMemory
    }
}
