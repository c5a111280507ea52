//! Translation between socket-layer errors and legacy errno values.
//!
//! The table is fixed and bidirectional for the kinds it lists. Anything
//! else degrades to `EIO`, so callers never see an undocumented value.

use crate::consts::EFSM;
use spmq_core::error::Error;
use std::borrow::Cow;
use thiserror::Error;
use tracing::warn;

/// A legacy errno value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("{}", strerror(self.0))]
pub struct LegacyError(i32);

pub type Result<T> = std::result::Result<T, LegacyError>;

impl LegacyError {
    #[must_use]
    pub const fn from_raw(errno: i32) -> Self {
        Self(errno)
    }

    #[must_use]
    pub const fn errno(self) -> i32 {
        self.0
    }
}

impl From<Error> for LegacyError {
    fn from(err: Error) -> Self {
        Self(to_errno(err))
    }
}

impl From<spmq_core::socket::SendError> for LegacyError {
    fn from(err: spmq_core::socket::SendError) -> Self {
        Self(to_errno(err.error))
    }
}

const TABLE: [(Error, i32); 19] = [
    (Error::Interrupted, libc::EINTR),
    (Error::NoMemory, libc::ENOMEM),
    (Error::InvalidArgument, libc::EINVAL),
    (Error::Busy, libc::EBUSY),
    (Error::TimedOut, libc::ETIMEDOUT),
    (Error::ConnectionRefused, libc::ECONNREFUSED),
    (Error::Closed, libc::EBADF),
    (Error::Again, libc::EAGAIN),
    (Error::NotSupported, libc::ENOTSUP),
    (Error::AddrInUse, libc::EADDRINUSE),
    (Error::State, EFSM),
    (Error::NoEntry, libc::ENOENT),
    (Error::Protocol, libc::EPROTO),
    (Error::Unreachable, libc::EHOSTUNREACH),
    (Error::AddrInvalid, libc::EADDRNOTAVAIL),
    (Error::Permission, libc::EACCES),
    (Error::MessageSize, libc::EMSGSIZE),
    (Error::ConnectionAborted, libc::ECONNABORTED),
    (Error::ConnectionReset, libc::ECONNRESET),
];

/// Legacy errno for `err`.
#[must_use]
pub fn to_errno(err: Error) -> i32 {
    match err {
        // Size arithmetic failures surface as bad arguments.
        Error::Overflow => libc::EINVAL,
        _ => TABLE
            .iter()
            .find(|(kind, _)| *kind == err)
            .map_or_else(
                || {
                    warn!(error = %err, "no legacy errno, reporting EIO");
                    libc::EIO
                },
                |(_, errno)| *errno,
            ),
    }
}

/// Socket-layer error for a legacy errno, if the table knows it.
#[must_use]
pub fn from_errno(errno: i32) -> Option<Error> {
    TABLE
        .iter()
        .find(|(_, value)| *value == errno)
        .map(|(kind, _)| *kind)
}

/// Human-readable message for a legacy errno.
#[must_use]
pub fn strerror(errno: i32) -> Cow<'static, str> {
    if let Some(err) = from_errno(errno) {
        return Cow::Owned(err.to_string());
    }
    match errno {
        libc::EIO => Cow::Borrowed("Unknown I/O error"),
        libc::EAFNOSUPPORT => Cow::Borrowed("Address family not supported"),
        libc::ENOPROTOOPT => Cow::Borrowed("Protocol option not supported"),
        _ => Cow::Owned(format!("Unknown error {errno}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_maps() {
        for err in Error::ALL {
            let errno = to_errno(err);
            assert_ne!(errno, 0);
            if err != Error::Overflow && err != Error::ReadOnly {
                assert_eq!(from_errno(errno), Some(err), "{err:?}");
            }
        }
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(to_errno(Error::Overflow), libc::EINVAL);
        assert_eq!(to_errno(Error::ReadOnly), libc::EIO);
        assert_eq!(from_errno(libc::EIO), None);
    }

    #[test]
    fn test_strerror() {
        assert_eq!(strerror(libc::EIO), "Unknown I/O error");
        assert_eq!(strerror(-3), "Unknown error -3");
        assert_eq!(strerror(libc::EBADF), Error::Closed.to_string());
        assert_eq!(
            LegacyError::from(Error::State).to_string(),
            Error::State.to_string()
        );
    }
}
