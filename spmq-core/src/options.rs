//! Socket configuration options
//!
//! [`SocketOptions`] is the per-socket configuration record. It can be built
//! directly with the `with_*` methods, or modified at runtime through the
//! typed option interface ([`SockOpt`] + [`OptionValue`]) that the socket
//! layer exposes as `set_option` / `get_option`.
//!
//! Durations cross the option interface as signed microseconds; a negative
//! value means "infinite" where that is meaningful.

use crate::error::{Error, Result};
use crate::protocol::Protocol;
use bytes::Bytes;
use std::time::Duration;

/// Option identifiers understood by the socket layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SockOpt {
    /// Raw mode: protocol headers are exposed instead of managed.
    Raw,
    /// Time to keep undelivered messages after close.
    Linger,
    /// Send buffer size in bytes.
    SendBuf,
    /// Receive buffer size in bytes.
    RecvBuf,
    /// Initial reconnect interval.
    ReconnectTime,
    /// Reconnect interval cap for exponential backoff.
    ReconnectMaxTime,
    /// Pollable send descriptor (read only).
    SendFd,
    /// Pollable receive descriptor (read only).
    RecvFd,
    /// Largest message accepted on receive; `-1` for unlimited.
    RecvMaxSize,
    /// Maximum number of hops through devices.
    MaxTtl,
    /// Receive timeout.
    RecvTimeout,
    /// Send timeout.
    SendTimeout,
    /// REQ: request resend interval.
    ResendTime,
    /// SUB: add a subscription prefix.
    Subscribe,
    /// SUB: remove a subscription prefix.
    Unsubscribe,
    /// SURVEYOR: survey deadline.
    SurveyTime,
    /// Protocol number (read only).
    Protocol,
}

/// Value representation for a [`SockOpt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Micros,
    Bytes,
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    /// Signed microseconds; negative means infinite.
    Micros(i64),
    Bytes(Bytes),
}

impl OptionValue {
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        match self {
            Self::Bool(_) => OptionKind::Bool,
            Self::Int(_) => OptionKind::Int,
            Self::Micros(_) => OptionKind::Micros,
            Self::Bytes(_) => OptionKind::Bytes,
        }
    }
}

impl SockOpt {
    #[must_use]
    pub const fn kind(self) -> OptionKind {
        match self {
            Self::Raw => OptionKind::Bool,
            Self::SendBuf
            | Self::RecvBuf
            | Self::SendFd
            | Self::RecvFd
            | Self::RecvMaxSize
            | Self::MaxTtl
            | Self::Protocol => OptionKind::Int,
            Self::Linger
            | Self::ReconnectTime
            | Self::ReconnectMaxTime
            | Self::RecvTimeout
            | Self::SendTimeout
            | Self::ResendTime
            | Self::SurveyTime => OptionKind::Micros,
            Self::Subscribe | Self::Unsubscribe => OptionKind::Bytes,
        }
    }

    /// Protocol an option is restricted to, if any.
    #[must_use]
    pub const fn protocol(self) -> Option<Protocol> {
        match self {
            Self::ResendTime => Some(Protocol::Req),
            Self::Subscribe | Self::Unsubscribe => Some(Protocol::Sub),
            Self::SurveyTime => Some(Protocol::Surveyor),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::SendFd | Self::RecvFd | Self::Protocol)
    }
}

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use spmq_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_send_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Raw mode
    ///
    /// - `false` (default): the protocol manages headers (request ids, backtraces)
    /// - `true`: headers are handed to the application untouched
    pub raw: bool,

    /// Linger timeout
    ///
    /// - `None`: keep pending messages indefinitely
    /// - Default: 1 second
    pub linger: Option<Duration>,

    /// Send buffer size (bytes). Default: 128KB
    pub send_buffer: i32,

    /// Receive buffer size (bytes). Default: 128KB
    pub recv_buffer: i32,

    /// Reconnect interval
    ///
    /// Initial reconnection delay after connection loss.
    /// - Default: 100ms
    pub reconnect_ivl: Duration,

    /// Maximum reconnect interval
    ///
    /// - Default: 0 (no backoff, use `reconnect_ivl` always)
    pub reconnect_ivl_max: Duration,

    /// Maximum message size on receive
    ///
    /// - `None`: no limit
    /// - Default: 1MB; larger messages are dropped
    pub recv_max_size: Option<usize>,

    /// Maximum hop count for device forwarding (1..=255). Default: 8
    pub max_ttl: u8,

    /// Receive timeout
    ///
    /// - `None`: block indefinitely (default)
    /// - `Some(Duration::ZERO)`: fail immediately with `Again` when empty
    pub recv_timeout: Option<Duration>,

    /// Send timeout
    ///
    /// - `None`: block indefinitely (default)
    /// - `Some(duration)`: wait up to duration for a peer
    pub send_timeout: Option<Duration>,

    /// REQ resend interval. Default: 60 seconds
    pub resend_ivl: Duration,

    /// SURVEYOR deadline. Default: 1 second
    pub survey_time: Duration,

    /// SUB subscription prefixes
    pub subscriptions: Vec<Bytes>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            raw: false,
            linger: Some(Duration::from_secs(1)),
            send_buffer: 128 * 1024,
            recv_buffer: 128 * 1024,
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            recv_max_size: Some(1024 * 1024),
            max_ttl: 8,
            recv_timeout: None,
            send_timeout: None,
            resend_ivl: Duration::from_secs(60),
            survey_time: Duration::from_secs(1),
            subscriptions: Vec::new(),
        }
    }
}

fn micros_to_timeout(us: i64) -> Option<Duration> {
    u64::try_from(us).ok().map(Duration::from_micros)
}

fn micros_to_interval(us: i64) -> Result<Duration> {
    u64::try_from(us)
        .map(Duration::from_micros)
        .map_err(|_| Error::InvalidArgument)
}

fn timeout_to_micros(timeout: Option<Duration>) -> i64 {
    timeout.map_or(-1, duration_to_micros)
}

fn duration_to_micros(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Set receive timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use spmq_core::options::SocketOptions;
    /// use std::time::Duration;
    ///
    /// // Non-blocking receive
    /// let opts = SocketOptions::new().with_recv_timeout(Duration::ZERO);
    /// assert_eq!(opts.recv_timeout, Some(Duration::ZERO));
    /// ```
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Set send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set reconnection interval.
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnection interval for exponential backoff.
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set maximum accepted message size.
    pub fn with_recv_max_size(mut self, size: Option<usize>) -> Self {
        self.recv_max_size = size;
        self
    }

    /// Set both send and receive buffer sizes (convenience method).
    pub fn with_buffer_sizes(mut self, send: i32, recv: i32) -> Self {
        self.send_buffer = send;
        self.recv_buffer = recv;
        self
    }

    /// Apply a typed option value.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the value has the wrong type or is out of range
    /// - [`Error::ReadOnly`] for read-only options
    pub fn apply(&mut self, opt: SockOpt, value: OptionValue) -> Result<()> {
        if opt.is_read_only() {
            return Err(Error::ReadOnly);
        }
        if opt.kind() != value.kind() {
            return Err(Error::InvalidArgument);
        }

        match (opt, value) {
            (SockOpt::Raw, OptionValue::Bool(raw)) => self.raw = raw,
            (SockOpt::Linger, OptionValue::Micros(us)) => self.linger = micros_to_timeout(us),
            (SockOpt::SendBuf, OptionValue::Int(n)) if n > 0 => self.send_buffer = n,
            (SockOpt::RecvBuf, OptionValue::Int(n)) if n > 0 => self.recv_buffer = n,
            (SockOpt::ReconnectTime, OptionValue::Micros(us)) => {
                self.reconnect_ivl = micros_to_interval(us)?;
            }
            (SockOpt::ReconnectMaxTime, OptionValue::Micros(us)) => {
                self.reconnect_ivl_max = micros_to_interval(us)?;
            }
            (SockOpt::RecvMaxSize, OptionValue::Int(n)) if n >= -1 => {
                self.recv_max_size = usize::try_from(n).ok();
            }
            (SockOpt::MaxTtl, OptionValue::Int(n)) if (1..=255).contains(&n) => {
                self.max_ttl = n as u8;
            }
            (SockOpt::RecvTimeout, OptionValue::Micros(us)) => {
                self.recv_timeout = micros_to_timeout(us);
            }
            (SockOpt::SendTimeout, OptionValue::Micros(us)) => {
                self.send_timeout = micros_to_timeout(us);
            }
            (SockOpt::ResendTime, OptionValue::Micros(us)) => {
                self.resend_ivl = micros_to_interval(us)?;
            }
            (SockOpt::SurveyTime, OptionValue::Micros(us)) => {
                self.survey_time = micros_to_interval(us)?;
            }
            (SockOpt::Subscribe, OptionValue::Bytes(topic)) => {
                if !self.subscriptions.contains(&topic) {
                    self.subscriptions.push(topic);
                }
            }
            (SockOpt::Unsubscribe, OptionValue::Bytes(topic)) => {
                let before = self.subscriptions.len();
                self.subscriptions.retain(|t| *t != topic);
                if self.subscriptions.len() == before {
                    return Err(Error::NoEntry);
                }
            }
            _ => return Err(Error::InvalidArgument),
        }
        Ok(())
    }

    /// Read an option as a typed value.
    ///
    /// Write-only options (`Subscribe`, `Unsubscribe`) and options owned by
    /// the socket rather than its configuration return [`Error::NotSupported`].
    pub fn get(&self, opt: SockOpt) -> Result<OptionValue> {
        Ok(match opt {
            SockOpt::Raw => OptionValue::Bool(self.raw),
            SockOpt::Linger => OptionValue::Micros(timeout_to_micros(self.linger)),
            SockOpt::SendBuf => OptionValue::Int(self.send_buffer),
            SockOpt::RecvBuf => OptionValue::Int(self.recv_buffer),
            SockOpt::ReconnectTime => OptionValue::Micros(duration_to_micros(self.reconnect_ivl)),
            SockOpt::ReconnectMaxTime => {
                OptionValue::Micros(duration_to_micros(self.reconnect_ivl_max))
            }
            SockOpt::RecvMaxSize => OptionValue::Int(
                self.recv_max_size
                    .map_or(-1, |n| i32::try_from(n).unwrap_or(i32::MAX)),
            ),
            SockOpt::MaxTtl => OptionValue::Int(i32::from(self.max_ttl)),
            SockOpt::RecvTimeout => OptionValue::Micros(timeout_to_micros(self.recv_timeout)),
            SockOpt::SendTimeout => OptionValue::Micros(timeout_to_micros(self.send_timeout)),
            SockOpt::ResendTime => OptionValue::Micros(duration_to_micros(self.resend_ivl)),
            SockOpt::SurveyTime => OptionValue::Micros(duration_to_micros(self.survey_time)),
            SockOpt::SendFd
            | SockOpt::RecvFd
            | SockOpt::Protocol
            | SockOpt::Subscribe
            | SockOpt::Unsubscribe => return Err(Error::NotSupported),
        })
    }
}
