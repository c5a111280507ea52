//! Endpoint address parsing.
//!
//! Recognizes the `inproc://`, `tcp://` and `ipc://` schemes. Only the
//! in-process transport is implemented by the socket layer; the others parse
//! so that callers get `NotSupported` rather than `AddrInvalid`.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Transport endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// In-process transport: `inproc://name`
    Inproc(String),
    /// TCP transport: `tcp://host:port`
    Tcp(String),
    /// IPC transport: `ipc:///path/to/socket`
    Ipc(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use spmq_core::endpoint::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("inproc://my-endpoint").unwrap();
    /// assert!(endpoint.is_inproc());
    ///
    /// assert!(Endpoint::parse("udp://nope").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn is_inproc(&self) -> bool {
        matches!(self, Endpoint::Inproc(_))
    }

    /// Name of an in-process endpoint.
    pub fn inproc_name(&self) -> Option<&str> {
        match self {
            Endpoint::Inproc(name) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s.split_once("://").ok_or(Error::AddrInvalid)?;
        if rest.is_empty() {
            return Err(Error::AddrInvalid);
        }
        match scheme {
            "inproc" => Ok(Endpoint::Inproc(rest.to_string())),
            "tcp" => Ok(Endpoint::Tcp(rest.to_string())),
            "ipc" => Ok(Endpoint::Ipc(PathBuf::from(rest))),
            _ => Err(Error::AddrInvalid),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inproc(name) => write!(f, "inproc://{name}"),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}
