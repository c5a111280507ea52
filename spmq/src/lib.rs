//! # spmq
//!
//! A scalability-protocol message engine with a nanomsg-compatible legacy
//! API layered on top.
//!
//! ## Architecture
//!
//! - **`spmq-core`**: message buffers with header and body regions, platform
//!   primitives (clock, mutex/condvar, threads, one-time init) and an
//!   in-process socket layer implementing PAIR, PUB/SUB, REQ/REP,
//!   PUSH/PULL, SURVEYOR/RESPONDENT and BUS
//! - **`spmq-compat`**: the legacy `nn_*` surface, both as a safe Rust API
//!   and as an `extern "C"` ABI
//! - **`spmq`**: public API surface (this crate)
//!
//! ## Quick Start
//!
//! ### Native sockets
//!
//! ```rust
//! use spmq::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let rep = Socket::open(Protocol::Rep)?;
//! rep.listen("inproc://quick-start")?;
//! let req = Socket::open(Protocol::Req)?;
//! req.dial("inproc://quick-start")?;
//!
//! req.send(Message::from_body(b"ping")?)?;
//! let request = rep.recv()?;
//! rep.send(request)?;
//! assert_eq!(req.recv()?.body(), b"ping");
//! # Ok(())
//! # }
//! ```
//!
//! ### Legacy API
//!
//! ```rust
//! use spmq::compat::consts::{AF_SP, NN_PULL, NN_PUSH};
//! use spmq::compat::socket::{self, RecvBody, SendBody};
//!
//! # fn main() -> Result<(), spmq::compat::LegacyError> {
//! let pull = socket::socket(AF_SP, NN_PULL)?;
//! socket::bind(pull, "inproc://quick-start-legacy")?;
//! let push = socket::socket(AF_SP, NN_PUSH)?;
//! socket::connect(push, "inproc://quick-start-legacy")?;
//!
//! socket::send(push, SendBody::Copy(&[&b"work"[..]]), 0)?;
//! let mut buf = [0u8; 8];
//! let got = socket::recv(pull, RecvBody::Copy(&mut [&mut buf[..]]), 0)?;
//! assert_eq!(&buf[..got.copied], b"work");
//! # socket::close(push)?;
//! # socket::close(pull)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The libraries only emit `tracing` events. Call
//! [`dev_tracing::init_tracing`] with `RUST_LOG` set to see them.

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod dev_tracing;

pub use spmq_compat as compat;
pub use spmq_core::{clock, endpoint, error, init, inproc, message, options, protocol, socket, sync, thread};

/// Common imports for native socket users.
pub mod prelude {
    pub use spmq_core::prelude::*;
}
