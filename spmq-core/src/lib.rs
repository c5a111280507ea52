//! spmq Core
//!
//! This crate contains the building blocks the legacy API is layered on:
//! - Two-region message buffers with head/tail room (`message`)
//! - Mutexes, condition variables with absolute deadlines, threads and the
//!   once-per-process init gate (`sync`, `thread`, `init`, `clock`)
//! - Typed socket options (`options`)
//! - The handle-based in-process socket layer (`socket`, `inproc`)
//! - Error types (`error`)

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

mod chunk;

pub mod clock;
pub mod endpoint;
pub mod error;
pub mod init;
pub mod inproc;
pub mod message;
pub mod options;
pub mod protocol;
pub mod socket;
pub mod sync;
pub mod thread;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::message::Message;
    pub use crate::options::{OptionValue, SockOpt, SocketOptions};
    pub use crate::protocol::Protocol;
    pub use crate::socket::{EndpointId, Flags, SendError, Socket, SocketId};
    pub use crate::sync::{CondVar, Mutex, WaitStatus};
    pub use crate::thread::Thread;
}
