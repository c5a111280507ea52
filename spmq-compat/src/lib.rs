//! spmq Compat
//!
//! nanomsg-style legacy API over the spmq socket layer:
//! - Legacy constants (`consts`)
//! - errno translation and messages (`errno`)
//! - Zero-copy messages addressed by body pointer (`msg`)
//! - Socket calls, `NN_MSG` transfers and control data (`socket`, `cmsg`)
//! - `(level, name)` option table (`options`)
//! - The `extern "C"` entry points (`ffi`)

// Only the C ABI layer dereferences raw pointers.
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cmsg;
pub mod consts;
pub mod errno;
pub mod ffi;
pub mod msg;
pub mod options;
pub mod socket;

pub use errno::{LegacyError, Result};
