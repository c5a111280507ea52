//! Legacy socket calls on top of the handle-based socket layer.
//!
//! Socket descriptors are the socket-layer ids as plain integers. Every call
//! returns a [`LegacyError`] carrying the legacy errno on failure.
//!
//! Bodies are either copied from or into caller buffers, or moved as
//! zero-copy messages addressed by [`MsgPtr`] (the `NN_MSG` convention).
//!
//! # Example
//!
//! ```
//! use spmq_compat::consts::{AF_SP, NN_REP, NN_REQ};
//! use spmq_compat::msg;
//! use spmq_compat::socket::{self, RecvBody, SendBody};
//!
//! let rep = socket::socket(AF_SP, NN_REP).unwrap();
//! socket::bind(rep, "inproc://compat-doc").unwrap();
//! let req = socket::socket(AF_SP, NN_REQ).unwrap();
//! socket::connect(req, "inproc://compat-doc").unwrap();
//!
//! socket::send(req, SendBody::Copy(&[&b"ping"[..]]), 0).unwrap();
//! let request = socket::recv(rep, RecvBody::Msg, 0).unwrap();
//! let ptr = request.msg.unwrap();
//! msg::with_msg(ptr, |m| assert_eq!(m.body(), b"ping")).unwrap();
//!
//! // Zero-copy reply: the message moves back into the socket layer.
//! socket::send(rep, SendBody::Msg(ptr), 0).unwrap();
//! let mut buf = [0u8; 16];
//! let reply = socket::recv(req, RecvBody::Copy(&mut [&mut buf[..]]), 0).unwrap();
//! assert_eq!(&buf[..reply.copied], b"ping");
//! # socket::close(req).unwrap();
//! # socket::close(rep).unwrap();
//! ```

use crate::cmsg;
use crate::consts::{AF_SP, AF_SP_RAW, NN_DONTWAIT};
use crate::errno::{LegacyError, Result};
use crate::msg::{self, MsgPtr};
use spmq_core::error::Error;
use spmq_core::message::Message;
use spmq_core::options::{OptionValue, SockOpt};
use spmq_core::protocol::Protocol;
use spmq_core::socket::{self as core, EndpointId, Flags, SendError, SocketId};
use tracing::{debug, warn};

/// Legacy socket descriptor.
pub type Fd = i32;

/// Body of an outgoing message.
#[derive(Debug, Clone, Copy)]
pub enum SendBody<'a> {
    /// Zero-copy: a message from [`msg::alloc_msg`] or a previous receive.
    /// Ownership passes to the socket on success only.
    Msg(MsgPtr),
    /// Buffers copied, in order, into a fresh message.
    Copy(&'a [&'a [u8]]),
}

/// Control data of an outgoing message.
#[derive(Debug, Clone, Copy)]
pub enum Control<'a> {
    /// Control records in a caller buffer.
    Bytes(&'a [u8]),
    /// Control records in a legacy message, freed after a successful send.
    Msg(MsgPtr),
}

/// Destination for an incoming body.
#[derive(Debug)]
pub enum RecvBody<'a, 'b> {
    /// Hand the message over as a legacy pointer.
    Msg,
    /// Copy into the buffers in order; whatever does not fit is discarded.
    Copy(&'a mut [&'b mut [u8]]),
}

/// Destination for incoming control data.
#[derive(Debug)]
pub enum ControlTarget<'a> {
    None,
    /// Write the `SP_HDR` record here if it fits.
    Buffer(&'a mut [u8]),
    /// Allocate a legacy message holding the record.
    Msg,
}

/// Result of a receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvOutcome {
    /// Full body length of the received message.
    pub len: usize,
    /// Bytes copied into caller buffers, or `len` for zero-copy receives.
    pub copied: usize,
    /// The message, for [`RecvBody::Msg`].
    pub msg: Option<MsgPtr>,
    /// The control message, for [`ControlTarget::Msg`].
    pub control: Option<MsgPtr>,
}

pub(crate) fn socket_id(fd: Fd) -> Result<SocketId> {
    u32::try_from(fd)
        .map(SocketId::from_raw)
        .map_err(|_| Error::Closed.into())
}

fn descriptor(id: u32) -> Result<i32> {
    i32::try_from(id).map_err(|_| Error::NoMemory.into())
}

/// Translate legacy send/recv flags.
///
/// # Errors
///
/// `EINVAL` for anything but `0` and `NN_DONTWAIT`.
pub fn parse_flags(flags: i32) -> Result<Flags> {
    match flags {
        0 => Ok(Flags::NONE),
        NN_DONTWAIT => Ok(Flags::NONBLOCK),
        _ => Err(Error::InvalidArgument.into()),
    }
}

/// Open a socket.
///
/// # Errors
///
/// `EAFNOSUPPORT` unless `domain` is `AF_SP` or `AF_SP_RAW`; `ENOTSUP` for
/// an unknown protocol number.
pub fn socket(domain: i32, protocol: i32) -> Result<Fd> {
    if domain != AF_SP && domain != AF_SP_RAW {
        return Err(LegacyError::from_raw(libc::EAFNOSUPPORT));
    }
    let protocol = u16::try_from(protocol)
        .ok()
        .and_then(Protocol::from_number)
        .ok_or(LegacyError::from(Error::NotSupported))?;

    let id = core::open(protocol)?;
    if domain == AF_SP_RAW {
        if let Err(err) = core::set_option(id, SockOpt::Raw, OptionValue::Bool(true)) {
            let _ = core::close(id);
            return Err(err.into());
        }
    }
    match descriptor(id.get()) {
        Ok(fd) => Ok(fd),
        Err(err) => {
            let _ = core::close(id);
            Err(err)
        }
    }
}

pub fn close(fd: Fd) -> Result<()> {
    core::close(socket_id(fd)?)?;
    Ok(())
}

/// Bind synchronously; returns the endpoint id.
pub fn bind(fd: Fd, addr: &str) -> Result<i32> {
    let ep = core::listen(socket_id(fd)?, addr, Flags::SYNCH)?;
    descriptor(ep.get())
}

/// Dial asynchronously; returns the endpoint id.
pub fn connect(fd: Fd, addr: &str) -> Result<i32> {
    let ep = core::dial(socket_id(fd)?, addr, Flags::NONE)?;
    descriptor(ep.get())
}

/// Close endpoint `ep`. The socket descriptor is not consulted.
pub fn shutdown(_fd: Fd, ep: i32) -> Result<()> {
    let ep = u32::try_from(ep).map_err(|_| LegacyError::from(Error::NoEntry))?;
    core::endpoint_close(EndpointId::from_raw(ep))?;
    Ok(())
}

/// Send a message; returns the body length.
pub fn send(fd: Fd, body: SendBody<'_>, flags: i32) -> Result<usize> {
    sendmsg(fd, body, None, flags)
}

fn gather(parts: &[&[u8]]) -> Result<Message> {
    let total = parts
        .iter()
        .try_fold(0usize, |acc, part| acc.checked_add(part.len()))
        .ok_or(LegacyError::from(Error::InvalidArgument))?;
    let mut msg = Message::alloc(total)?;
    let mut offset = 0;
    for part in parts {
        msg.body_mut()[offset..offset + part.len()].copy_from_slice(part);
        offset += part.len();
    }
    Ok(msg)
}

fn control_header(control: Control<'_>) -> Result<Vec<u8>> {
    match control {
        Control::Bytes(bytes) => cmsg::sp_header(bytes),
        Control::Msg(ptr) => msg::with_msg(ptr, |c| cmsg::sp_header(c.body()))?,
    }
}

/// A caller-owned message taken for sending, with the header it came in with.
struct Borrowed {
    ptr: MsgPtr,
    header: Vec<u8>,
}

/// Give a zero-copy message back to the caller after a failed send, header
/// included.
fn restore(zero_copy: Option<Borrowed>, mut msg: Message) {
    if let Some(Borrowed { ptr, header }) = zero_copy {
        msg.clear_header();
        if let Err(error) = msg.append_header(&header) {
            warn!(%error, "header of returned message lost");
        }
        msg::repark(ptr, msg);
    }
}

/// Send a message with optional control data; returns the body length.
///
/// A zero-copy body stays owned by the caller whenever this fails.
pub fn sendmsg(
    fd: Fd,
    body: SendBody<'_>,
    control: Option<Control<'_>>,
    flags: i32,
) -> Result<usize> {
    let flags = parse_flags(flags)?;
    let id = socket_id(fd)?;

    let (mut msg, zero_copy) = match body {
        SendBody::Msg(ptr) => {
            let msg = msg::unpark(ptr)?;
            let header = msg.header().to_vec();
            (msg, Some(Borrowed { ptr, header }))
        }
        SendBody::Copy(parts) => (gather(parts)?, None),
    };

    // Control data replaces whatever header the message carried.
    if let Some(control) = control {
        let attached = control_header(control).and_then(|header| {
            msg.clear_header();
            msg.append_header(&header).map_err(LegacyError::from)
        });
        if let Err(err) = attached {
            restore(zero_copy, msg);
            return Err(err);
        }
    }

    let len = msg.len();
    match core::send_msg(id, msg, flags) {
        Ok(()) => {
            if let Some(Control::Msg(ptr)) = control {
                let _ = msg::free_msg(ptr);
            }
            Ok(len)
        }
        Err(SendError { error, msg }) => {
            debug!(fd, %error, "send failed");
            restore(zero_copy, msg);
            Err(error.into())
        }
    }
}

/// Receive a message.
///
/// With [`RecvBody::Copy`] a message larger than the buffers is silently
/// truncated; `copied` tells how much arrived.
pub fn recv(fd: Fd, body: RecvBody<'_, '_>, flags: i32) -> Result<RecvOutcome> {
    recvmsg(fd, body, ControlTarget::None, flags)
}

fn scatter(body: &[u8], bufs: &mut [&mut [u8]]) -> usize {
    let mut rest = body;
    let mut copied = 0;
    for buf in bufs.iter_mut() {
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        rest = &rest[n..];
        copied += n;
    }
    copied
}

/// Receive a message with optional control data.
pub fn recvmsg(
    fd: Fd,
    body: RecvBody<'_, '_>,
    control: ControlTarget<'_>,
    flags: i32,
) -> Result<RecvOutcome> {
    let flags = parse_flags(flags)?;
    let msg = core::recv_msg(socket_id(fd)?, flags)?;

    let control = match control {
        ControlTarget::None => None,
        ControlTarget::Buffer(buf) => {
            cmsg::encode_sp_header(msg.header(), buf);
            None
        }
        ControlTarget::Msg => {
            let mut block = Message::alloc(cmsg::space(msg.header_len()))?;
            cmsg::encode_sp_header(msg.header(), block.body_mut());
            Some(msg::park(block)?)
        }
    };

    let len = msg.len();
    match body {
        RecvBody::Msg => match msg::park(msg) {
            Ok(ptr) => Ok(RecvOutcome {
                len,
                copied: len,
                msg: Some(ptr),
                control,
            }),
            Err(err) => {
                if let Some(ptr) = control {
                    let _ = msg::free_msg(ptr);
                }
                Err(err)
            }
        },
        RecvBody::Copy(bufs) => Ok(RecvOutcome {
            len,
            copied: scatter(msg.body(), bufs),
            msg: None,
            control,
        }),
    }
}
