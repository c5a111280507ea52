//! Handle-based socket layer.
//!
//! Sockets live in a global registry keyed by [`SocketId`]; endpoints by
//! [`EndpointId`]. The free functions (`open`, `listen`, `dial`, `send_msg`,
//! `recv_msg`, ...) are the stable interface the legacy shim is written
//! against. [`Socket`] is an owning convenience wrapper that closes on drop.
//!
//! Only the `inproc://` transport is provided. A listener registers its name
//! in [`crate::inproc`]; a dialer is linked to the listener as soon as both
//! exist, in either order, which makes `dial` asynchronous: it succeeds once
//! the attempt is recorded, not once a peer is present.
//!
//! Every message delivered to a peer carries the sender's socket id as the
//! first big-endian `u32` of its header. Cooked (non-raw) sockets strip and
//! interpret that header; raw sockets hand it to the application.
//!
//! # Example
//!
//! ```
//! use spmq_core::message::Message;
//! use spmq_core::protocol::Protocol;
//! use spmq_core::socket::Socket;
//!
//! let rep = Socket::open(Protocol::Rep).unwrap();
//! rep.listen("inproc://doc-reqrep").unwrap();
//! let req = Socket::open(Protocol::Req).unwrap();
//! req.dial("inproc://doc-reqrep").unwrap();
//!
//! req.send(Message::from_body(b"ping").unwrap()).unwrap();
//! let request = rep.recv().unwrap();
//! assert_eq!(request.body(), b"ping");
//!
//! rep.send(Message::from_body(b"pong").unwrap()).unwrap();
//! assert_eq!(req.recv().unwrap().body(), b"pong");
//! ```

mod pipes;
mod route;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::inproc::{self, Listener};
use crate::message::Message;
use crate::options::{OptionValue, SockOpt, SocketOptions};
use crate::protocol::Protocol;
use crate::sync::{CondVar, Mutex};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Identifier of an open socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u32);

/// Identifier of a listener or dialer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u32);

impl SocketId {
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl EndpointId {
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Self = Self(0);
    /// Fail with [`Error::Again`] instead of blocking.
    pub const NONBLOCK: Self = Self(1);
    /// Complete `listen`/`dial` before returning.
    pub const SYNCH: Self = Self(2);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A failed send. Ownership of the message returns to the caller.
#[derive(Error)]
#[error("send failed: {error}")]
pub struct SendError {
    pub error: Error,
    pub msg: Message,
}

impl SendError {
    pub(crate) fn new(error: Error, msg: Message) -> Self {
        Self { error, msg }
    }

    #[must_use]
    pub fn into_message(self) -> Message {
        self.msg
    }
}

impl fmt::Debug for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError")
            .field("error", &self.error)
            .field("msg", &self.msg)
            .finish()
    }
}

impl From<SendError> for Error {
    fn from(err: SendError) -> Self {
        err.error
    }
}

pub(crate) enum Inbound {
    Msg(Message),
    Closed,
}

/// One direction of a link between two sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pipe {
    peer: SocketId,
    /// Local endpoint the link was made through.
    via: EndpointId,
    /// The peer's endpoint for the same link.
    peer_via: EndpointId,
}

#[derive(Debug)]
enum EndpointKind {
    Listener { name: String },
    Dialer { name: String, linked: bool },
}

#[derive(Default)]
struct SocketState {
    pipes: Vec<Pipe>,
    cursor: usize,
    endpoints: HashMap<EndpointId, EndpointKind>,
    /// REQ / SURVEYOR: id of the outstanding request.
    pending: Option<u32>,
    next_request: u32,
    /// REP / RESPONDENT: header of the request being answered.
    backtrace: Option<SmallVec<[u8; 16]>>,
}

pub(crate) struct SocketCore {
    id: SocketId,
    protocol: Protocol,
    options: Mutex<SocketOptions>,
    state: Mutex<SocketState>,
    inbox_tx: flume::Sender<Inbound>,
    inbox_rx: flume::Receiver<Inbound>,
    closed: AtomicBool,
}

impl SocketCore {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct Registry {
    sockets: DashMap<SocketId, Arc<SocketCore>>,
    endpoints: DashMap<EndpointId, SocketId>,
    next_socket: AtomicU32,
    next_endpoint: AtomicU32,
    /// Bumped whenever links appear or disappear.
    topology: Mutex<u64>,
    changed: CondVar,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let topology = Mutex::new(0);
    let changed = CondVar::new(&topology);
    Registry {
        sockets: DashMap::new(),
        endpoints: DashMap::new(),
        next_socket: AtomicU32::new(1),
        next_endpoint: AtomicU32::new(1),
        topology,
        changed,
    }
});

fn lookup(id: SocketId) -> Result<Arc<SocketCore>> {
    REGISTRY
        .sockets
        .get(&id)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or(Error::Closed)
}

fn topology_changed() {
    let mut generation = REGISTRY.topology.lock();
    *generation = generation.wrapping_add(1);
    REGISTRY.changed.wake_all();
}

fn inproc_name(url: &str) -> Result<String> {
    match Endpoint::parse(url)? {
        Endpoint::Inproc(name) => Ok(name),
        other => {
            debug!(endpoint = %other, "transport not available");
            Err(Error::NotSupported)
        }
    }
}

/// Open a socket speaking `protocol`.
pub fn open(protocol: Protocol) -> Result<SocketId> {
    crate::init::platform_init()?;

    let id = SocketId(REGISTRY.next_socket.fetch_add(1, Ordering::Relaxed));
    let (inbox_tx, inbox_rx) = flume::unbounded();
    let core = Arc::new(SocketCore {
        id,
        protocol,
        options: Mutex::new(SocketOptions::default()),
        state: Mutex::new(SocketState::default()),
        inbox_tx,
        inbox_rx,
        closed: AtomicBool::new(false),
    });
    REGISTRY.sockets.insert(id, core);
    debug!(socket = %id, %protocol, "socket opened");
    Ok(id)
}

/// Close a socket, its endpoints and its links. Blocked receivers wake with
/// [`Error::Closed`]; undelivered messages are dropped.
pub fn close(id: SocketId) -> Result<()> {
    let (_, sock) = REGISTRY.sockets.remove(&id).ok_or(Error::Closed)?;
    sock.closed.store(true, Ordering::Release);

    let (endpoints, links) = {
        let mut state = sock.state.lock();
        (
            std::mem::take(&mut state.endpoints),
            std::mem::take(&mut state.pipes),
        )
    };
    for (ep, kind) in endpoints {
        REGISTRY.endpoints.remove(&ep);
        if let EndpointKind::Listener { name } = kind {
            inproc::unbind_inproc(&name, ep.get());
        }
    }
    for pipe in &links {
        pipes::detach_remote(id, pipe);
    }

    let _ = sock.inbox_tx.send(Inbound::Closed);
    topology_changed();
    debug!(socket = %id, "socket closed");
    Ok(())
}

/// Bind `url` on socket `id`.
///
/// The in-process transport binds immediately, so [`Flags::SYNCH`] and the
/// default behave the same: errors such as [`Error::AddrInUse`] are
/// reported directly.
pub fn listen(id: SocketId, url: &str, flags: Flags) -> Result<EndpointId> {
    let sock = lookup(id)?;
    let name = inproc_name(url)?;
    let ep = EndpointId(REGISTRY.next_endpoint.fetch_add(1, Ordering::Relaxed));

    inproc::bind_inproc(
        &name,
        Listener {
            socket: id.get(),
            endpoint: ep.get(),
        },
    )?;
    sock.state
        .lock()
        .endpoints
        .insert(ep, EndpointKind::Listener { name: name.clone() });
    REGISTRY.endpoints.insert(ep, id);

    if sock.is_closed() {
        let _ = endpoint_close(ep);
        return Err(Error::Closed);
    }

    pipes::accept_pending(&sock, ep, &name);
    topology_changed();
    debug!(socket = %id, endpoint = %ep, url, synch = flags.contains(Flags::SYNCH), "listening");
    Ok(ep)
}

/// Start connecting socket `id` to `url`.
///
/// Without [`Flags::SYNCH`] this returns as soon as the dialer is recorded;
/// the link is made whenever a listener for the name appears. With
/// [`Flags::SYNCH`] a missing listener fails with
/// [`Error::ConnectionRefused`].
pub fn dial(id: SocketId, url: &str, flags: Flags) -> Result<EndpointId> {
    let sock = lookup(id)?;
    let name = inproc_name(url)?;
    if flags.contains(Flags::SYNCH) && inproc::lookup_inproc(&name).is_none() {
        return Err(Error::ConnectionRefused);
    }

    let ep = EndpointId(REGISTRY.next_endpoint.fetch_add(1, Ordering::Relaxed));
    sock.state.lock().endpoints.insert(
        ep,
        EndpointKind::Dialer {
            name: name.clone(),
            linked: false,
        },
    );
    REGISTRY.endpoints.insert(ep, id);

    pipes::connect_dialer(&sock, ep, &name);
    topology_changed();
    debug!(socket = %id, endpoint = %ep, url, "dialing");
    Ok(ep)
}

/// Close a single listener or dialer and the links made through it.
pub fn endpoint_close(ep: EndpointId) -> Result<()> {
    let (_, owner) = REGISTRY.endpoints.remove(&ep).ok_or(Error::NoEntry)?;
    let sock = lookup(owner)?;

    let (kind, dropped) = {
        let mut state = sock.state.lock();
        let kind = state.endpoints.remove(&ep);
        let (dropped, kept): (Vec<Pipe>, Vec<Pipe>) =
            std::mem::take(&mut state.pipes)
                .into_iter()
                .partition(|pipe| pipe.via == ep);
        state.pipes = kept;
        (kind, dropped)
    };
    if let Some(EndpointKind::Listener { name }) = kind {
        inproc::unbind_inproc(&name, ep.get());
    }
    for pipe in &dropped {
        pipes::detach_remote(owner, pipe);
    }

    topology_changed();
    debug!(socket = %owner, endpoint = %ep, "endpoint closed");
    Ok(())
}

/// Send `msg`. On failure the message is handed back inside [`SendError`].
pub fn send_msg(id: SocketId, msg: Message, flags: Flags) -> std::result::Result<(), SendError> {
    match lookup(id) {
        Ok(sock) => sock.send(msg, flags),
        Err(error) => Err(SendError::new(error, msg)),
    }
}

/// Receive the next message.
pub fn recv_msg(id: SocketId, flags: Flags) -> Result<Message> {
    lookup(id)?.recv(flags)
}

/// Set a socket option.
///
/// # Errors
///
/// - [`Error::NotSupported`] if the option belongs to another protocol
/// - whatever [`SocketOptions::apply`] reports for the value
pub fn set_option(id: SocketId, opt: SockOpt, value: OptionValue) -> Result<()> {
    let sock = lookup(id)?;
    if opt.protocol().is_some_and(|p| p != sock.protocol) {
        return Err(Error::NotSupported);
    }
    debug!(socket = %id, ?opt, ?value, "set option");
    let applied = sock.options.lock().apply(opt, value);
    applied
}

/// Read a socket option.
pub fn get_option(id: SocketId, opt: SockOpt) -> Result<OptionValue> {
    let sock = lookup(id)?;
    if opt.protocol().is_some_and(|p| p != sock.protocol) {
        return Err(Error::NotSupported);
    }
    match opt {
        SockOpt::Protocol => Ok(OptionValue::Int(i32::from(sock.protocol.number()))),
        _ => {
            let value = sock.options.lock().get(opt);
            value
        }
    }
}

/// Owning socket handle; closes the socket on drop.
#[derive(Debug)]
pub struct Socket {
    id: SocketId,
}

impl Socket {
    pub fn open(protocol: Protocol) -> Result<Self> {
        open(protocol).map(|id| Self { id })
    }

    #[must_use]
    pub const fn id(&self) -> SocketId {
        self.id
    }

    pub fn protocol(&self) -> Result<Protocol> {
        Ok(lookup(self.id)?.protocol)
    }

    /// Bind synchronously.
    pub fn listen(&self, url: &str) -> Result<EndpointId> {
        listen(self.id, url, Flags::SYNCH)
    }

    /// Dial asynchronously.
    pub fn dial(&self, url: &str) -> Result<EndpointId> {
        dial(self.id, url, Flags::NONE)
    }

    pub fn send(&self, msg: Message) -> std::result::Result<(), SendError> {
        send_msg(self.id, msg, Flags::NONE)
    }

    pub fn send_with(&self, msg: Message, flags: Flags) -> std::result::Result<(), SendError> {
        send_msg(self.id, msg, flags)
    }

    pub fn recv(&self) -> Result<Message> {
        recv_msg(self.id, Flags::NONE)
    }

    pub fn recv_with(&self, flags: Flags) -> Result<Message> {
        recv_msg(self.id, flags)
    }

    pub fn set_option(&self, opt: SockOpt, value: OptionValue) -> Result<()> {
        set_option(self.id, opt, value)
    }

    pub fn get_option(&self, opt: SockOpt) -> Result<OptionValue> {
        get_option(self.id, opt)
    }

    /// Give up ownership without closing.
    #[must_use]
    pub fn into_raw(self) -> SocketId {
        let id = self.id;
        std::mem::forget(self);
        id
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        let _ = close(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_close_twice() {
        let id = open(Protocol::Pair).unwrap();
        close(id).unwrap();
        assert_eq!(close(id), Err(Error::Closed));
        assert_eq!(recv_msg(id, Flags::NONE).unwrap_err(), Error::Closed);
    }

    #[test]
    fn test_listen_rejects_other_transports() {
        let sock = Socket::open(Protocol::Pair).unwrap();
        assert_eq!(sock.listen("tcp://127.0.0.1:5555"), Err(Error::NotSupported));
        assert_eq!(sock.listen("bogus"), Err(Error::AddrInvalid));
    }

    #[test]
    fn test_listen_twice_in_use() {
        let a = Socket::open(Protocol::Pair).unwrap();
        let b = Socket::open(Protocol::Pair).unwrap();
        a.listen("inproc://unit-in-use").unwrap();
        assert_eq!(b.listen("inproc://unit-in-use"), Err(Error::AddrInUse));
    }

    #[test]
    fn test_close_releases_name() {
        let a = Socket::open(Protocol::Pair).unwrap();
        a.listen("inproc://unit-release").unwrap();
        drop(a);
        let b = Socket::open(Protocol::Pair).unwrap();
        b.listen("inproc://unit-release").unwrap();
    }

    #[test]
    fn test_synch_dial_refused() {
        let sock = Socket::open(Protocol::Req).unwrap();
        assert_eq!(
            dial(sock.id(), "inproc://unit-nobody", Flags::SYNCH),
            Err(Error::ConnectionRefused)
        );
    }

    #[test]
    fn test_endpoint_close_unknown() {
        assert_eq!(
            endpoint_close(EndpointId::from_raw(u32::MAX)),
            Err(Error::NoEntry)
        );
    }

    #[test]
    fn test_protocol_scoped_option() {
        let req = Socket::open(Protocol::Req).unwrap();
        req.set_option(SockOpt::ResendTime, OptionValue::Micros(1_000_000))
            .unwrap();
        assert_eq!(
            req.set_option(SockOpt::Subscribe, OptionValue::Bytes("x".into())),
            Err(Error::NotSupported)
        );
        assert_eq!(
            req.get_option(SockOpt::Protocol).unwrap(),
            OptionValue::Int(48)
        );
    }

    #[test]
    fn test_set_then_get_through_registry() {
        let id = open(Protocol::Pair).unwrap();
        set_option(id, SockOpt::RecvMaxSize, OptionValue::Int(512)).unwrap();
        assert_eq!(
            get_option(id, SockOpt::RecvMaxSize).unwrap(),
            OptionValue::Int(512)
        );
        close(id).unwrap();
        assert_eq!(
            set_option(id, SockOpt::RecvMaxSize, OptionValue::Int(1)),
            Err(Error::Closed)
        );
    }

    #[test]
    fn test_recv_timeout_option() {
        let pull = Socket::open(Protocol::Pull).unwrap();
        pull.set_option(SockOpt::RecvTimeout, OptionValue::Micros(20_000))
            .unwrap();
        let started = std::time::Instant::now();
        assert_eq!(pull.recv().unwrap_err(), Error::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
