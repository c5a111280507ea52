//! Per-protocol send and receive paths.

use super::{lookup, Flags, Inbound, SendError, SocketCore, SocketId, REGISTRY};
use crate::clock;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::Protocol;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Bit set on every request and survey id so it can't be confused with a
/// socket id in a backtrace.
const REQUEST_ID_FLAG: u32 = 0x8000_0000;

/// Shortest header a REP or RESPONDENT accepts: peer id plus request id.
const MIN_BACKTRACE: usize = 8;

enum Route {
    Broadcast,
    RoundRobin,
    Reply,
}

impl Route {
    const fn of(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Pub | Protocol::Bus | Protocol::Surveyor => Self::Broadcast,
            Protocol::Rep | Protocol::Respondent => Self::Reply,
            Protocol::Pair | Protocol::Push | Protocol::Req | Protocol::Sub | Protocol::Pull => {
                Self::RoundRobin
            }
        }
    }
}

impl SocketCore {
    pub(super) fn send(&self, msg: Message, flags: Flags) -> std::result::Result<(), SendError> {
        if !self.protocol.can_send() {
            return Err(SendError::new(Error::NotSupported, msg));
        }
        if self.is_closed() {
            return Err(SendError::new(Error::Closed, msg));
        }
        let (raw, send_timeout) = {
            let options = self.options.lock();
            (options.raw, options.send_timeout)
        };

        match Route::of(self.protocol) {
            Route::Broadcast => self.broadcast(msg, raw),
            Route::RoundRobin => self.round_robin(msg, raw, flags, send_timeout),
            Route::Reply => self.reply(msg, raw),
        }
    }

    fn next_request_id(&self) -> u32 {
        let mut state = self.state.lock();
        state.next_request = state.next_request.wrapping_add(1);
        state.next_request | REQUEST_ID_FLAG
    }

    /// Hand `msg` to `peer`, tagged with our id.
    fn deliver(&self, peer: &SocketCore, mut msg: Message) -> std::result::Result<(), SendError> {
        if peer.is_closed() {
            return Err(SendError::new(Error::Closed, msg));
        }
        if let Err(error) = msg.prepend_header(&self.id.get().to_be_bytes()) {
            return Err(SendError::new(error, msg));
        }
        trace!(from = %self.id, to = %peer.id, len = msg.len(), "deliver");
        if let Err(flume::SendError(Inbound::Msg(mut msg))) =
            peer.inbox_tx.send(Inbound::Msg(msg))
        {
            let _ = msg.trim_header(4);
            return Err(SendError::new(Error::Closed, msg));
        }
        Ok(())
    }

    fn peers(&self) -> Vec<SocketId> {
        self.state.lock().pipes.iter().map(|pipe| pipe.peer).collect()
    }

    fn broadcast(&self, mut msg: Message, raw: bool) -> std::result::Result<(), SendError> {
        if !raw && self.protocol == Protocol::Surveyor {
            let id = self.next_request_id();
            msg.clear_header();
            if let Err(error) = msg.append_header_u32(id) {
                return Err(SendError::new(error, msg));
            }
            self.state.lock().pending = Some(id);
        }

        let peers = self.peers();
        if peers.is_empty() {
            trace!(socket = %self.id, "no peers, message dropped");
            return Ok(());
        }
        for peer in peers {
            let Ok(peer) = lookup(peer) else { continue };
            let copy = match msg.dup() {
                Ok(copy) => copy,
                Err(error) => {
                    warn!(socket = %self.id, %error, "broadcast copy failed");
                    continue;
                }
            };
            let _ = self.deliver(&peer, copy);
        }
        Ok(())
    }

    fn next_peer(&self) -> Option<Arc<SocketCore>> {
        let mut state = self.state.lock();
        for _ in 0..state.pipes.len() {
            let index = if self.protocol == Protocol::Pair {
                0
            } else {
                let index = state.cursor % state.pipes.len();
                state.cursor = index + 1;
                index
            };
            if let Ok(peer) = lookup(state.pipes[index].peer) {
                return Some(peer);
            }
        }
        None
    }

    /// Pick a peer, waiting for one to appear unless `flags` forbids it.
    fn wait_for_peer(&self, flags: Flags, timeout: Option<Duration>) -> Result<Arc<SocketCore>> {
        let nonblock = flags.contains(Flags::NONBLOCK) || timeout == Some(Duration::ZERO);
        let deadline = if nonblock {
            Some(0)
        } else {
            timeout.map(clock::deadline_after)
        };

        let mut generation = REGISTRY.topology.lock();
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            if let Some(peer) = self.next_peer() {
                return Ok(peer);
            }
            match deadline {
                None => REGISTRY.changed.wait(&mut generation),
                Some(deadline) => {
                    if REGISTRY.changed.wait_until(&mut generation, deadline).timed_out() {
                        return self.next_peer().ok_or(if nonblock {
                            Error::Again
                        } else {
                            Error::TimedOut
                        });
                    }
                }
            }
        }
    }

    fn round_robin(
        &self,
        mut msg: Message,
        raw: bool,
        flags: Flags,
        timeout: Option<Duration>,
    ) -> std::result::Result<(), SendError> {
        let request = (!raw && self.protocol == Protocol::Req).then(|| self.next_request_id());
        if let Some(id) = request {
            msg.clear_header();
            if let Err(error) = msg.append_header_u32(id) {
                return Err(SendError::new(error, msg));
            }
        } else if !raw {
            msg.clear_header();
        }

        loop {
            let peer = match self.wait_for_peer(flags, timeout) {
                Ok(peer) => peer,
                Err(error) => return Err(SendError::new(error, msg)),
            };
            match self.deliver(&peer, msg) {
                Ok(()) => break,
                // Peer closed between pick and delivery; try the next one.
                Err(SendError {
                    error: Error::Closed,
                    msg: returned,
                }) => msg = returned,
                Err(err) => return Err(err),
            }
        }

        if let Some(id) = request {
            self.state.lock().pending = Some(id);
        }
        Ok(())
    }

    fn reply(&self, mut msg: Message, raw: bool) -> std::result::Result<(), SendError> {
        if !raw {
            let Some(backtrace) = self.state.lock().backtrace.take() else {
                return Err(SendError::new(Error::State, msg));
            };
            msg.clear_header();
            if let Err(error) = msg.append_header(&backtrace) {
                return Err(SendError::new(error, msg));
            }
        }

        let Ok(target) = msg.trim_header_u32() else {
            warn!(socket = %self.id, "reply without routing header dropped");
            return Ok(());
        };
        let target = SocketId(target);
        let linked = self.peers().contains(&target);
        match lookup(target) {
            Ok(peer) if linked => {
                if let Err(err) = self.deliver(&peer, msg) {
                    warn!(socket = %self.id, peer = %target, error = %err.error, "reply dropped");
                }
            }
            _ => warn!(socket = %self.id, peer = %target, "reply to departed peer dropped"),
        }
        Ok(())
    }

    pub(super) fn recv(&self, flags: Flags) -> Result<Message> {
        if !self.protocol.can_recv() {
            return Err(Error::NotSupported);
        }
        let (raw, timeout, max_size) = {
            let options = self.options.lock();
            (options.raw, options.recv_timeout, options.recv_max_size)
        };
        if !raw
            && matches!(self.protocol, Protocol::Req | Protocol::Surveyor)
            && self.state.lock().pending.is_none()
        {
            return Err(Error::State);
        }

        let nonblock = flags.contains(Flags::NONBLOCK) || timeout == Some(Duration::ZERO);
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            let inbound = if nonblock {
                self.inbox_rx.try_recv().map_err(|err| match err {
                    flume::TryRecvError::Empty => Error::Again,
                    flume::TryRecvError::Disconnected => Error::Closed,
                })?
            } else if let Some(deadline) = deadline {
                self.inbox_rx
                    .recv_deadline(deadline)
                    .map_err(|err| match err {
                        flume::RecvTimeoutError::Timeout => Error::TimedOut,
                        flume::RecvTimeoutError::Disconnected => Error::Closed,
                    })?
            } else {
                self.inbox_rx.recv().map_err(|_| Error::Closed)?
            };

            let msg = match inbound {
                Inbound::Msg(msg) => msg,
                Inbound::Closed => {
                    // Leave the marker for any other blocked receiver.
                    let _ = self.inbox_tx.send(Inbound::Closed);
                    return Err(Error::Closed);
                }
            };
            if max_size.is_some_and(|max| msg.len() > max) {
                warn!(socket = %self.id, len = msg.len(), "oversized message dropped");
                continue;
            }
            if raw {
                return Ok(msg);
            }
            if let Some(msg) = self.cook_incoming(msg) {
                return Ok(msg);
            }
        }
    }

    /// Strip protocol headers. `None` means the message is discarded.
    fn cook_incoming(&self, mut msg: Message) -> Option<Message> {
        match self.protocol {
            Protocol::Req | Protocol::Surveyor => {
                let _peer = msg.trim_header_u32().ok()?;
                let id = msg.trim_header_u32().ok()?;
                let mut state = self.state.lock();
                if state.pending != Some(id) {
                    trace!(socket = %self.id, id, "stale reply dropped");
                    return None;
                }
                // A survey collects many answers; a request exactly one.
                if self.protocol == Protocol::Req {
                    state.pending = None;
                }
                msg.clear_header();
                Some(msg)
            }
            Protocol::Rep | Protocol::Respondent => {
                if msg.header_len() < MIN_BACKTRACE {
                    trace!(socket = %self.id, "request without backtrace dropped");
                    return None;
                }
                self.state.lock().backtrace = Some(SmallVec::from_slice(msg.header()));
                msg.clear_header();
                Some(msg)
            }
            _ => {
                msg.clear_header();
                Some(msg)
            }
        }
    }
}
