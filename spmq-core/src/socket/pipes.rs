//! Linking and unlinking sockets.
//!
//! Lock order is `REGISTRY.topology` before any socket state, and no two
//! socket states are ever held at once: each side of a link is updated under
//! its own lock in turn.

use super::{lookup, EndpointId, EndpointKind, Pipe, SocketCore, SocketId, REGISTRY};
use crate::inproc;
use std::sync::Arc;
use tracing::{trace, warn};

/// Link the dialer endpoint `dialer_ep` of `dialer` to the listener
/// `listener_ep` of `listener`. No-op if the dialer is already linked or was
/// closed in the meantime.
fn link(
    dialer: &SocketCore,
    dialer_ep: EndpointId,
    listener: &SocketCore,
    listener_ep: EndpointId,
) {
    if !dialer.protocol.is_compatible(listener.protocol) {
        warn!(
            dialer = %dialer.id,
            listener = %listener.id,
            "incompatible protocols {} and {}",
            dialer.protocol,
            listener.protocol
        );
        return;
    }

    {
        let mut state = dialer.state.lock();
        match state.endpoints.get_mut(&dialer_ep) {
            Some(EndpointKind::Dialer { linked, .. }) if !*linked => *linked = true,
            _ => return,
        }
        state.pipes.push(Pipe {
            peer: listener.id,
            via: dialer_ep,
            peer_via: listener_ep,
        });
    }
    listener.state.lock().pipes.push(Pipe {
        peer: dialer.id,
        via: listener_ep,
        peer_via: dialer_ep,
    });

    trace!(dialer = %dialer.id, listener = %listener.id, "pipe added");
}

/// Link a freshly created dialer if its name is already bound.
pub(super) fn connect_dialer(sock: &SocketCore, ep: EndpointId, name: &str) {
    let Some(bound) = inproc::lookup_inproc(name) else {
        trace!(socket = %sock.id, name, "no listener yet, dial pending");
        return;
    };
    if let Ok(listener) = lookup(SocketId(bound.socket)) {
        link(sock, ep, &listener, EndpointId(bound.endpoint));
    }
}

/// Link every pending dialer for `name` to a new listener.
pub(super) fn accept_pending(listener: &SocketCore, ep: EndpointId, name: &str) {
    let sockets: Vec<Arc<SocketCore>> = REGISTRY
        .sockets
        .iter()
        .map(|entry| Arc::clone(entry.value()))
        .collect();

    for sock in sockets.iter().filter(|s| s.id != listener.id) {
        let waiting: Vec<EndpointId> = sock
            .state
            .lock()
            .endpoints
            .iter()
            .filter_map(|(id, kind)| match kind {
                EndpointKind::Dialer { name: n, linked: false } if n == name => Some(*id),
                _ => None,
            })
            .collect();
        for dialer_ep in waiting {
            link(sock, dialer_ep, listener, ep);
        }
    }
}

/// Remove the far side of `pipe`, which belonged to socket `local`.
///
/// If the far side reached us by dialing, its dialer goes back to pending so
/// a later listener under the same name picks it up again.
pub(super) fn detach_remote(local: SocketId, pipe: &Pipe) {
    let Ok(peer) = lookup(pipe.peer) else {
        return;
    };
    let mut state = peer.state.lock();
    state
        .pipes
        .retain(|p| !(p.peer == local && p.via == pipe.peer_via));
    if let Some(EndpointKind::Dialer { linked, .. }) = state.endpoints.get_mut(&pipe.peer_via) {
        *linked = false;
    }
    trace!(socket = %peer.id, peer = %local, "pipe removed");
}
