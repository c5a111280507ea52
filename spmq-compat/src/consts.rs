//! Numeric constants of the legacy API.
//!
//! Values match the historical `nn.h` and protocol headers so that existing
//! binaries and bindings keep working.

/// Standard scalability-protocols socket.
pub const AF_SP: i32 = 1;
/// Raw socket: protocol headers are visible to the application.
pub const AF_SP_RAW: i32 = 2;

/// Generic socket-level option level.
pub const NN_SOL_SOCKET: i32 = 0;

pub const NN_LINGER: i32 = 1;
pub const NN_SNDBUF: i32 = 2;
pub const NN_RCVBUF: i32 = 3;
pub const NN_SNDTIMEO: i32 = 4;
pub const NN_RCVTIMEO: i32 = 5;
pub const NN_RECONNECT_IVL: i32 = 6;
pub const NN_RECONNECT_IVL_MAX: i32 = 7;
pub const NN_SNDPRIO: i32 = 8;
pub const NN_RCVPRIO: i32 = 9;
pub const NN_SNDFD: i32 = 10;
pub const NN_RCVFD: i32 = 11;
pub const NN_DOMAIN: i32 = 12;
pub const NN_PROTOCOL: i32 = 13;
pub const NN_IPV4ONLY: i32 = 14;
pub const NN_SOCKET_NAME: i32 = 15;
pub const NN_RCVMAXSIZE: i32 = 16;
pub const NN_MAXTTL: i32 = 17;

/// Fail with `EAGAIN` instead of blocking.
pub const NN_DONTWAIT: i32 = 1;

/// Length sentinel selecting zero-copy messages instead of buffers.
pub const NN_MSG: usize = usize::MAX;

/// Control message level and type carrying the protocol header.
pub const PROTO_SP: i32 = 1;
pub const SP_HDR: i32 = 1;

// Protocol numbers double as option levels.
pub const NN_PROTO_PAIR: i32 = 1;
pub const NN_PAIR: i32 = NN_PROTO_PAIR * 16;
pub const NN_PROTO_PUBSUB: i32 = 2;
pub const NN_PUB: i32 = NN_PROTO_PUBSUB * 16;
pub const NN_SUB: i32 = NN_PROTO_PUBSUB * 16 + 1;
pub const NN_PROTO_REQREP: i32 = 3;
pub const NN_REQ: i32 = NN_PROTO_REQREP * 16;
pub const NN_REP: i32 = NN_PROTO_REQREP * 16 + 1;
pub const NN_PROTO_PIPELINE: i32 = 5;
pub const NN_PUSH: i32 = NN_PROTO_PIPELINE * 16;
pub const NN_PULL: i32 = NN_PROTO_PIPELINE * 16 + 1;
pub const NN_PROTO_SURVEY: i32 = 6;
pub const NN_SURVEYOR: i32 = NN_PROTO_SURVEY * 16 + 2;
pub const NN_RESPONDENT: i32 = NN_PROTO_SURVEY * 16 + 3;
pub const NN_PROTO_BUS: i32 = 7;
pub const NN_BUS: i32 = NN_PROTO_BUS * 16;

pub const NN_REQ_RESEND_IVL: i32 = 1;
pub const NN_SUB_SUBSCRIBE: i32 = 1;
pub const NN_SUB_UNSUBSCRIBE: i32 = 2;
pub const NN_SURVEYOR_DEADLINE: i32 = 1;

/// Base of the errno values the legacy library defines itself.
pub const NN_HAUSNUMERO: i32 = 156_384_712;
/// Operation not valid in the current protocol state.
pub const EFSM: i32 = NN_HAUSNUMERO + 54;
/// Library is terminating.
pub const ETERM: i32 = NN_HAUSNUMERO + 53;

#[cfg(test)]
mod tests {
    use super::*;
    use spmq_core::protocol::Protocol;

    #[test]
    fn test_protocol_numbers_agree() {
        let pairs = [
            (NN_PAIR, Protocol::Pair),
            (NN_PUB, Protocol::Pub),
            (NN_SUB, Protocol::Sub),
            (NN_REQ, Protocol::Req),
            (NN_REP, Protocol::Rep),
            (NN_PUSH, Protocol::Push),
            (NN_PULL, Protocol::Pull),
            (NN_SURVEYOR, Protocol::Surveyor),
            (NN_RESPONDENT, Protocol::Respondent),
            (NN_BUS, Protocol::Bus),
        ];
        for (number, protocol) in pairs {
            assert_eq!(i32::from(protocol.number()), number);
        }
    }
}
