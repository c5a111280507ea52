//! Legacy `(level, name)` option pairs mapped onto typed socket options.
//!
//! Time-valued legacy options are `int` milliseconds; the socket layer works
//! in microseconds, so those entries convert in both directions. Pairs
//! missing from the table are reported as `ENOPROTOOPT`.

use crate::consts::{
    AF_SP, AF_SP_RAW, NN_DOMAIN, NN_LINGER, NN_MAXTTL, NN_PROTOCOL, NN_RCVBUF, NN_RCVFD,
    NN_RCVMAXSIZE, NN_RCVTIMEO, NN_RECONNECT_IVL, NN_RECONNECT_IVL_MAX, NN_REQ,
    NN_REQ_RESEND_IVL, NN_SNDBUF, NN_SNDFD, NN_SNDTIMEO, NN_SOL_SOCKET, NN_SUB,
    NN_SUB_SUBSCRIBE, NN_SUB_UNSUBSCRIBE, NN_SURVEYOR, NN_SURVEYOR_DEADLINE,
};
use crate::errno::{LegacyError, Result};
use crate::socket::{socket_id, Fd};
use bytes::Bytes;
use spmq_core::error::Error;
use spmq_core::options::{OptionKind, OptionValue, SockOpt};
use spmq_core::socket as core;

const INT_LEN: usize = std::mem::size_of::<i32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    None,
    /// Legacy milliseconds to microseconds.
    Millis,
    /// Raw flag reported as the socket's domain.
    Domain,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    level: i32,
    name: i32,
    opt: SockOpt,
    conv: Conversion,
    settable: bool,
}

const fn entry(level: i32, name: i32, opt: SockOpt, conv: Conversion) -> Mapping {
    Mapping {
        level,
        name,
        opt,
        conv,
        settable: true,
    }
}

const fn read_only(level: i32, name: i32, opt: SockOpt, conv: Conversion) -> Mapping {
    Mapping {
        level,
        name,
        opt,
        conv,
        settable: false,
    }
}

static MAPPINGS: [Mapping; 17] = [
    entry(NN_SOL_SOCKET, NN_LINGER, SockOpt::Linger, Conversion::Millis),
    entry(NN_SOL_SOCKET, NN_SNDBUF, SockOpt::SendBuf, Conversion::None),
    entry(NN_SOL_SOCKET, NN_RCVBUF, SockOpt::RecvBuf, Conversion::None),
    entry(NN_SOL_SOCKET, NN_RECONNECT_IVL, SockOpt::ReconnectTime, Conversion::Millis),
    entry(NN_SOL_SOCKET, NN_RECONNECT_IVL_MAX, SockOpt::ReconnectMaxTime, Conversion::Millis),
    entry(NN_SOL_SOCKET, NN_SNDFD, SockOpt::SendFd, Conversion::None),
    entry(NN_SOL_SOCKET, NN_RCVFD, SockOpt::RecvFd, Conversion::None),
    entry(NN_SOL_SOCKET, NN_RCVMAXSIZE, SockOpt::RecvMaxSize, Conversion::None),
    entry(NN_SOL_SOCKET, NN_MAXTTL, SockOpt::MaxTtl, Conversion::None),
    entry(NN_SOL_SOCKET, NN_RCVTIMEO, SockOpt::RecvTimeout, Conversion::Millis),
    entry(NN_SOL_SOCKET, NN_SNDTIMEO, SockOpt::SendTimeout, Conversion::Millis),
    read_only(NN_SOL_SOCKET, NN_DOMAIN, SockOpt::Raw, Conversion::Domain),
    read_only(NN_SOL_SOCKET, NN_PROTOCOL, SockOpt::Protocol, Conversion::None),
    entry(NN_REQ, NN_REQ_RESEND_IVL, SockOpt::ResendTime, Conversion::Millis),
    entry(NN_SUB, NN_SUB_SUBSCRIBE, SockOpt::Subscribe, Conversion::None),
    entry(NN_SUB, NN_SUB_UNSUBSCRIBE, SockOpt::Unsubscribe, Conversion::None),
    entry(NN_SURVEYOR, NN_SURVEYOR_DEADLINE, SockOpt::SurveyTime, Conversion::Millis),
];

fn lookup(level: i32, name: i32) -> Result<&'static Mapping> {
    MAPPINGS
        .iter()
        .find(|m| m.level == level && m.name == name)
        .ok_or(LegacyError::from_raw(libc::ENOPROTOOPT))
}

fn read_int(value: &[u8]) -> Result<i32> {
    let bytes: [u8; INT_LEN] = value
        .try_into()
        .map_err(|_| LegacyError::from(Error::InvalidArgument))?;
    Ok(i32::from_ne_bytes(bytes))
}

fn decode(mapping: &Mapping, value: &[u8]) -> Result<OptionValue> {
    match (mapping.conv, mapping.opt.kind()) {
        (Conversion::Millis, _) => {
            let ms = read_int(value)?;
            // Negative stays negative: "infinite".
            Ok(OptionValue::Micros(i64::from(ms) * 1000))
        }
        (_, OptionKind::Int) => Ok(OptionValue::Int(read_int(value)?)),
        (_, OptionKind::Bytes) => Ok(OptionValue::Bytes(Bytes::copy_from_slice(value))),
        _ => Err(Error::InvalidArgument.into()),
    }
}

fn encode(mapping: &Mapping, value: OptionValue) -> Result<i32> {
    match (mapping.conv, value) {
        (Conversion::Millis, OptionValue::Micros(us)) if us < 0 => Ok(-1),
        (Conversion::Millis, OptionValue::Micros(us)) => {
            Ok(i32::try_from(us / 1000).unwrap_or(i32::MAX))
        }
        (Conversion::Domain, OptionValue::Bool(raw)) => Ok(if raw { AF_SP_RAW } else { AF_SP }),
        (_, OptionValue::Int(n)) => Ok(n),
        _ => Err(Error::NotSupported.into()),
    }
}

/// Set a legacy option.
///
/// # Errors
///
/// - `ENOPROTOOPT` for an unknown or unsupported `(level, name)` pair
/// - `EINVAL` if a millisecond or integer option is not `int`-sized
pub fn setsockopt(fd: Fd, level: i32, name: i32, value: &[u8]) -> Result<()> {
    let mapping = lookup(level, name)?;
    if !mapping.settable {
        return Err(LegacyError::from_raw(libc::ENOPROTOOPT));
    }
    let value = decode(mapping, value)?;
    core::set_option(socket_id(fd)?, mapping.opt, value)?;
    Ok(())
}

/// Read a legacy option into `out`.
///
/// Copies at most `out.len()` bytes and returns the option's full size.
pub fn getsockopt(fd: Fd, level: i32, name: i32, out: &mut [u8]) -> Result<usize> {
    let mapping = lookup(level, name)?;
    let value = core::get_option(socket_id(fd)?, mapping.opt)?;
    let bytes = encode(mapping, value)?.to_ne_bytes();
    let n = out.len().min(bytes.len());
    out[..n].copy_from_slice(&bytes[..n]);
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{NN_IPV4ONLY, NN_PAIR, NN_RCVPRIO, NN_SNDPRIO, NN_SOCKET_NAME};
    use crate::socket;
    use std::time::Duration;

    fn get_int(fd: Fd, level: i32, name: i32) -> i32 {
        let mut out = [0u8; INT_LEN];
        assert_eq!(getsockopt(fd, level, name, &mut out).unwrap(), INT_LEN);
        i32::from_ne_bytes(out)
    }

    #[test]
    fn test_unmapped_pairs() {
        let fd = socket::socket(AF_SP, NN_PAIR).unwrap();
        for name in [NN_IPV4ONLY, NN_SOCKET_NAME, NN_SNDPRIO, NN_RCVPRIO, NN_DOMAIN, 999] {
            assert_eq!(
                setsockopt(fd, NN_SOL_SOCKET, name, &1i32.to_ne_bytes())
                    .unwrap_err()
                    .errno(),
                libc::ENOPROTOOPT
            );
        }
        assert_eq!(
            setsockopt(fd, 4242, 1, &[]).unwrap_err().errno(),
            libc::ENOPROTOOPT
        );
        socket::close(fd).unwrap();
    }

    #[test]
    fn test_millisecond_conversion() {
        let fd = socket::socket(AF_SP, NN_PAIR).unwrap();
        setsockopt(fd, NN_SOL_SOCKET, NN_RCVTIMEO, &250i32.to_ne_bytes()).unwrap();
        let id = socket_id(fd).unwrap();
        assert_eq!(
            core::get_option(id, SockOpt::RecvTimeout).unwrap(),
            OptionValue::Micros(Duration::from_millis(250).as_micros() as i64)
        );
        assert_eq!(get_int(fd, NN_SOL_SOCKET, NN_RCVTIMEO), 250);

        setsockopt(fd, NN_SOL_SOCKET, NN_RCVTIMEO, &(-1i32).to_ne_bytes()).unwrap();
        assert_eq!(get_int(fd, NN_SOL_SOCKET, NN_RCVTIMEO), -1);

        assert_eq!(
            setsockopt(fd, NN_SOL_SOCKET, NN_SNDTIMEO, &5i64.to_ne_bytes())
                .unwrap_err()
                .errno(),
            libc::EINVAL
        );
        socket::close(fd).unwrap();
    }

    #[test]
    fn test_protocol_levels() {
        let req = socket::socket(AF_SP, NN_REQ).unwrap();
        setsockopt(req, NN_REQ, NN_REQ_RESEND_IVL, &1000i32.to_ne_bytes()).unwrap();
        assert_eq!(get_int(req, NN_REQ, NN_REQ_RESEND_IVL), 1000);
        assert_eq!(get_int(req, NN_SOL_SOCKET, NN_PROTOCOL), NN_REQ);
        assert_eq!(get_int(req, NN_SOL_SOCKET, NN_DOMAIN), AF_SP);
        // Wrong protocol for the level.
        assert_eq!(
            setsockopt(req, NN_SUB, NN_SUB_SUBSCRIBE, b"topic")
                .unwrap_err()
                .errno(),
            libc::ENOTSUP
        );
        socket::close(req).unwrap();

        let sub = socket::socket(AF_SP, NN_SUB).unwrap();
        setsockopt(sub, NN_SUB, NN_SUB_SUBSCRIBE, b"topic").unwrap();
        setsockopt(sub, NN_SUB, NN_SUB_UNSUBSCRIBE, b"topic").unwrap();
        socket::close(sub).unwrap();

        let surveyor = socket::socket(AF_SP, NN_SURVEYOR).unwrap();
        setsockopt(surveyor, NN_SURVEYOR, NN_SURVEYOR_DEADLINE, &500i32.to_ne_bytes()).unwrap();
        assert_eq!(get_int(surveyor, NN_SURVEYOR, NN_SURVEYOR_DEADLINE), 500);
        socket::close(surveyor).unwrap();
    }

    #[test]
    fn test_descriptor_options() {
        let fd = socket::socket(AF_SP, NN_PAIR).unwrap();
        let mut out = [0u8; INT_LEN];
        assert_eq!(
            getsockopt(fd, NN_SOL_SOCKET, NN_RCVFD, &mut out)
                .unwrap_err()
                .errno(),
            libc::ENOTSUP
        );
        socket::close(fd).unwrap();
    }
}
