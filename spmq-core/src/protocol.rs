//! Scalability protocol identifiers.
//!
//! The numeric values are the historical protocol numbers
//! (`family * 16 + role`) that legacy callers pass to `socket()`.

use std::fmt;

/// Messaging pattern of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    /// PAIR: exclusive one-to-one bidirectional
    Pair = 16,

    /// PUB: broadcast to subscribers
    Pub = 32,

    /// SUB: receive from publishers
    Sub = 33,

    /// REQ: request side of request/reply
    Req = 48,

    /// REP: reply side of request/reply
    Rep = 49,

    /// PUSH: load-balanced pipeline producer
    Push = 80,

    /// PULL: pipeline consumer
    Pull = 81,

    /// SURVEYOR: broadcast a survey, collect responses
    Surveyor = 98,

    /// RESPONDENT: answer surveys
    Respondent = 99,

    /// BUS: many-to-many broadcast
    Bus = 112,
}

impl Protocol {
    /// Look up a protocol by its legacy number.
    #[must_use]
    pub const fn from_number(number: u16) -> Option<Self> {
        Some(match number {
            16 => Self::Pair,
            32 => Self::Pub,
            33 => Self::Sub,
            48 => Self::Req,
            49 => Self::Rep,
            80 => Self::Push,
            81 => Self::Pull,
            98 => Self::Surveyor,
            99 => Self::Respondent,
            112 => Self::Bus,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn number(self) -> u16 {
        self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Pub => "pub",
            Self::Sub => "sub",
            Self::Req => "req",
            Self::Rep => "rep",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Surveyor => "surveyor",
            Self::Respondent => "respondent",
            Self::Bus => "bus",
        }
    }

    /// The protocol a peer must speak to exchange messages with this one.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Pair => Self::Pair,
            Self::Pub => Self::Sub,
            Self::Sub => Self::Pub,
            Self::Req => Self::Rep,
            Self::Rep => Self::Req,
            Self::Push => Self::Pull,
            Self::Pull => Self::Push,
            Self::Surveyor => Self::Respondent,
            Self::Respondent => Self::Surveyor,
            Self::Bus => Self::Bus,
        }
    }

    /// Check if this protocol may be connected to `peer`.
    pub fn is_compatible(&self, peer: Protocol) -> bool {
        self.peer() == peer
    }

    #[must_use]
    pub const fn can_send(self) -> bool {
        !matches!(self, Self::Sub | Self::Pull)
    }

    #[must_use]
    pub const fn can_recv(self) -> bool {
        !matches!(self, Self::Pub | Self::Push)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_numbers() {
        assert_eq!(Protocol::Req.number(), 48);
        assert_eq!(Protocol::from_number(49), Some(Protocol::Rep));
        assert_eq!(Protocol::from_number(112), Some(Protocol::Bus));
        assert_eq!(Protocol::from_number(0), None);
        assert_eq!(Protocol::from_number(50), None);
    }

    #[test]
    fn test_protocol_compatibility() {
        assert!(Protocol::Req.is_compatible(Protocol::Rep));
        assert!(Protocol::Rep.is_compatible(Protocol::Req));
        assert!(Protocol::Pub.is_compatible(Protocol::Sub));
        assert!(Protocol::Push.is_compatible(Protocol::Pull));
        assert!(Protocol::Surveyor.is_compatible(Protocol::Respondent));
        assert!(Protocol::Bus.is_compatible(Protocol::Bus));

        assert!(!Protocol::Req.is_compatible(Protocol::Req));
        assert!(!Protocol::Pub.is_compatible(Protocol::Pull));
    }

    #[test]
    fn test_directions() {
        assert!(!Protocol::Sub.can_send());
        assert!(!Protocol::Push.can_recv());
        assert!(Protocol::Pair.can_send() && Protocol::Pair.can_recv());
        assert_eq!(Protocol::Surveyor.to_string(), "surveyor");
    }
}
