//! Integration tests for the message buffer engine

use spmq_core::error::Error;
use spmq_core::message::{Message, BODY_HEADROOM};

#[test]
fn test_alloc_zeroed_with_headroom() {
    let msg = Message::alloc(16).unwrap();
    assert_eq!(msg.len(), 16);
    assert!(msg.body().iter().all(|b| *b == 0));
    assert_eq!(msg.header_len(), 0);
    assert_eq!(msg.headroom(), BODY_HEADROOM);
}

#[test]
fn test_alloc_overflow() {
    assert_eq!(Message::alloc(usize::MAX).unwrap_err(), Error::Overflow);
}

#[test]
fn test_prepend_uses_headroom_in_place() {
    let mut msg = Message::from_body(b"body").unwrap();
    let before = msg.body_ptr();
    msg.prepend(b"pre-").unwrap();
    assert_eq!(msg.body(), b"pre-body");
    assert_eq!(msg.body_ptr(), before.wrapping_sub(4));
    assert_eq!(msg.headroom(), BODY_HEADROOM - 4);
}

#[test]
fn test_prepend_past_headroom_reallocates() {
    let mut msg = Message::from_body(b"tail").unwrap();
    let front = vec![7u8; BODY_HEADROOM + 10];
    msg.prepend(&front).unwrap();
    assert_eq!(msg.len(), BODY_HEADROOM + 14);
    assert_eq!(&msg.body()[..front.len()], &front[..]);
    assert_eq!(&msg.body()[front.len()..], b"tail");
}

#[test]
fn test_trim_keeps_prefix_readable() {
    let mut msg = Message::from_body(b"0123456789").unwrap();
    let start = msg.body_ptr();
    msg.trim(4).unwrap();
    assert_eq!(msg.body(), b"456789");
    assert_eq!(msg.body_ptr(), start.wrapping_add(4));
    assert_eq!(msg.trimmed_prefix(4), Some(&b"0123"[..]));
    assert_eq!(msg.trim(7), Err(Error::InvalidArgument));
}

#[test]
fn test_chop_and_clear() {
    let mut msg = Message::from_body(b"abcdef").unwrap();
    msg.chop(2).unwrap();
    assert_eq!(msg.body(), b"abcd");
    assert_eq!(msg.chop(5), Err(Error::InvalidArgument));
    msg.clear();
    assert!(msg.is_empty());
}

#[test]
fn test_realloc_preserves_header_and_prefix_of_body() {
    let mut msg = Message::from_body(b"payload").unwrap();
    msg.append_header(b"hdr").unwrap();

    msg.realloc(3).unwrap();
    assert_eq!(msg.body(), b"pay");

    msg.realloc(4096).unwrap();
    assert_eq!(&msg.body()[..3], b"pay");
    assert!(msg.body()[3..].iter().all(|b| *b == 0));
    assert_eq!(msg.header(), b"hdr");
}

#[test]
fn test_header_u32_helpers() {
    let mut msg = Message::alloc(0).unwrap();
    msg.append_header_u32(1).unwrap();
    msg.append_header_u32(0x8000_0002).unwrap();
    assert_eq!(msg.header(), &[0, 0, 0, 1, 0x80, 0, 0, 2]);
    assert_eq!(msg.header_u32_at(4).unwrap(), 0x8000_0002);

    assert_eq!(msg.trim_header_u32().unwrap(), 1);
    assert_eq!(msg.trim_header_u32().unwrap(), 0x8000_0002);
    assert_eq!(msg.trim_header_u32(), Err(Error::InvalidArgument));
}

#[test]
fn test_header_region_edits() {
    let mut msg = Message::alloc(0).unwrap();
    msg.append_header(b"middle").unwrap();
    msg.prepend_header(b"<").unwrap();
    msg.append_header(b">").unwrap();
    assert_eq!(msg.header(), b"<middle>");
    msg.trim_header(1).unwrap();
    msg.chop_header(1).unwrap();
    assert_eq!(msg.header(), b"middle");
    msg.clear_header();
    assert_eq!(msg.header_len(), 0);
}

#[test]
fn test_dup_is_independent() {
    let mut original = Message::from_body(b"shared").unwrap();
    original.append_header(b"h").unwrap();
    let mut copy = original.dup().unwrap();
    copy.body_mut()[0] = b'S';
    copy.append_header(b"2").unwrap();

    assert_eq!(original.body(), b"shared");
    assert_eq!(original.header(), b"h");
    assert_eq!(copy.body(), b"Shared");
    assert_eq!(copy.header(), b"h2");
}
