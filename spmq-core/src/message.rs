//! Message buffer engine.
//!
//! A [`Message`] carries two independently growable regions:
//!
//! - the **header**, where protocols stash routing metadata (request ids,
//!   backtraces of peer ids), and
//! - the **body**, the application payload.
//!
//! Both regions are contiguous. The body is allocated with
//! [`BODY_HEADROOM`] spare bytes in front so that a protocol can prepend a
//! small prefix on the hot path without reallocating.
//!
//! Pointers obtained from [`Message::body_ptr`] / [`Message::header_ptr`]
//! stay valid until the next call that may reallocate (`append`, `prepend`,
//! `realloc`, ...). [`Message::trim`] never reallocates, and the trimmed
//! bytes remain readable through [`Message::trimmed_prefix`].
//!
//! # Examples
//!
//! ```
//! use spmq_core::message::Message;
//!
//! let mut msg = Message::alloc(0).unwrap();
//! msg.append(b"world").unwrap();
//! msg.prepend(b"hello ").unwrap();
//! msg.append_header(&7u32.to_be_bytes()).unwrap();
//!
//! assert_eq!(msg.body(), b"hello world");
//! assert_eq!(msg.header_len(), 4);
//! ```

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use std::fmt;

/// Spare bytes reserved in front of every freshly allocated body.
pub const BODY_HEADROOM: usize = 32;

/// A single-owner message with header and body regions.
///
/// Dropping the message releases its storage; [`Message::free`] is the
/// explicit spelling of the same thing.
#[derive(Default)]
pub struct Message {
    header: Chunk,
    body: Chunk,
}

impl Message {
    /// Allocate a message whose body is `size` zeroed bytes and whose header is empty.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the allocation fails, [`Error::Overflow`] if
    /// `size` plus the reserved headroom does not fit in `usize`.
    pub fn alloc(size: usize) -> Result<Self> {
        Ok(Self {
            header: Chunk::default(),
            body: Chunk::with_headroom(BODY_HEADROOM, size)?,
        })
    }

    /// Allocate a message whose body is a copy of `data`.
    pub fn from_body(data: &[u8]) -> Result<Self> {
        let mut msg = Self::alloc(data.len())?;
        msg.body_mut().copy_from_slice(data);
        Ok(msg)
    }

    /// Release the message. Equivalent to dropping it.
    pub fn free(self) {}

    /// Deep copy, reporting allocation failure instead of aborting.
    pub fn dup(&self) -> Result<Self> {
        Ok(Self {
            header: self.header.try_clone()?,
            body: self.body.try_clone()?,
        })
    }

    #[inline]
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut [u8] {
        self.body.as_mut_slice()
    }

    /// Body length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.len() == 0
    }

    /// Address of the first body byte.
    #[inline]
    #[must_use]
    pub fn body_ptr(&self) -> *const u8 {
        self.body.as_ptr()
    }

    /// Unused bytes in front of the body.
    #[inline]
    #[must_use]
    pub fn headroom(&self) -> usize {
        self.body.headroom()
    }

    #[inline]
    #[must_use]
    pub fn header(&self) -> &[u8] {
        self.header.as_slice()
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut [u8] {
        self.header.as_mut_slice()
    }

    #[inline]
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    #[inline]
    #[must_use]
    pub fn header_ptr(&self) -> *const u8 {
        self.header.as_ptr()
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.body.append(data)
    }

    /// Insert `data` in front of the body, consuming headroom when possible.
    pub fn prepend(&mut self, data: &[u8]) -> Result<()> {
        self.body.prepend(data)
    }

    /// Remove `n` bytes from the front of the body without reallocating.
    ///
    /// The removed bytes stay in place and can be read back with
    /// [`trimmed_prefix`](Self::trimmed_prefix).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `n` exceeds the body length.
    pub fn trim(&mut self, n: usize) -> Result<()> {
        self.body.trim(n)
    }

    /// Remove `n` bytes from the end of the body.
    pub fn chop(&mut self, n: usize) -> Result<()> {
        self.body.chop(n)
    }

    /// The `n` bytes physically preceding the body start.
    ///
    /// After `trim(n)` this returns exactly the trimmed bytes, until the
    /// body is rewritten in front by `prepend`.
    #[must_use]
    pub fn trimmed_prefix(&self, n: usize) -> Option<&[u8]> {
        self.body.preceding(n)
    }

    /// Resize the body to exactly `size` bytes.
    ///
    /// The header and the first `min(size, len)` body bytes are preserved;
    /// growth is zero-filled. The backing storage may move.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] leaves the message untouched and usable.
    pub fn realloc(&mut self, size: usize) -> Result<()> {
        self.body.resize(size)
    }

    /// Empty the body, keeping its storage.
    pub fn clear(&mut self) {
        self.body.clear();
    }

    pub fn append_header(&mut self, data: &[u8]) -> Result<()> {
        self.header.append(data)
    }

    pub fn prepend_header(&mut self, data: &[u8]) -> Result<()> {
        self.header.prepend(data)
    }

    pub fn trim_header(&mut self, n: usize) -> Result<()> {
        self.header.trim(n)
    }

    pub fn chop_header(&mut self, n: usize) -> Result<()> {
        self.header.chop(n)
    }

    pub fn clear_header(&mut self) {
        self.header.clear();
    }

    /// Append a big-endian `u32` to the header.
    pub fn append_header_u32(&mut self, value: u32) -> Result<()> {
        self.header.append(&value.to_be_bytes())
    }

    /// Remove and return the leading big-endian `u32` of the header.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if fewer than four header bytes remain.
    pub fn trim_header_u32(&mut self) -> Result<u32> {
        let value = self.header_u32_at(0)?;
        self.header.trim(4)?;
        Ok(value)
    }

    /// Read the big-endian `u32` at byte `offset` of the header.
    pub fn header_u32_at(&self, offset: usize) -> Result<u32> {
        let bytes = self
            .header()
            .get(offset..offset.checked_add(4).ok_or(Error::Overflow)?)
            .ok_or(Error::InvalidArgument)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(word))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("header_len", &self.header.len())
            .field("body_len", &self.body.len())
            .field("headroom", &self.body.headroom())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_with_empty_header() {
        let msg = Message::alloc(16).unwrap();
        assert_eq!(msg.len(), 16);
        assert_eq!(msg.header_len(), 0);
        assert!(msg.body().iter().all(|&b| b == 0));
        assert_eq!(msg.headroom(), BODY_HEADROOM);
    }

    #[test]
    fn test_prepend_within_headroom_does_not_move() {
        let mut msg = Message::from_body(b"payload").unwrap();
        let before = msg.body_ptr();
        msg.prepend(&[0xAA; 8]).unwrap();
        assert_eq!(msg.body_ptr(), before.wrapping_sub(8));
        assert_eq!(&msg.body()[8..], b"payload");
    }

    #[test]
    fn test_prepend_beyond_headroom_reallocates() {
        let mut msg = Message::from_body(b"tail").unwrap();
        let big = vec![1u8; BODY_HEADROOM + 10];
        msg.prepend(&big).unwrap();
        assert_eq!(msg.len(), big.len() + 4);
        assert_eq!(&msg.body()[big.len()..], b"tail");
    }

    #[test]
    fn test_header_u32_round() {
        let mut msg = Message::alloc(0).unwrap();
        msg.append_header_u32(0x8000_0001).unwrap();
        msg.append_header_u32(42).unwrap();
        assert_eq!(msg.header_u32_at(4).unwrap(), 42);
        assert_eq!(msg.trim_header_u32().unwrap(), 0x8000_0001);
        assert_eq!(msg.trim_header_u32().unwrap(), 42);
        assert_eq!(msg.trim_header_u32(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_realloc_shrink_and_grow() {
        let mut msg = Message::from_body(b"abcdef").unwrap();
        msg.append_header(b"hdr").unwrap();
        msg.realloc(3).unwrap();
        assert_eq!(msg.body(), b"abc");
        msg.realloc(1024).unwrap();
        assert_eq!(&msg.body()[..3], b"abc");
        assert!(msg.body()[3..].iter().all(|&b| b == 0));
        assert_eq!(msg.header(), b"hdr");
    }

    #[test]
    fn test_dup_is_deep() {
        let mut msg = Message::from_body(b"one").unwrap();
        let copy = msg.dup().unwrap();
        msg.body_mut()[0] = b'O';
        assert_eq!(copy.body(), b"one");
        assert_eq!(msg.body(), b"One");
    }

    #[test]
    fn test_alloc_overflow() {
        assert_eq!(Message::alloc(usize::MAX).unwrap_err(), Error::Overflow);
    }
}
