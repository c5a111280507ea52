//! Growable byte region with headroom and tailroom.
//!
//! A chunk owns one contiguous allocation and exposes a window
//! `[off, off + len)` into it. Bytes in front of the window (headroom) are
//! never touched by trimming: `trim` only moves the window start, so trimmed
//! bytes stay physically present at a fixed negative offset from the new
//! window start until the next reallocation. When a reallocation does happen
//! the headroom contents are carried over at the same relative position.
//!
//! Growth doubles the allocation, giving amortized O(1) append/prepend.

use crate::error::{Error, Result};

#[derive(Default)]
pub(crate) struct Chunk {
    buf: Vec<u8>,
    off: usize,
    len: usize,
}

/// Allocate `size` zeroed bytes, reporting allocator failure as an error.
fn try_zeroed(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)?;
    buf.resize(size, 0);
    Ok(buf)
}

impl Chunk {
    pub(crate) fn with_headroom(headroom: usize, len: usize) -> Result<Self> {
        let total = headroom.checked_add(len).ok_or(Error::Overflow)?;
        Ok(Self {
            buf: try_zeroed(total)?,
            off: headroom,
            len,
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn headroom(&self) -> usize {
        self.off
    }

    #[inline]
    pub(crate) fn tailroom(&self) -> usize {
        self.buf.len() - self.off - self.len
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf[self.off..self.off + self.len]
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[self.off..self.off + self.len]
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.as_slice().as_ptr()
    }

    /// The `n` bytes immediately preceding the window, if that much headroom exists.
    pub(crate) fn preceding(&self, n: usize) -> Option<&[u8]> {
        let start = self.off.checked_sub(n)?;
        Some(&self.buf[start..self.off])
    }

    /// Make sure at least `head` bytes of headroom and `tail` bytes of
    /// tailroom are available. On failure the chunk is unchanged.
    pub(crate) fn reserve(&mut self, head: usize, tail: usize) -> Result<()> {
        if self.off >= head && self.tailroom() >= tail {
            return Ok(());
        }

        let new_off = head.max(self.off);
        let needed = new_off
            .checked_add(self.len)
            .and_then(|n| n.checked_add(tail))
            .ok_or(Error::Overflow)?;
        let total = needed.max(self.buf.len().saturating_mul(2));

        let mut grown = try_zeroed(total)?;
        let used = self.off + self.len;
        let shift = new_off - self.off;
        grown[shift..shift + used].copy_from_slice(&self.buf[..used]);

        self.buf = grown;
        self.off = new_off;
        Ok(())
    }

    pub(crate) fn append(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(0, data.len())?;
        let end = self.off + self.len;
        self.buf[end..end + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    pub(crate) fn prepend(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len(), 0)?;
        self.off -= data.len();
        self.buf[self.off..self.off + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Drop `n` bytes from the front. Never reallocates.
    pub(crate) fn trim(&mut self, n: usize) -> Result<()> {
        if n > self.len {
            return Err(Error::InvalidArgument);
        }
        self.off += n;
        self.len -= n;
        Ok(())
    }

    /// Drop `n` bytes from the back. Never reallocates.
    pub(crate) fn chop(&mut self, n: usize) -> Result<()> {
        if n > self.len {
            return Err(Error::InvalidArgument);
        }
        self.len -= n;
        Ok(())
    }

    /// Set the window length to exactly `len`; new bytes are zeroed.
    pub(crate) fn resize(&mut self, len: usize) -> Result<()> {
        if len <= self.len {
            self.len = len;
            return Ok(());
        }
        self.reserve(0, len - self.len)?;
        let start = self.off + self.len;
        self.buf[start..self.off + len].fill(0);
        self.len = len;
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn try_clone(&self) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(self.buf.len())?;
        buf.extend_from_slice(&self.buf);
        Ok(Self {
            buf,
            off: self.off,
            len: self.len,
        })
    }
}
