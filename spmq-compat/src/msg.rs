//! Legacy zero-copy messages addressed by their body pointer.
//!
//! Legacy callers only ever hold the address of a message body. Every such
//! message keeps a hidden prefix of [`PREFIX_LEN`] bytes physically in front
//! of that address, trimmed off the visible body, holding the message's
//! handle. The owned [`Message`] itself lives in a process-wide table keyed
//! by body address; the stashed handle is checked against the table entry
//! whenever a pointer comes back.

use crate::errno::{LegacyError, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use spmq_core::error::Error;
use spmq_core::message::Message;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

/// Width of the hidden handle prefix.
pub const PREFIX_LEN: usize = std::mem::size_of::<usize>();

/// Address of a legacy message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgPtr(NonNull<u8>);

impl MsgPtr {
    /// Wrap a raw body pointer. `None` for null.
    #[must_use]
    pub fn from_ptr(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

struct Parked {
    handle: usize,
    msg: Message,
}

impl Parked {
    fn stash_intact(&self) -> bool {
        self.msg.trimmed_prefix(PREFIX_LEN) == Some(&self.handle.to_ne_bytes()[..])
    }
}

static PARKED: Lazy<DashMap<usize, Parked>> = Lazy::new(DashMap::new);
static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(1);

/// Stash `handle` in front of the body and hide it.
fn stash(msg: &mut Message, handle: usize) -> spmq_core::error::Result<()> {
    msg.prepend(&handle.to_ne_bytes())?;
    msg.trim(PREFIX_LEN)
}

fn insert(mut msg: Message, handle: usize) -> MsgPtr {
    let ptr = MsgPtr(NonNull::from(msg.body_mut()).cast::<u8>());
    PARKED.insert(ptr.addr(), Parked { handle, msg });
    ptr
}

/// Expose `msg` as a legacy pointer. On failure the message is dropped.
pub(crate) fn park(mut msg: Message) -> Result<MsgPtr> {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    stash(&mut msg, handle)?;
    let ptr = insert(msg, handle);
    trace!(addr = ptr.addr(), handle, "message parked");
    Ok(ptr)
}

/// Take the message behind `ptr` back from the table.
pub(crate) fn unpark(ptr: MsgPtr) -> Result<Message> {
    let (_, parked) = PARKED
        .remove(&ptr.addr())
        .ok_or(LegacyError::from(Error::InvalidArgument))?;
    if !parked.stash_intact() {
        warn!(addr = ptr.addr(), "hidden message prefix was overwritten");
    }
    Ok(parked.msg)
}

/// Put a message taken by [`unpark`] back under the same pointer.
///
/// Only valid while the message has not been modified.
pub(crate) fn repark(ptr: MsgPtr, msg: Message) {
    debug_assert_eq!(msg.body_ptr(), ptr.as_ptr().cast_const());
    let handle = msg
        .trimmed_prefix(PREFIX_LEN)
        .and_then(|prefix| prefix.try_into().ok())
        .map_or(0, usize::from_ne_bytes);
    PARKED.insert(ptr.addr(), Parked { handle, msg });
}

/// Allocate a legacy message of `size` bytes. `ty` must be 0.
///
/// # Errors
///
/// `EINVAL` for a non-zero type, a zero size, or a size that overflows
/// once the hidden prefix is added; `ENOMEM` if allocation fails.
pub fn alloc_msg(size: usize, ty: i32) -> Result<MsgPtr> {
    if ty != 0 || size < 1 || size.checked_add(PREFIX_LEN).is_none() {
        return Err(Error::InvalidArgument.into());
    }
    park(Message::alloc(size)?)
}

/// Release a legacy message.
pub fn free_msg(ptr: MsgPtr) -> Result<()> {
    unpark(ptr)?.free();
    Ok(())
}

/// Resize a legacy message, preserving its contents up to the new size.
///
/// The returned pointer replaces `ptr`. On failure `ptr` is untouched and
/// still owned by the caller.
pub fn realloc_msg(ptr: MsgPtr, size: usize) -> Result<MsgPtr> {
    if size.checked_add(PREFIX_LEN).is_none() {
        return Err(Error::InvalidArgument.into());
    }
    let (_, Parked { handle, mut msg }) = PARKED
        .remove(&ptr.addr())
        .ok_or(LegacyError::from(Error::InvalidArgument))?;

    // Refresh the prefix in place, then resize: resizing carries the
    // headroom along, so nothing can fail once the body has moved.
    let resized = stash(&mut msg, handle).and_then(|()| msg.realloc(size));
    if let Err(err) = resized {
        // The body has not moved.
        PARKED.insert(ptr.addr(), Parked { handle, msg });
        return Err(err.into());
    }
    let parked = Parked { handle, msg };
    debug_assert!(parked.stash_intact());
    Ok(insert(parked.msg, handle))
}

/// Run `f` on the message behind `ptr`.
pub fn with_msg<R>(ptr: MsgPtr, f: impl FnOnce(&Message) -> R) -> Result<R> {
    PARKED
        .get(&ptr.addr())
        .map(|entry| f(&entry.msg))
        .ok_or(LegacyError::from(Error::InvalidArgument))
}

/// Run `f` on the message behind `ptr` with body-only mutable access.
///
/// The closure gets the body slice rather than the message so it cannot
/// move the body away from `ptr`.
pub fn with_msg_mut<R>(ptr: MsgPtr, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
    PARKED
        .get_mut(&ptr.addr())
        .map(|mut entry| f(entry.msg.body_mut()))
        .ok_or(LegacyError::from(Error::InvalidArgument))
}

/// The handle stashed in front of `ptr`, read back through the message.
pub fn stashed_handle(ptr: MsgPtr) -> Result<usize> {
    with_msg(ptr, |msg| {
        msg.trimmed_prefix(PREFIX_LEN)
            .and_then(|prefix| prefix.try_into().ok())
            .map(usize::from_ne_bytes)
    })?
    .ok_or(LegacyError::from(Error::InvalidArgument))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_rejects_bad_arguments() {
        assert_eq!(alloc_msg(0, 0).unwrap_err().errno(), libc::EINVAL);
        assert_eq!(alloc_msg(8, 1).unwrap_err().errno(), libc::EINVAL);
        assert_eq!(alloc_msg(usize::MAX, 0).unwrap_err().errno(), libc::EINVAL);
    }

    #[test]
    fn test_prefix_sits_before_body() {
        let ptr = alloc_msg(16, 0).unwrap();
        let (len, body_ptr) = with_msg(ptr, |m| (m.len(), m.body_ptr())).unwrap();
        assert_eq!(len, 16);
        assert_eq!(body_ptr, ptr.as_ptr().cast_const());
        assert_ne!(stashed_handle(ptr).unwrap(), 0);
        free_msg(ptr).unwrap();
        assert!(free_msg(ptr).is_err());
    }

    #[test]
    fn test_realloc_keeps_data_and_handle() {
        let ptr = alloc_msg(4, 0).unwrap();
        with_msg_mut(ptr, |body| body.copy_from_slice(b"abcd")).unwrap();
        let handle = stashed_handle(ptr).unwrap();

        let grown = realloc_msg(ptr, 4096).unwrap();
        assert_eq!(stashed_handle(grown).unwrap(), handle);
        with_msg(grown, |m| {
            assert_eq!(m.len(), 4096);
            assert_eq!(&m.body()[..4], b"abcd");
        })
        .unwrap();

        let shrunk = realloc_msg(grown, 2).unwrap();
        with_msg(shrunk, |m| assert_eq!(m.body(), b"ab")).unwrap();
        free_msg(shrunk).unwrap();
    }

    #[test]
    fn test_failed_resize_keeps_pointer() {
        let ptr = alloc_msg(4, 0).unwrap();
        with_msg_mut(ptr, |body| body.copy_from_slice(b"keep")).unwrap();
        let handle = stashed_handle(ptr).unwrap();

        // Passes the up-front size check but cannot be allocated.
        assert!(realloc_msg(ptr, usize::MAX - PREFIX_LEN).is_err());
        assert_eq!(stashed_handle(ptr).unwrap(), handle);
        with_msg(ptr, |m| assert_eq!(m.body(), b"keep")).unwrap();
        free_msg(ptr).unwrap();
    }

    #[test]
    fn test_realloc_overflow_leaves_message() {
        let ptr = alloc_msg(4, 0).unwrap();
        assert_eq!(
            realloc_msg(ptr, usize::MAX).unwrap_err().errno(),
            libc::EINVAL
        );
        with_msg(ptr, |m| assert_eq!(m.len(), 4)).unwrap();
        free_msg(ptr).unwrap();
    }
}
