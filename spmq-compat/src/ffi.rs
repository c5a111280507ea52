//! C ABI of the legacy API.
//!
//! Each `nn_*` function validates its raw arguments, forwards to the safe
//! layer and converts the outcome to the legacy convention: `-1` (or null)
//! on failure with the errno kept in a thread-local slot read by
//! [`nn_errno`].
//!
//! With `NN_MSG`, sends take the message's body pointer itself
//! (`nn_send(s, m, NN_MSG, 0)`, or `iov_base = m`); receives and `NN_MSG`
//! control buffers take the address of a pointer that is filled in.

#![allow(unsafe_code)]
#![allow(non_camel_case_types)]

use crate::consts::NN_MSG;
use crate::errno::{self, LegacyError};
use crate::msg::{self, MsgPtr};
use crate::options;
use crate::socket::{self, Control, ControlTarget, RecvBody, SendBody};
use dashmap::DashMap;
use libc::{c_char, c_int, c_void, size_t};
use once_cell::sync::Lazy;
use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::ptr;
use std::slice;

/// Scatter/gather element.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct nn_iovec {
    pub iov_base: *mut c_void,
    pub iov_len: size_t,
}

/// Message descriptor for [`nn_sendmsg`] / [`nn_recvmsg`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct nn_msghdr {
    pub msg_iov: *mut nn_iovec,
    pub msg_iovlen: c_int,
    pub msg_control: *mut c_void,
    pub msg_controllen: size_t,
}

thread_local! {
    static LAST_ERROR: Cell<c_int> = const { Cell::new(0) };
}

/// Rendered `nn_strerror` strings. Entries are never removed, so returned
/// pointers stay valid for the life of the process.
static MESSAGES: Lazy<DashMap<c_int, CString>> = Lazy::new(DashMap::new);

fn fail(err: LegacyError) -> c_int {
    LAST_ERROR.with(|slot| slot.set(err.errno()));
    -1
}

fn fail_null(err: LegacyError) -> *mut c_void {
    fail(err);
    ptr::null_mut()
}

fn count(n: usize) -> c_int {
    c_int::try_from(n).unwrap_or(c_int::MAX)
}

fn invalid() -> LegacyError {
    LegacyError::from_raw(libc::EINVAL)
}

fn fault() -> LegacyError {
    LegacyError::from_raw(libc::EFAULT)
}

fn report<T>(result: errno::Result<T>, ok: impl FnOnce(T) -> c_int) -> c_int {
    match result {
        Ok(value) => ok(value),
        Err(err) => fail(err),
    }
}

/// Read a `void **` holding a message pointer.
unsafe fn read_msg_ptr(slot: *const c_void) -> Option<MsgPtr> {
    if slot.is_null() {
        return None;
    }
    MsgPtr::from_ptr(unsafe { *slot.cast::<*mut u8>() })
}

unsafe fn write_msg_ptr(slot: *mut c_void, ptr: MsgPtr) {
    unsafe { *slot.cast::<*mut c_void>() = ptr.as_ptr().cast() };
}

unsafe fn bytes<'a>(base: *const c_void, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if base.is_null() {
        None
    } else {
        Some(unsafe { slice::from_raw_parts(base.cast::<u8>(), len) })
    }
}

unsafe fn bytes_mut<'a>(base: *mut c_void, len: usize) -> Option<&'a mut [u8]> {
    if len == 0 {
        Some(&mut [])
    } else if base.is_null() {
        None
    } else {
        Some(unsafe { slice::from_raw_parts_mut(base.cast::<u8>(), len) })
    }
}

unsafe fn address<'a>(addr: *const c_char) -> Result<&'a str, LegacyError> {
    if addr.is_null() {
        return Err(invalid());
    }
    unsafe { CStr::from_ptr(addr) }.to_str().map_err(|_| invalid())
}

/// Validate the common `nn_msghdr` preamble and borrow its iovecs.
unsafe fn iovecs<'a>(mh: *const nn_msghdr) -> Result<(&'a nn_msghdr, &'a [nn_iovec]), LegacyError> {
    let Some(mh) = (unsafe { mh.as_ref() }) else {
        return Err(invalid());
    };
    let len = usize::try_from(mh.msg_iovlen).map_err(|_| LegacyError::from_raw(libc::EMSGSIZE))?;
    let iov = if len == 0 {
        &[][..]
    } else if mh.msg_iov.is_null() {
        return Err(fault());
    } else {
        unsafe { slice::from_raw_parts(mh.msg_iov, len) }
    };
    Ok((mh, iov))
}

/// Last error of the calling thread.
#[no_mangle]
pub extern "C" fn nn_errno() -> c_int {
    LAST_ERROR.with(Cell::get)
}

/// Message text for `errnum`. The string must not be freed.
#[no_mangle]
pub extern "C" fn nn_strerror(errnum: c_int) -> *const c_char {
    MESSAGES
        .entry(errnum)
        .or_insert_with(|| {
            CString::new(errno::strerror(errnum).into_owned()).unwrap_or_default()
        })
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn nn_socket(domain: c_int, protocol: c_int) -> c_int {
    report(socket::socket(domain, protocol), |fd| fd)
}

#[no_mangle]
pub extern "C" fn nn_close(s: c_int) -> c_int {
    report(socket::close(s), |()| 0)
}

/// # Safety
///
/// `addr` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn nn_bind(s: c_int, addr: *const c_char) -> c_int {
    let result = unsafe { address(addr) }.and_then(|addr| socket::bind(s, addr));
    report(result, |ep| ep)
}

/// # Safety
///
/// `addr` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn nn_connect(s: c_int, addr: *const c_char) -> c_int {
    let result = unsafe { address(addr) }.and_then(|addr| socket::connect(s, addr));
    report(result, |ep| ep)
}

#[no_mangle]
pub extern "C" fn nn_shutdown(s: c_int, how: c_int) -> c_int {
    report(socket::shutdown(s, how), |()| 0)
}

#[no_mangle]
pub extern "C" fn nn_allocmsg(size: size_t, ty: c_int) -> *mut c_void {
    match msg::alloc_msg(size, ty) {
        Ok(ptr) => ptr.as_ptr().cast(),
        Err(err) => fail_null(err),
    }
}

/// # Safety
///
/// `msg` must come from [`nn_allocmsg`], [`nn_reallocmsg`] or a zero-copy
/// receive, and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn nn_freemsg(msg: *mut c_void) -> c_int {
    let result = MsgPtr::from_ptr(msg.cast())
        .ok_or_else(invalid)
        .and_then(msg::free_msg);
    report(result, |()| 0)
}

/// # Safety
///
/// As for [`nn_freemsg`]. On success `msg` is replaced by the returned
/// pointer; on failure it stays valid.
#[no_mangle]
pub unsafe extern "C" fn nn_reallocmsg(msg: *mut c_void, size: size_t) -> *mut c_void {
    let result = MsgPtr::from_ptr(msg.cast())
        .ok_or_else(invalid)
        .and_then(|ptr| msg::realloc_msg(ptr, size));
    match result {
        Ok(ptr) => ptr.as_ptr().cast(),
        Err(err) => fail_null(err),
    }
}

/// # Safety
///
/// With `len == NN_MSG`, `buf` is a body pointer from [`nn_allocmsg`] or a
/// zero-copy receive; otherwise it points to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn nn_send(s: c_int, buf: *const c_void, len: size_t, flags: c_int) -> c_int {
    let result = if len == NN_MSG {
        match MsgPtr::from_ptr(buf.cast_mut().cast()) {
            Some(ptr) => socket::send(s, SendBody::Msg(ptr), flags),
            None => Err(fault()),
        }
    } else {
        match unsafe { bytes(buf, len) } {
            Some(data) => socket::send(s, SendBody::Copy(&[data]), flags),
            None => Err(fault()),
        }
    };
    report(result, count)
}

/// # Safety
///
/// With `len == NN_MSG`, `buf` points to writable storage for a message
/// pointer; otherwise it points to `len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn nn_recv(s: c_int, buf: *mut c_void, len: size_t, flags: c_int) -> c_int {
    if buf.is_null() && len != 0 {
        return fail(fault());
    }
    if len == NN_MSG {
        return report(socket::recv(s, RecvBody::Msg, flags), |outcome| {
            if let Some(ptr) = outcome.msg {
                unsafe { write_msg_ptr(buf, ptr) };
            }
            count(outcome.len)
        });
    }
    let Some(data) = (unsafe { bytes_mut(buf, len) }) else {
        return fail(fault());
    };
    report(socket::recv(s, RecvBody::Copy(&mut [data]), flags), |outcome| {
        count(outcome.copied)
    })
}

/// # Safety
///
/// `mh` must be null or point to a valid `nn_msghdr`. A single `NN_MSG`
/// iovec holds a body pointer in `iov_base`; an `NN_MSG` control buffer is
/// the address of a control message pointer.
#[no_mangle]
pub unsafe extern "C" fn nn_sendmsg(s: c_int, mh: *const nn_msghdr, flags: c_int) -> c_int {
    if let Err(err) = socket::parse_flags(flags) {
        return fail(err);
    }
    let (mh, iov) = match unsafe { iovecs(mh) } {
        Ok(parts) => parts,
        Err(err) => return fail(err),
    };

    let control = if mh.msg_control.is_null() {
        None
    } else if mh.msg_controllen == NN_MSG {
        match unsafe { read_msg_ptr(mh.msg_control) } {
            Some(ptr) => Some(Control::Msg(ptr)),
            None => return fail(fault()),
        }
    } else {
        match unsafe { bytes(mh.msg_control, mh.msg_controllen) } {
            Some(data) => Some(Control::Bytes(data)),
            None => return fail(fault()),
        }
    };

    let result = if iov.len() == 1 && iov[0].iov_len == NN_MSG {
        match MsgPtr::from_ptr(iov[0].iov_base.cast()) {
            Some(ptr) => socket::sendmsg(s, SendBody::Msg(ptr), control, flags),
            None => Err(fault()),
        }
    } else if iov.iter().any(|v| v.iov_len == NN_MSG) {
        Err(invalid())
    } else {
        let parts: Option<Vec<&[u8]>> = iov
            .iter()
            .map(|v| unsafe { bytes(v.iov_base, v.iov_len) })
            .collect();
        match parts {
            Some(parts) => socket::sendmsg(s, SendBody::Copy(&parts), control, flags),
            None => Err(fault()),
        }
    };
    report(result, count)
}

/// # Safety
///
/// `mh` must be null or point to a valid `nn_msghdr` whose iovecs and
/// control buffer are writable and follow the `NN_MSG` conventions.
#[no_mangle]
pub unsafe extern "C" fn nn_recvmsg(s: c_int, mh: *mut nn_msghdr, flags: c_int) -> c_int {
    if let Err(err) = socket::parse_flags(flags) {
        return fail(err);
    }
    let (mh, iov) = match unsafe { iovecs(mh) } {
        Ok(parts) => parts,
        Err(err) => return fail(err),
    };

    let zero_copy = iov.len() == 1 && iov[0].iov_len == NN_MSG;
    if zero_copy && iov[0].iov_base.is_null() {
        return fail(fault());
    }
    if !zero_copy && iov.iter().any(|v| v.iov_len == NN_MSG) {
        return fail(invalid());
    }

    let control_msg = !mh.msg_control.is_null() && mh.msg_controllen == NN_MSG;
    let control = if mh.msg_control.is_null() {
        ControlTarget::None
    } else if control_msg {
        ControlTarget::Msg
    } else {
        match unsafe { bytes_mut(mh.msg_control, mh.msg_controllen) } {
            Some(buf) => ControlTarget::Buffer(buf),
            None => return fail(fault()),
        }
    };

    let result = if zero_copy {
        socket::recvmsg(s, RecvBody::Msg, control, flags)
    } else {
        let bufs: Option<Vec<&mut [u8]>> = iov
            .iter()
            .map(|v| unsafe { bytes_mut(v.iov_base, v.iov_len) })
            .collect();
        match bufs {
            Some(mut bufs) => socket::recvmsg(s, RecvBody::Copy(&mut bufs), control, flags),
            None => Err(fault()),
        }
    };

    report(result, |outcome| {
        if let Some(ptr) = outcome.msg {
            unsafe { write_msg_ptr(iov[0].iov_base, ptr) };
        }
        if let Some(ptr) = outcome.control {
            unsafe { write_msg_ptr(mh.msg_control, ptr) };
        }
        count(outcome.len)
    })
}

/// # Safety
///
/// `optval` must point to `optvallen` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn nn_setsockopt(
    s: c_int,
    level: c_int,
    option: c_int,
    optval: *const c_void,
    optvallen: size_t,
) -> c_int {
    let result = match unsafe { bytes(optval, optvallen) } {
        Some(value) => options::setsockopt(s, level, option, value),
        None => Err(fault()),
    };
    report(result, |()| 0)
}

/// # Safety
///
/// `optvallen` must point to the size of the writable buffer `optval`; it
/// is updated with the option's size.
#[no_mangle]
pub unsafe extern "C" fn nn_getsockopt(
    s: c_int,
    level: c_int,
    option: c_int,
    optval: *mut c_void,
    optvallen: *mut size_t,
) -> c_int {
    let Some(len) = (unsafe { optvallen.as_mut() }) else {
        return fail(fault());
    };
    let Some(out) = (unsafe { bytes_mut(optval, *len) }) else {
        return fail(fault());
    };
    report(options::getsockopt(s, level, option, out), |size| {
        *len = size;
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{AF_SP, NN_DONTWAIT, NN_PAIR};

    #[test]
    fn test_errno_is_per_thread() {
        assert_eq!(nn_socket(77, NN_PAIR), -1);
        assert_eq!(nn_errno(), libc::EAFNOSUPPORT);
        std::thread::spawn(|| assert_eq!(nn_errno(), 0))
            .join()
            .unwrap();
    }

    #[test]
    fn test_strerror_is_stable() {
        let first = nn_strerror(libc::EIO);
        let second = nn_strerror(libc::EIO);
        assert_eq!(first, second);
        let text = unsafe { CStr::from_ptr(first) };
        assert_eq!(text.to_str().unwrap(), "Unknown I/O error");
    }

    #[test]
    fn test_recvmsg_argument_checks() {
        let s = nn_socket(AF_SP, NN_PAIR);
        assert!(s >= 0);
        assert_eq!(unsafe { nn_recvmsg(s, ptr::null_mut(), 0) }, -1);
        assert_eq!(nn_errno(), libc::EINVAL);

        let mut hdr = nn_msghdr {
            msg_iov: ptr::null_mut(),
            msg_iovlen: -1,
            msg_control: ptr::null_mut(),
            msg_controllen: 0,
        };
        assert_eq!(unsafe { nn_recvmsg(s, &mut hdr, 0) }, -1);
        assert_eq!(nn_errno(), libc::EMSGSIZE);

        assert_eq!(unsafe { nn_recvmsg(s, &mut hdr, 8) }, -1);
        assert_eq!(nn_errno(), libc::EINVAL);

        hdr.msg_iovlen = 0;
        assert_eq!(unsafe { nn_recvmsg(s, &mut hdr, NN_DONTWAIT) }, -1);
        assert_eq!(nn_errno(), libc::EAGAIN);
        assert_eq!(nn_close(s), 0);
    }

    #[test]
    fn test_allocmsg_overflow_sets_errno() {
        assert!(nn_allocmsg(usize::MAX, 0).is_null());
        assert_eq!(nn_errno(), libc::EINVAL);
    }
}
