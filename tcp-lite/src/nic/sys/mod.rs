#![allow(unsafe_code)]
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//! Operating system transports.
//!
//! Thin wrappers around the libc socket calls, reporting failure as the raw [`Errno`].
//!
//! [`Errno`]: struct.Errno.html
use core::{fmt, mem};
use std::{io, ptr};
use std::os::unix::io::RawFd;

use libc;
use crate::time::Duration;

#[cfg(target_os = "linux")]
mod raw_socket;

#[cfg(target_os = "linux")]
pub use self::raw_socket::{RawIp, RawIpSocket};

/// Wait until given file descriptor becomes readable, but no longer than given timeout.
///
/// Returns `Ok(())` both when the descriptor became readable and when the timeout expired, the
/// following non-blocking read tells them apart.
pub fn wait(fd: RawFd, duration: Option<Duration>) -> Result<(), Errno> {
    let mut readfds;

    unsafe {
        let mut readfds_init = mem::MaybeUninit::<libc::fd_set>::uninit();
        libc::FD_ZERO(readfds_init.as_mut_ptr());
        libc::FD_SET(fd, readfds_init.as_mut_ptr());
        readfds = readfds_init.assume_init();
    }

    let mut timeout = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let timeout = duration.map(|duration| {
        timeout.tv_sec = duration.as_secs() as libc::time_t;
        timeout.tv_usec = duration.subsec_micros() as libc::suseconds_t;
        &mut timeout
    });

    let timeout_ptr = timeout
        .map(|reference| reference as *mut _)
        .unwrap_or_else(ptr::null_mut);

    let res = unsafe {
        libc::select(
            fd + 1,
            &mut readfds,
            ptr::null_mut(),
            ptr::null_mut(),
            timeout_ptr)
    };

    FdResult(res).errno()
}

/// An errno value.
///
/// This is used as the error representation of raw libc calls. It can be converted into a
/// `std::io::Error`, where it will consequently have much more extensive error information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub libc::c_int);

#[derive(Clone, Copy)]
struct FdResult(pub libc::c_int);

#[derive(Clone, Copy)]
struct IoLenResult(pub libc::ssize_t);

/// Trait for interpreting integer return values.
///
/// Failure signals may vary between:
/// * `-1`
/// * arbitrary negative values
/// * non-zero
trait LibcResult: Copy {
    fn is_fail(self) -> bool;

    fn errno(self) -> Result<(), Errno> {
        if self.is_fail() {
            Err(Errno::new())
        } else {
            Ok(())
        }
    }
}

impl Errno {
    /// Read the errno of the last failed libc call on this thread.
    pub fn new() -> Errno {
        Errno(unsafe { *libc::__errno_location() })
    }

    /// Check if the error signals a lack of privilege.
    pub fn is_permission(self) -> bool {
        self.0 == libc::EPERM || self.0 == libc::EACCES
    }

    /// Check if the error only signals that the call would have blocked or was interrupted.
    pub fn is_transient(self) -> bool {
        self.0 == libc::EWOULDBLOCK || self.0 == libc::EAGAIN || self.0 == libc::EINTR
    }
}

impl LibcResult for FdResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for IoLenResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl From<Errno> for io::Error {
    fn from(err: Errno) -> io::Error {
        io::Error::from_raw_os_error(err.0 as i32)
    }
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Errno {
        Errno(err.raw_os_error().unwrap_or(libc::EIO))
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", io::Error::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classes() {
        assert!(Errno(libc::EPERM).is_permission());
        assert!(Errno(libc::EACCES).is_permission());
        assert!(!Errno(libc::EAGAIN).is_permission());
        assert!(Errno(libc::EAGAIN).is_transient());
        assert!(Errno(libc::EINTR).is_transient());
        assert!(!Errno(libc::ENETUNREACH).is_transient());
    }

    #[test]
    fn errno_io_conversion() {
        let io = io::Error::from(Errno(libc::EPERM));
        assert_eq!(io.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(Errno::from(io), Errno(libc::EPERM));
        assert_eq!(Errno::from(io::Error::new(io::ErrorKind::Other, "no os error")),
                   Errno(libc::EIO));
    }

    #[test]
    fn wait_times_out() {
        let mut fds = [0 as libc::c_int; 2];
        let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(res, 0);
        // Nothing was written, the wait must still return after the timeout.
        assert_eq!(wait(fds[0], Some(Duration::from_millis(20))), Ok(()));
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
