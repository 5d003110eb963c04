// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;
use std::net::{SocketAddrV4, UdpSocket};
use std::os::unix::io::{RawFd, AsRawFd};

use libc;
use super::{wait, Errno, FdResult, LibcResult, IoLenResult};

use crate::nic::{Device, Received, Transport};
use crate::time::Duration;
use crate::wire::Ipv4Address;

/// Opens raw IPv4 sockets carrying TCP.
///
/// Every transport is a separate `AF_INET`/`SOCK_RAW`/`IPPROTO_TCP` socket in "header included"
/// mode. The kernel hands each such socket a copy of every TCP datagram the host receives, so
/// all filtering happens in the engine.
///
/// Opening requires `CAP_NET_RAW`, usually meaning root. Failing for that reason is reported as
/// `EPERM` or `EACCES`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawIp;

/// One raw IPv4 socket.
///
/// The socket is non-blocking, reads wait with `select` first. The descriptor is closed when the
/// value is dropped.
#[derive(Debug)]
pub struct RawIpSocket {
    lower: libc::c_int,
}

impl AsRawFd for RawIpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl RawIpSocket {
    /// Open a new raw socket and switch on `IP_HDRINCL`.
    pub fn new() -> Result<RawIpSocket, Errno> {
        let lower = unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK,
                libc::IPPROTO_TCP)
        };

        FdResult(lower).errno()?;
        // Own it right away, so the descriptor is closed on the error path below.
        let socket = RawIpSocket { lower };

        let one: libc::c_int = 1;
        let res = unsafe {
            libc::setsockopt(
                socket.lower,
                libc::IPPROTO_IP,
                libc::IP_HDRINCL,
                &one as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t)
        };

        FdResult(res).errno()?;
        Ok(socket)
    }

    /// Send a single datagram, including its IPv4 header, to `dst`.
    pub fn send_to(&mut self, buffer: &[u8], dst: Ipv4Address) -> Result<usize, Errno> {
        let sockaddr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port:   0,
            sin_addr:   libc::in_addr { s_addr: dst.to_network_integer().to_be() },
            sin_zero:   [0; 8],
        };

        let len = unsafe {
            libc::sendto(
                self.lower,
                buffer.as_ptr() as *const libc::c_void,
                buffer.len(),
                0,
                &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Receive a single datagram into the buffer.
    ///
    /// Note that the socket will have been opened with `O_NONBLOCK` so that this only returns an
    /// `Ok` when a datagram is ready.
    pub fn recv_into(&mut self, buffer: &mut [u8]) -> Result<usize, Errno> {
        let len = unsafe {
            libc::recv(
                self.lower,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }
}

impl Drop for RawIpSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

impl Device for RawIp {
    type Transport = RawIpSocket;

    fn open(&mut self) -> Result<RawIpSocket, Errno> {
        RawIpSocket::new()
    }
}

impl Transport for RawIpSocket {
    fn send(&mut self, datagram: &[u8], dst: Ipv4Address) -> Result<usize, Errno> {
        self.send_to(datagram, dst)
    }

    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Received, Errno> {
        match wait(self.lower, timeout) {
            Ok(()) => (),
            Err(err) if err.is_transient() => return Ok(Received::NoData),
            Err(err) => return Err(err),
        }

        match self.recv_into(buffer) {
            Ok(len) => Ok(Received::Data(len)),
            Err(err) if err.is_transient() => Ok(Received::NoData),
            Err(err) => Err(err),
        }
    }

    /// Ask the routing table which local address reaches `dst`.
    ///
    /// Connecting a datagram socket sends nothing but binds it to the outgoing address.
    fn source_for(&mut self, dst: Ipv4Address) -> Result<Ipv4Address, Errno> {
        let probe = UdpSocket::bind(SocketAddrV4::new(Ipv4Address::UNSPECIFIED.into(), 0))?;
        probe.connect(SocketAddrV4::new(dst.into(), 9))?;
        match probe.local_addr()? {
            std::net::SocketAddr::V4(local) => Ok((*local.ip()).into()),
            std::net::SocketAddr::V6(_) => Err(Errno(libc::EAFNOSUPPORT)),
        }
    }
}
