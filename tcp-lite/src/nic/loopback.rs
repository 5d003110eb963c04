//! Implementation of an in-process raw transport hub.
//!
//! Every port attached to the hub behaves like a raw socket on a shared link: a datagram sent by
//! one port is delivered to all other ports, regardless of its destination. Ports can live on
//! different threads, receiving blocks on a condition variable.
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time;

use super::{Device, Errno, Received, Transport};
use crate::time::Duration;
use crate::wire::Ipv4Address;

/// The number of datagrams queued per port before the oldest are dropped.
pub const INBOX_LIMIT: usize = 256;

/// A software hub of raw transports.
///
/// Cloning the hub yields another handle to the same link.
#[derive(Clone, Debug)]
pub struct Loopback {
    hub: Arc<Hub>,
    address: Ipv4Address,
}

/// One port attached to a [`Loopback`] hub.
///
/// Detaches from the hub when dropped.
///
/// [`Loopback`]: struct.Loopback.html
#[derive(Debug)]
pub struct Port {
    id: u64,
    hub: Arc<Hub>,
    address: Ipv4Address,
}

#[derive(Debug, Default)]
struct Hub {
    state: Mutex<HubState>,
    arrived: Condvar,
}

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    inboxes: Vec<Inbox>,
}

#[derive(Debug)]
struct Inbox {
    id: u64,
    queue: VecDeque<Vec<u8>>,
}

impl Loopback {
    /// Create a hub whose ports all use `127.0.0.1` as their source address.
    pub fn new() -> Self {
        Loopback::with_address(Ipv4Address::LOOPBACK)
    }

    /// Create a hub whose ports use the given source address.
    pub fn with_address(address: Ipv4Address) -> Self {
        Loopback {
            hub: Arc::default(),
            address,
        }
    }

    /// A handle to the same hub whose ports use a different source address.
    pub fn host(&self, address: Ipv4Address) -> Self {
        Loopback {
            hub: self.hub.clone(),
            address,
        }
    }

    /// Attach a new port.
    pub fn attach(&self) -> Port {
        let mut state = self.hub.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.inboxes.push(Inbox { id, queue: VecDeque::new() });
        Port {
            id,
            hub: self.hub.clone(),
            address: self.address,
        }
    }

    /// The number of currently attached ports.
    pub fn ports(&self) -> usize {
        self.hub.lock().inboxes.len()
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Loopback::new()
    }
}

impl Hub {
    fn lock(&self) -> MutexGuard<HubState> {
        // A panicking port can not leave the queues inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HubState {
    fn inbox(&mut self, id: u64) -> Option<&mut Inbox> {
        self.inboxes.iter_mut().find(|inbox| inbox.id == id)
    }
}

impl Port {
    /// The source address of this port.
    pub fn address(&self) -> Ipv4Address {
        self.address
    }

    /// Drop all datagrams queued for this port.
    pub fn clear(&mut self) {
        let mut state = self.hub.lock();
        if let Some(inbox) = state.inbox(self.id) {
            inbox.queue.clear();
        }
    }
}

impl Device for Loopback {
    type Transport = Port;

    fn open(&mut self) -> Result<Port, Errno> {
        Ok(self.attach())
    }
}

impl Transport for Port {
    fn send(&mut self, datagram: &[u8], _: Ipv4Address) -> Result<usize, Errno> {
        let mut state = self.hub.lock();
        for inbox in state.inboxes.iter_mut().filter(|inbox| inbox.id != self.id) {
            if inbox.queue.len() == INBOX_LIMIT {
                inbox.queue.pop_front();
            }
            inbox.queue.push_back(datagram.to_vec());
        }
        self.hub.arrived.notify_all();
        Ok(datagram.len())
    }

    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Received, Errno> {
        let deadline = timeout.and_then(|timeout| time::Instant::now().checked_add(timeout));
        let mut state = self.hub.lock();

        loop {
            let inbox = match state.inbox(self.id) {
                Some(inbox) => inbox,
                None => return Err(Errno(libc::EBADF)),
            };

            if let Some(datagram) = inbox.queue.pop_front() {
                let len = datagram.len().min(buffer.len());
                buffer[..len].copy_from_slice(&datagram[..len]);
                return Ok(Received::Data(len));
            }

            state = match deadline {
                None => self.hub.arrived
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = time::Instant::now();
                    if now >= deadline {
                        return Ok(Received::NoData);
                    }
                    self.hub.arrived
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                },
            };
        }
    }

    fn source_for(&mut self, _: Ipv4Address) -> Result<Ipv4Address, Errno> {
        Ok(self.address)
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        let id = self.id;
        self.hub.lock().inboxes.retain(|inbox| inbox.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn delivers_to_others() {
        let hub = Loopback::new();
        let mut a = hub.attach();
        let mut b = hub.attach();
        let mut c = hub.attach();

        assert_eq!(a.send(b"ping", Ipv4Address::LOOPBACK), Ok(4));

        let mut buffer = [0; 16];
        assert_eq!(b.recv(&mut buffer, Some(Duration::from_millis(0))), Ok(Received::Data(4)));
        assert_eq!(&buffer[..4], b"ping");
        assert_eq!(c.recv(&mut buffer, Some(Duration::from_millis(0))), Ok(Received::Data(4)));
        // The sender does not see its own datagram.
        assert_eq!(a.recv(&mut buffer, Some(Duration::from_millis(10))), Ok(Received::NoData));
    }

    #[test]
    fn truncates_to_buffer() {
        let hub = Loopback::new();
        let mut a = hub.attach();
        let mut b = hub.attach();
        a.send(&[1, 2, 3, 4, 5], Ipv4Address::LOOPBACK).unwrap();

        let mut buffer = [0; 3];
        assert_eq!(b.recv(&mut buffer, None), Ok(Received::Data(3)));
        assert_eq!(buffer, [1, 2, 3]);
    }

    #[test]
    fn inbox_is_bounded() {
        let hub = Loopback::new();
        let mut a = hub.attach();
        let mut b = hub.attach();
        for i in 0..INBOX_LIMIT + 1 {
            a.send(&[i as u8], Ipv4Address::LOOPBACK).unwrap();
        }

        // The oldest datagram was dropped.
        let mut buffer = [0; 1];
        assert_eq!(b.recv(&mut buffer, None), Ok(Received::Data(1)));
        assert_eq!(buffer, [1]);
    }

    #[test]
    fn wakes_blocked_receiver() {
        let hub = Loopback::new();
        let mut a = hub.attach();
        let mut b = hub.attach();

        let receiver = thread::spawn(move || {
            let mut buffer = [0; 8];
            let received = b.recv(&mut buffer, Some(Duration::from_secs(5)));
            (received, buffer)
        });

        thread::sleep(Duration::from_millis(20));
        a.send(b"late", Ipv4Address::LOOPBACK).unwrap();

        let (received, buffer) = receiver.join().unwrap();
        assert_eq!(received, Ok(Received::Data(4)));
        assert_eq!(&buffer[..4], b"late");
    }

    #[test]
    fn detach_on_drop() {
        let hub = Loopback::new();
        let a = hub.attach();
        let mut b = hub.host(Ipv4Address::new(10, 0, 0, 2)).attach();
        assert_eq!(hub.ports(), 2);
        assert_eq!(b.source_for(Ipv4Address::LOOPBACK), Ok(Ipv4Address::new(10, 0, 0, 2)));
        drop(a);
        assert_eq!(hub.ports(), 1);
    }
}
