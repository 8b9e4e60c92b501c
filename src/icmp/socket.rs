use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use crate::error::PingError;

/// Raw ICMP sends ignore the destination port; any constant works.
const DEST_PORT: u16 = 1;

/// Upper bound on a single received datagram.
const RECV_BUFFER_LEN: usize = 1024;

/// Where replies come from: a bounded readiness wait plus a single-datagram
/// read. The session's correlation loop runs against this seam so it can be
/// exercised without a raw socket.
pub trait ReplySource {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;
    fn receive(&self) -> io::Result<Vec<u8>>;
}

/// A blocking raw ICMPv4 socket. Dropping the handle releases it
/// unconditionally, whatever path the attempt took.
pub struct IcmpSocket {
    socket: Socket,
}

impl IcmpSocket {
    /// Acquire the raw socket. This is the privileged step: without
    /// CAP_NET_RAW or root the kernel refuses, and that refusal surfaces as
    /// a typed permission error rather than a generic I/O failure.
    pub fn open() -> Result<Self, PingError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(PingError::from)?;
        socket.set_nonblocking(false)?;
        Ok(Self { socket })
    }

    pub fn try_clone(&self) -> io::Result<IcmpSocket> {
        Ok(IcmpSocket {
            socket: self.socket.try_clone()?,
        })
    }

    pub fn send(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<()> {
        let destination = SocketAddr::new(IpAddr::V4(target), DEST_PORT);
        log::debug!("sending {} bytes to {}", packet.len(), target);
        self.socket.send_to(packet, &destination.into())?;
        Ok(())
    }
}

impl ReplySource for IcmpSocket {
    /// Block until the socket is readable or `timeout` elapses. Returns
    /// `false` on timeout.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        poll_readable(self.socket.as_raw_fd(), timeout)
    }

    /// Read one datagram, up to 1024 bytes. Only call once readiness has
    /// been confirmed.
    fn receive(&self) -> io::Result<Vec<u8>> {
        let mut buffer = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_LEN];
        let (len, source) = self.socket.recv_from(&mut buffer)?;
        log::debug!(
            "received {} bytes from {}",
            len,
            source
                .as_socket()
                .map(|s| s.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        let mut data = vec![0u8; len];
        for i in 0..len {
            data[i] = unsafe { buffer[i].assume_init() };
        }
        Ok(data)
    }
}

/// poll(2)-based readiness wait. The interval is rounded up to whole
/// milliseconds so the wait never reports a timeout before the full budget
/// has elapsed, and EINTR restarts the poll with the remaining budget.
pub(crate) fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = remaining
            .as_nanos()
            .div_ceil(1_000_000)
            .min(libc::c_int::MAX as u128) as libc::c_int;
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        match unsafe { libc::poll(&mut pollfd, 1, millis) } {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            // A capped interval (budgets beyond c_int::MAX ms) can expire
            // with budget left; only report a timeout once the deadline
            // has truly passed.
            0 => {
                if Instant::now() >= deadline {
                    return Ok(false);
                }
            }
            _ => return Ok(pollfd.revents & libc::POLLIN != 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    #[test]
    fn test_raw_socket_open() {
        // Needs CAP_NET_RAW; report either way without failing the suite.
        match IcmpSocket::open() {
            Ok(_) => println!("raw socket opened"),
            Err(e) => println!("raw socket open failed: {}", e),
        }
    }

    #[test]
    fn test_poll_times_out_no_earlier_than_budget() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let budget = Duration::from_millis(200);
        let start = Instant::now();
        let ready = poll_readable(socket.as_raw_fd(), budget).unwrap();
        let elapsed = start.elapsed();
        assert!(!ready);
        assert!(elapsed >= budget, "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[test]
    fn test_poll_zero_budget_returns_immediately() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let start = Instant::now();
        let ready = poll_readable(socket.as_raw_fd(), Duration::ZERO).unwrap();
        assert!(!ready);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_poll_reports_readable() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(b"x", receiver.local_addr().unwrap())
            .unwrap();
        let ready = poll_readable(receiver.as_raw_fd(), Duration::from_secs(2)).unwrap();
        assert!(ready);
    }
}
