use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::error::PingError;
use crate::icmp::{EchoReply, EchoRequest, IcmpSocket, ReplySource};
use crate::utils;

/// Bytes of ICMP header plus embedded timestamp, counted on top of the
/// payload when reporting packet size.
const HEADER_AND_TIMESTAMP_LEN: usize = 16;

/// Pause between attempts.
const PACING_INTERVAL: Duration = Duration::from_millis(1000);

/// One ping session against a single resolved target. The identifier is
/// fixed for the session lifetime and tags its packets among concurrent
/// pingers; the sequence counter advances only on a successful round-trip.
pub struct Session {
    target: String,
    addr: Ipv4Addr,
    count: u32,
    timeout: Duration,
    payload: Vec<u8>,
    identifier: u16,
    sequence: u16,
}

/// Pad the message with a single trailing space when its byte length is
/// odd, keeping the checksum input 16-bit aligned.
pub(crate) fn pad_payload(message: &str) -> Vec<u8> {
    let mut payload = message.as_bytes().to_vec();
    if payload.len() % 2 != 0 {
        payload.push(b' ');
    }
    payload
}

impl Session {
    pub fn new(target: String, addr: Ipv4Addr, count: u32, timeout_secs: u64, message: &str) -> Self {
        Self {
            target,
            addr,
            count,
            timeout: Duration::from_secs(timeout_secs),
            payload: pad_payload(message),
            identifier: (std::process::id() & 0xFFFF) as u16,
            sequence: 0,
        }
    }

    /// Reported packet size: padded payload plus header and timestamp.
    pub fn total_len(&self) -> usize {
        self.payload.len() + HEADER_AND_TIMESTAMP_LEN
    }

    /// Drive the attempt loop. The raw socket is opened once and reused for
    /// every attempt; correlation still holds because the identifier and the
    /// per-attempt sequence number key each reply.
    pub async fn run(&mut self) -> Result<(), PingError> {
        let socket = IcmpSocket::open()?;
        for attempt in 0..self.count {
            println!(
                "Ping {} ({}) {} bytes of data.",
                self.target,
                self.addr,
                self.total_len()
            );

            let handle = socket.try_clone()?;
            let (addr, identifier, sequence, timeout) =
                (self.addr, self.identifier, self.sequence, self.timeout);
            let payload = self.payload.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                ping_once(&handle, addr, identifier, sequence, payload, timeout)
            })
            .await
            .map_err(PingError::from_join_error)?;

            match outcome {
                Ok(delay) => {
                    self.sequence = self.sequence.wrapping_add(1);
                    println!(
                        "...Pong from {} ({}) icmp_seq={} time={:.3}ms",
                        self.target,
                        self.addr,
                        self.sequence,
                        delay * 1000.0
                    );
                }
                Err(PingError::Timeout { seconds }) => {
                    println!("Ping failed after timeout = {}", seconds);
                }
                Err(e) => return Err(e),
            }

            if attempt + 1 < self.count {
                tokio::time::sleep(PACING_INTERVAL).await;
            }
        }
        Ok(())
    }
}

/// One attempt: Idle -> Sent -> {Matched | TimedOut}.
fn ping_once(
    socket: &IcmpSocket,
    addr: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<f64, PingError> {
    let request = EchoRequest::new(identifier, sequence, payload);
    socket.send(&request.to_bytes(), addr)?;
    await_matching_reply(socket, identifier, sequence, timeout)
}

/// Wait out the attempt budget for a reply carrying this identifier and
/// sequence. A stale or malformed reply does not end the attempt; the wait
/// re-enters with the remaining budget until a matching reply arrives or
/// the budget is gone.
fn await_matching_reply(
    source: &impl ReplySource,
    identifier: u16,
    sequence: u16,
    timeout: Duration,
) -> Result<f64, PingError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !source.wait_readable(remaining)? {
            return Err(PingError::Timeout {
                seconds: timeout.as_secs(),
            });
        }

        let datagram = source.receive()?;
        let received = utils::unix_now();
        match EchoReply::from_datagram(&datagram) {
            Some(reply) if reply.matches(identifier, sequence) => {
                log::debug!(
                    "matched reply id={} seq={} type={}",
                    reply.identifier,
                    reply.sequence,
                    reply.icmp_type
                );
                return Ok(received - reply.timestamp);
            }
            Some(reply) => {
                log::debug!(
                    "ignoring stale reply id={} seq={}, still waiting",
                    reply.identifier,
                    reply.sequence
                );
            }
            None => {
                log::debug!("ignoring malformed reply ({} bytes)", datagram.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::IP_HEADER_LEN;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    /// Hands out a scripted stream of datagrams; once the script runs dry
    /// the readiness wait sleeps through whatever budget it was given.
    struct ScriptedReplies {
        datagrams: RefCell<VecDeque<Vec<u8>>>,
    }

    impl ScriptedReplies {
        fn new(datagrams: Vec<Vec<u8>>) -> Self {
            Self {
                datagrams: RefCell::new(datagrams.into()),
            }
        }
    }

    impl ReplySource for ScriptedReplies {
        fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
            if self.datagrams.borrow().is_empty() {
                std::thread::sleep(timeout);
                Ok(false)
            } else {
                Ok(true)
            }
        }

        fn receive(&self) -> io::Result<Vec<u8>> {
            Ok(self.datagrams.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    fn reply_datagram(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut datagram = vec![0u8; IP_HEADER_LEN];
        datagram.extend_from_slice(&EchoRequest::new(identifier, sequence, Vec::new()).to_bytes());
        datagram
    }

    #[test]
    fn test_stale_replies_are_skipped_until_match() {
        let source = ScriptedReplies::new(vec![
            reply_datagram(9, 0),  // wrong identifier
            reply_datagram(7, 3),  // wrong sequence
            vec![0u8; 10],         // too short to parse
            reply_datagram(7, 0),
        ]);
        let delay = await_matching_reply(&source, 7, 0, Duration::from_secs(5)).unwrap();
        assert!(delay.abs() < 5.0);
        // every earlier datagram was consumed on the way to the match
        assert!(source.datagrams.borrow().is_empty());
    }

    #[test]
    fn test_only_stale_replies_still_time_out_after_full_budget() {
        let source = ScriptedReplies::new(vec![reply_datagram(9, 9), reply_datagram(8, 8)]);
        let budget = Duration::from_millis(200);
        let start = Instant::now();
        let result = await_matching_reply(&source, 7, 0, budget);
        assert!(matches!(result, Err(PingError::Timeout { .. })));
        assert!(start.elapsed() >= budget, "gave up at {:?}", start.elapsed());
    }

    #[test]
    fn test_even_message_not_padded() {
        assert_eq!(pad_payload("AB"), b"AB".to_vec());
    }

    #[test]
    fn test_odd_message_padded_with_space() {
        assert_eq!(pad_payload("ABC"), b"ABC ".to_vec());
    }

    #[test]
    fn test_empty_message_not_padded() {
        assert!(pad_payload("").is_empty());
    }

    #[test]
    fn test_session_initial_state() {
        let session = Session::new("127.0.0.1".to_string(), Ipv4Addr::LOCALHOST, 1, 5, "");
        assert_eq!(session.sequence, 0);
        assert_eq!(session.total_len(), 16);
    }

    #[test]
    fn test_total_len_counts_padded_payload() {
        let session = Session::new("127.0.0.1".to_string(), Ipv4Addr::LOCALHOST, 3, 5, "ABC");
        // "ABC" pads to 4 bytes, plus 8-byte header and 8-byte timestamp.
        assert_eq!(session.total_len(), 20);
    }
}
