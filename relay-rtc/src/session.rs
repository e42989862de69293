//! Session Manager (spec §4.10): a resource manager of RTC connections
//! keyed by ICE username and by fast-id, plus the UDP datagram classifier
//! that routes each arriving datagram before any session lookup happens.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use relay_shared::util::{is_dtls, is_rtcp, is_rtp_or_rtcp, is_stun};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramClass {
    Stun,
    Dtls,
    Rtp,
    Rtcp,
    Unknown,
}

/// RFC 7983 classification used by the dispatch path (spec §4.10).
pub fn classify_datagram(buf: &[u8]) -> DatagramClass {
    if is_stun(buf) {
        DatagramClass::Stun
    } else if is_dtls(buf) {
        DatagramClass::Dtls
    } else if is_rtp_or_rtcp(buf) {
        if is_rtcp(buf) {
            DatagramClass::Rtcp
        } else {
            DatagramClass::Rtp
        }
    } else {
        DatagramClass::Unknown
    }
}

/// 64-bit identity derived from a peer's socket address, used as the fast
/// lookup key alongside the (slower, text) ICE username.
pub fn fast_id(addr: SocketAddr) -> u64 {
    match addr {
        SocketAddr::V4(v4) => {
            let ip = u32::from(*v4.ip()) as u64;
            (ip << 16) | v4.port() as u64
        }
        SocketAddr::V6(v6) => {
            let octets = v6.ip().octets();
            let mut hash = v6.port() as u64;
            for chunk in octets.chunks(8) {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                hash ^= u64::from_be_bytes(bytes);
            }
            hash
        }
    }
}

pub trait RtcSession {
    fn is_alive(&self) -> bool;
    fn is_disposing(&self) -> bool;
    fn switch_to_context(&mut self);
}

pub struct SessionManager<S: RtcSession> {
    by_fast_id: HashMap<u64, String>,
    by_username: HashMap<String, S>,
}

impl<S: RtcSession> SessionManager<S> {
    pub fn new() -> Self {
        SessionManager { by_fast_id: HashMap::new(), by_username: HashMap::new() }
    }

    pub fn insert(&mut self, ice_username: impl Into<String>, addr: SocketAddr, session: S) {
        let username = ice_username.into();
        self.by_fast_id.insert(fast_id(addr), username.clone());
        self.by_username.insert(username, session);
    }

    pub fn get_by_addr(&self, addr: SocketAddr) -> Option<&S> {
        let username = self.by_fast_id.get(&fast_id(addr))?;
        self.by_username.get(username)
    }

    pub fn get_by_addr_mut(&mut self, addr: SocketAddr) -> Option<&mut S> {
        let username = self.by_fast_id.get(&fast_id(addr))?.clone();
        self.by_username.get_mut(&username)
    }

    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }

    /// For each not-disposing session where `is_alive()` is false, switch
    /// its context then remove it. Live and already-disposing sessions are
    /// left alone.
    pub fn sweep(&mut self) {
        let mut dead = Vec::new();
        for (username, session) in self.by_username.iter_mut() {
            if !session.is_disposing() && !session.is_alive() {
                session.switch_to_context();
                dead.push(username.clone());
            }
        }
        for username in dead {
            self.by_username.remove(&username);
            self.by_fast_id.retain(|_, v| v != &username);
        }
    }
}

impl<S: RtcSession> Default for SessionManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Nanoseconds-free wall clock placeholder so tests can drive `sweep`
/// deterministically without needing a real session lifetime; unused by
/// production code, which relies purely on `is_alive()`/`is_disposing()`.
pub type SweepTick = Instant;

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSession {
        alive: bool,
        disposing: bool,
        switched: bool,
    }

    impl RtcSession for FakeSession {
        fn is_alive(&self) -> bool {
            self.alive
        }
        fn is_disposing(&self) -> bool {
            self.disposing
        }
        fn switch_to_context(&mut self) {
            self.switched = true;
        }
    }

    #[test]
    fn classifies_stun_dtls_rtp_rtcp() {
        assert_eq!(classify_datagram(&[0x00, 0x01]), DatagramClass::Stun);
        assert_eq!(classify_datagram(&[20, 1, 2]), DatagramClass::Dtls);
        assert_eq!(classify_datagram(&[0x80, 96]), DatagramClass::Rtp);
        assert_eq!(classify_datagram(&[0x80, 200]), DatagramClass::Rtcp);
    }

    #[test]
    fn sweep_removes_dead_not_disposing_sessions_and_switches_context() {
        let mut manager = SessionManager::new();
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        manager.insert("user1", addr, FakeSession { alive: false, disposing: false, switched: false });
        manager.sweep();
        assert!(manager.is_empty());
    }

    #[test]
    fn sweep_leaves_live_and_disposing_sessions_alone() {
        let mut manager = SessionManager::new();
        let live_addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let disposing_addr: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        manager.insert("live", live_addr, FakeSession { alive: true, disposing: false, switched: false });
        manager.insert("disposing", disposing_addr, FakeSession { alive: false, disposing: true, switched: false });
        manager.sweep();
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn fast_id_lookup_finds_inserted_session() {
        let mut manager = SessionManager::new();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        manager.insert("user1", addr, FakeSession { alive: true, disposing: false, switched: false });
        assert!(manager.get_by_addr(addr).is_some());
    }
}
