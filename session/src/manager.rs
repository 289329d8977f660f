use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use ntcp2_crypto::StaticKeyPair;

use crate::config::Config;
use crate::error::SessionError;
use crate::listener::Listener;
use crate::router_info::{AddressFamily, RouterInfoProvider};
use crate::session::Session;

type PeerKey = [u8; 32];

/// Owns every active session, keyed by the peer's static public key, plus
/// the blacklist of recently-misbehaving peers. Shared across the
/// listener threads and whichever threads call `session()` outbound; the
/// map itself is the one piece of state §5 requires a lock around.
///
/// Also owns the two listeners (§4.7: "the manager owns the two
/// listeners"), one per IP family, bound lazily via `listen()`.
pub struct SessionManager {
    local_static: StaticKeyPair,
    local_router_info: Arc<dyn RouterInfoProvider>,
    config: Config,
    sessions: RwLock<HashMap<PeerKey, Arc<Mutex<Session>>>>,
    blacklist: RwLock<HashMap<PeerKey, Instant>>,
    listener_v4: Mutex<Option<Listener>>,
    listener_v6: Mutex<Option<Listener>>,
}

impl SessionManager {
    pub fn new(local_static: StaticKeyPair, local_router_info: Arc<dyn RouterInfoProvider>, config: Config) -> Self {
        Self {
            local_static,
            local_router_info,
            config,
            sessions: RwLock::new(HashMap::new()),
            blacklist: RwLock::new(HashMap::new()),
            listener_v4: Mutex::new(None),
            listener_v6: Mutex::new(None),
        }
    }

    /// Binds and starts accepting on `addr` for `family`, replacing
    /// whichever listener was previously bound for that family (dropping
    /// it stops its accept loop). Requires `Arc<SessionManager>` since the
    /// listener hands accepted sockets back to `accept()` from its own
    /// thread.
    pub fn listen<A: ToSocketAddrs>(self: &Arc<Self>, family: AddressFamily, addr: A) -> std::io::Result<SocketAddr> {
        let listener = Listener::bind(addr, self.clone())?;
        let local_addr = listener.local_addr();
        let slot = match family {
            AddressFamily::V4 => &self.listener_v4,
            AddressFamily::V6 => &self.listener_v6,
        };
        *slot.lock() = Some(listener);
        Ok(local_addr)
    }

    /// The inbound-lookup view for `family`'s listener (§4.7:
    /// `listener(ip_family).session(peer_static_pub)`).
    pub fn listener(&self, family: AddressFamily) -> ListenerSessions<'_> {
        ListenerSessions { manager: self, family }
    }

    /// Outbound session to `remote`. Fails immediately if a session to
    /// this destination already exists, or if `remote` is absent
    /// (the `session(nullptr)` rule from §4.7).
    pub fn connect(
        &self,
        remote: Option<Arc<dyn RouterInfoProvider>>,
        prefer_v6: bool,
    ) -> Result<PeerKey, SessionError> {
        let remote = remote.ok_or(SessionError::InvalidArgument("SessionManager::connect: remote RouterInfo"))?;
        let peer_key = *remote.static_pub().as_bytes();

        if self.sessions.read().contains_key(&peer_key) {
            warn!(peer_key = %hex::encode(peer_key), "SessionManager::connect: duplicate session rejected");
            return Err(SessionError::DuplicateSession);
        }

        info!(peer_key = %hex::encode(peer_key), "SessionManager::connect: dialing");
        match Session::connect(
            self.local_router_info.clone(),
            self.local_static.clone(),
            Some(remote),
            &self.config,
            prefer_v6,
        ) {
            Ok(session) => self.insert_or_reject(peer_key, session).map(|_| peer_key),
            Err(err) => {
                if err.is_fatal() {
                    warn!(peer_key = %hex::encode(peer_key), error = %err, "outbound handshake failed, blacklisting peer");
                    self.blacklist_peer(peer_key);
                }
                Err(err)
            }
        }
    }

    /// Drives an inbound handshake to completion on an already-accepted
    /// socket, then inserts the resulting session keyed by the identity it
    /// reveals in SessionConfirmed. Called by the listener.
    pub fn accept(&self, socket: std::net::TcpStream) -> Result<PeerKey, SessionError> {
        let session = Session::accept(socket, self.local_router_info.clone(), self.local_static.clone(), &self.config)?;
        let peer_key = *session
            .connect_key()
            .expect("a successfully accepted session always knows its peer's static key")
            .as_bytes();

        // The peer's identity is only known once SessionConfirmed completes
        // (the blacklist is keyed by static public key, not IP address), so
        // this is the earliest point an inbound attempt from a blacklisted
        // peer can be suppressed.
        if self.blacklisted(&peer_key) {
            warn!(peer_key = %hex::encode(peer_key), "inbound session from blacklisted peer dropped");
            return Err(SessionError::DuplicateSession);
        }

        self.insert_or_reject(peer_key, session).map(|_| peer_key)
    }

    /// Inserts `session` under `peer_key`, resolving a race against an
    /// existing entry (inbound accept racing an outbound `connect`, or
    /// vice versa) deterministically: the side whose own static key sorts
    /// greater, compared as big-endian bytes, keeps its attempt.
    fn insert_or_reject(&self, peer_key: PeerKey, session: Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&peer_key) {
            let local_pub = *self.local_static.public().as_bytes();
            if local_pub > peer_key {
                warn!(peer_key = %hex::encode(peer_key), "racing session replaced (this side's static key sorts greater)");
                sessions.insert(peer_key, Arc::new(Mutex::new(session)));
                Ok(())
            } else {
                warn!(peer_key = %hex::encode(peer_key), "racing session dropped (this side's static key sorts lower)");
                Err(SessionError::DuplicateSession)
            }
        } else {
            sessions.insert(peer_key, Arc::new(Mutex::new(session)));
            Ok(())
        }
    }

    pub fn get(&self, peer_key: &PeerKey) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().get(peer_key).cloned()
    }

    pub fn remove(&self, peer_key: &PeerKey) -> Option<Arc<Mutex<Session>>> {
        self.sessions.write().remove(peer_key)
    }

    pub fn blacklist_peer(&self, peer_key: PeerKey) {
        let expiry = Instant::now() + Duration::from_secs(self.config.blacklist_duration_seconds);
        self.blacklist.write().insert(peer_key, expiry);
        info!(peer_key = %hex::encode(peer_key), duration_seconds = self.config.blacklist_duration_seconds, "peer blacklisted");
    }

    pub fn blacklisted(&self, peer_key: &PeerKey) -> bool {
        match self.blacklist.read().get(peer_key) {
            Some(expiry) => Instant::now() < *expiry,
            None => false,
        }
    }
}

/// A view onto one listener's inbound sessions. Both families feed the
/// same dedup map, so `session()` is a bound check (has this family's
/// listener been started at all?) followed by the ordinary lookup.
pub struct ListenerSessions<'a> {
    manager: &'a SessionManager,
    family: AddressFamily,
}

impl<'a> ListenerSessions<'a> {
    pub fn session(&self, peer_static_pub: &PeerKey) -> Option<Arc<Mutex<Session>>> {
        let bound = match self.family {
            AddressFamily::V4 => self.manager.listener_v4.lock().is_some(),
            AddressFamily::V6 => self.manager.listener_v6.lock().is_some(),
        };
        if !bound {
            return None;
        }
        self.manager.get(peer_static_pub)
    }
}
