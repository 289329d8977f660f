use std::net::{TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::manager::SessionManager;

/// One dedicated accept thread per bound address (§5: IPv4 and IPv6
/// listeners run independently rather than sharing a dual-stack socket,
/// matching the teacher's one-thread-per-responsibility style). Owned by
/// `SessionManager`, which constructs one per family via `listen()`.
pub struct Listener {
    local_addr: std::net::SocketAddr,
    accept_thread: Option<JoinHandle<()>>,
    stop: Arc<std::sync::atomic::AtomicBool>,
}

impl Listener {
    /// Binds `addr` and spawns the accept loop. Each accepted socket is
    /// handed to `manager.accept()` on its own worker thread so one slow
    /// or malicious peer can't stall the listener.
    pub fn bind<A: ToSocketAddrs>(addr: A, manager: Arc<SessionManager>) -> std::io::Result<Self> {
        let tcp_listener = TcpListener::bind(addr)?;
        let local_addr = tcp_listener.local_addr()?;
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let thread_stop = stop.clone();
        let accept_thread = thread::spawn(move || {
            for incoming in tcp_listener.incoming() {
                if thread_stop.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                let socket = match incoming {
                    Ok(socket) => socket,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                let peer_addr = socket.peer_addr().ok();
                let manager = manager.clone();
                thread::spawn(move || match manager.accept(socket) {
                    Ok(peer_key) => info!(peer = ?peer_addr, peer_key = %hex::encode(peer_key), "inbound session established"),
                    Err(err) => warn!(peer = ?peer_addr, error = %err, "inbound handshake failed"),
                });
            }
        });

        info!(%local_addr, "listening");
        Ok(Self { local_addr, accept_thread: Some(accept_thread), stop })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

impl Drop for Listener {
    /// Signals the accept loop to stop. Since `TcpListener::incoming()`
    /// blocks in `accept()`, the flag only takes effect on the next
    /// connection or when the OS socket is dropped alongside this struct;
    /// we don't join the thread here to avoid blocking `drop` indefinitely.
    fn drop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        self.accept_thread.take();
    }
}
