//! Cooperative shutdown between the Ctrl-C handler and the serve loop.
//!
//! The handler runs on its own thread, so it only does re-entrant-safe
//! work: set an atomic flag, then open (and immediately drop) a loopback
//! connection so a parked `accept` returns and the loop can observe the
//! flag. If a transfer is in flight the wake connection is simply never
//! accepted; the loop notices the flag once the transfer finishes. The
//! final report is always produced by the main thread.

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAKE_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    /// Ask the serve loop to stop accepting. Safe from any thread,
    /// harmless when repeated.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Register the Ctrl-C handler for a daemon listening on `listener`.
    pub fn install_ctrlc(&self, listener: SocketAddr) -> Result<()> {
        let flag = self.flag.clone();
        let wake = wake_addr(listener);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            // nudge the accept loop in case it is parked; ignored when
            // the loop has already exited
            let _ = TcpStream::connect_timeout(&wake, WAKE_TIMEOUT);
        })
        .context("install Ctrl-C handler")
    }
}

// A daemon bound to the wildcard address cannot be dialed at 0.0.0.0
// everywhere; wake it through loopback on the same port.
fn wake_addr(mut addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        match addr {
            SocketAddr::V4(_) => addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            SocketAddr::V6(_) => addr.set_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        }
    }
    addr
}
