//! Blocking TCP transport and the transfer protocol for both sides.
//!
//! The transport helpers absorb short reads/writes and interrupted
//! syscalls; everything above them assumes full-length transfers. The
//! protocol is strictly sequential per connection: length header in,
//! payload in, count header out. The serve loop drives one connection at
//! a time, so the global histogram has a single owner for the whole
//! process lifetime.

use anyhow::{Context, Result};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener};
use thiserror::Error;

use crate::logger::Logger;
use crate::protocol::{decode_header, encode_header, CHUNK_SIZE, HEADER_LEN};
use crate::shutdown::Shutdown;
use crate::tally::Histogram;

// Same backlog the daemon has always listened with
const BACKLOG: i32 = 10;

/// Failures during one transfer, split by blast radius.
#[derive(Debug, Error)]
pub enum NetError {
    /// The peer went away mid-exchange: orderly EOF, reset, broken pipe
    /// or timeout. Abandon this connection only; the server keeps
    /// accepting.
    #[error("connection terminated: {0}")]
    Terminated(io::Error),

    /// Anything else. No per-connection recovery is possible; the
    /// process exits with a diagnostic.
    #[error("I/O error: {0}")]
    Fatal(io::Error),
}

fn classify(e: io::Error) -> NetError {
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::TimedOut
        | ErrorKind::WouldBlock => NetError::Terminated(e),
        _ => NetError::Fatal(e),
    }
}

fn eof() -> NetError {
    NetError::Terminated(io::Error::new(
        ErrorKind::UnexpectedEof,
        "peer closed the connection",
    ))
}

/// Read exactly `buf.len()` bytes. Short reads are retried with the
/// remaining slice, interrupted reads lose no progress, and a zero-byte
/// read is the peer hanging up.
pub fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> std::result::Result<(), NetError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Err(eof()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify(e)),
        }
    }
    Ok(())
}

/// Write all of `buf`, retrying short and interrupted writes.
pub fn write_full<W: Write>(w: &mut W, buf: &[u8]) -> std::result::Result<(), NetError> {
    let mut sent = 0;
    while sent < buf.len() {
        match w.write(&buf[sent..]) {
            Ok(0) => return Err(eof()),
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify(e)),
        }
    }
    Ok(())
}

/// What a completed exchange looked like, for the merge and the log.
pub struct TransferOutcome {
    pub bytes: u64,
    pub printable: u64,
}

/// Server side of one connection: header, payload, count.
///
/// Scores the payload chunk by chunk into `hist`. Returns only when the
/// count header has been sent in full; on any earlier termination the
/// caller must discard `hist` so an abandoned connection contributes
/// nothing to the global report.
pub fn handle_transfer<S: Read + Write>(
    stream: &mut S,
    hist: &mut Histogram,
) -> std::result::Result<TransferOutcome, NetError> {
    let mut raw = [0u8; HEADER_LEN];
    read_full(stream, &mut raw)?;
    let expected = decode_header(raw);

    // The advertised size is trusted, but the buffer is still capped at
    // one chunk so a huge transfer streams instead of allocating.
    let mut buf = vec![0u8; expected.min(CHUNK_SIZE as u64) as usize];
    let mut remaining = expected;
    let mut printable = 0u64;
    while remaining > 0 {
        let take = remaining.min(CHUNK_SIZE as u64) as usize;
        read_full(stream, &mut buf[..take])?;
        printable += hist.score(&buf[..take]);
        remaining -= take as u64;
    }

    write_full(stream, &encode_header(printable))?;
    Ok(TransferOutcome {
        bytes: expected,
        printable,
    })
}

/// Client side of one connection: announce `size`, stream the source,
/// read back the printable count.
///
/// A source that runs dry before `size` bytes is a fatal error: the
/// header already promised the server more bytes than exist.
pub fn send_file<S, F>(
    stream: &mut S,
    source: &mut F,
    size: u64,
) -> std::result::Result<u64, NetError>
where
    S: Read + Write,
    F: Read,
{
    write_full(stream, &encode_header(size))?;

    let mut buf = vec![0u8; size.min(CHUNK_SIZE as u64) as usize];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let got = match source.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(NetError::Fatal(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "source ended before the advertised size",
                )))
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(NetError::Fatal(e)),
        };
        write_full(stream, &buf[..got])?;
        remaining -= got as u64;
    }

    let mut raw = [0u8; HEADER_LEN];
    read_full(stream, &mut raw)?;
    Ok(decode_header(raw))
}

/// Bind the daemon's listener with SO_REUSEADDR so a restarted daemon
/// can take the port back immediately.
pub fn bind_listener(bind: &str) -> Result<TcpListener> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )
    .context("create listening socket")?;
    socket.set_reuse_address(true).context("set SO_REUSEADDR")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("bind {}", bind))?;
    socket.listen(BACKLOG).context("listen")?;
    Ok(socket.into())
}

/// Accept and fully process connections one at a time until shutdown is
/// requested, merging each successful transfer into the global
/// histogram. Returns that histogram on clean exit.
pub fn serve(listener: TcpListener, shutdown: &Shutdown, logger: &dyn Logger) -> Result<Histogram> {
    let mut global = Histogram::new();
    loop {
        if shutdown.is_set() {
            break;
        }
        let (mut stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                if shutdown.is_set() {
                    break;
                }
                continue;
            }
            Err(e) => return Err(e).context("accept"),
        };
        // The shutdown handler wakes a parked accept with a throwaway
        // loopback connection; never treat it as a transfer.
        if shutdown.is_set() {
            break;
        }

        let peer = peer.to_string();
        eprintln!("conn from {}", peer);
        logger.conn_open(&peer);
        let _ = stream.set_nodelay(true);

        let mut conn_hist = Histogram::new();
        match handle_transfer(&mut stream, &mut conn_hist) {
            Ok(outcome) => {
                global.merge(&conn_hist);
                logger.transfer_done(&peer, outcome.bytes, outcome.printable);
            }
            Err(NetError::Terminated(e)) => {
                eprintln!("conn {} abandoned: {}", peer, e);
                logger.conn_abandoned(&peer, &e.to_string());
            }
            Err(NetError::Fatal(e)) => {
                return Err(e).with_context(|| format!("unrecoverable I/O error on conn {}", peer));
            }
        }
        // Dropping the stream closes it; closing an already-broken
        // socket is harmless.
    }
    Ok(global)
}
