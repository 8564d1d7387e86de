//! tallyd - accepts one file transfer per connection, answers each
//! client with its printable-character count, and prints the cumulative
//! per-character histogram when shut down with Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::io::stdout;
use std::sync::Arc;

use tally::cli::DaemonOpts;
use tally::logger::{JsonlLogger, Logger, NoopLogger};
use tally::net;
use tally::shutdown::Shutdown;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    let listener = net::bind_listener(&opts.bind)?;
    let local = listener.local_addr().context("local_addr")?;

    let shutdown = Shutdown::new();
    shutdown.install_ctrlc(local)?;

    // Choose logger once; zero overhead in the serve loop with NoopLogger
    let logger: Arc<dyn Logger + Send + Sync> = if let Some(ref p) = opts.log_file {
        match JsonlLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    eprintln!("tallyd listening on {}", local);

    let global = net::serve(listener, &shutdown, logger.as_ref())?;

    global
        .write_report(stdout().lock())
        .context("write report")?;
    Ok(())
}
