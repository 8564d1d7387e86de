//! tally - send a file to a tallyd daemon and print how many of its
//! bytes are printable ASCII

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{stdout, Write};
use std::net::TcpStream;
use std::path::PathBuf;

use tally::net::{send_file, NetError};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stream a file to a tallyd daemon and print its printable-character count"
)]
struct Args {
    /// Daemon host or IP address
    host: String,

    /// Daemon port
    port: u16,

    /// File to send
    file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut source =
        File::open(&args.file).with_context(|| format!("open {}", args.file.display()))?;
    let size = source
        .metadata()
        .with_context(|| format!("stat {}", args.file.display()))?
        .len();

    let addr = format!("{}:{}", args.host, args.port);
    print!("Connecting {}... ", addr);
    let _ = stdout().flush();
    let mut stream =
        TcpStream::connect(&addr).with_context(|| format!("connect {}", addr))?;
    println!("ok");

    let count = send_file(&mut stream, &mut source, size).map_err(|e| match e {
        NetError::Terminated(e) => {
            anyhow::anyhow!("transfer did not complete, connection terminated: {}", e)
        }
        NetError::Fatal(e) => anyhow::anyhow!("transfer failed: {}", e),
    })?;

    println!("# of printable characters: {}", count);
    Ok(())
}
