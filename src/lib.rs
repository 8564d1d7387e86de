//! Tally library
//!
//! Printable-character counting over a length-prefixed TCP file
//! transfer: the `tally` client streams a file to the `tallyd` daemon,
//! which answers with the number of printable ASCII bytes and folds a
//! per-connection histogram into a cumulative one reported at shutdown.

pub mod cli;
pub mod logger;
pub mod net;
pub mod protocol;
pub mod shutdown;
pub mod tally;
