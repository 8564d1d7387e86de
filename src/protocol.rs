//! Shared wire constants for the tally transfer protocol
//!
//! One transfer per connection, three messages, no delimiters:
//! client sends LEN (8 bytes, big endian), then exactly LEN payload bytes,
//! and the server answers with COUNT (8 bytes, big endian).

// Size of the length and count headers on the wire
pub const HEADER_LEN: usize = 8;

// Payload is pulled and scored in bounded chunks; any chunk size is
// protocol-correct. 1MB keeps a whole transfer on one reused buffer.
pub const CHUNK_SIZE: usize = 1_000_000;

/// Encode a length/count header in network byte order.
pub fn encode_header(v: u64) -> [u8; HEADER_LEN] {
    v.to_be_bytes()
}

/// Decode a length/count header from network byte order.
pub fn decode_header(raw: [u8; HEADER_LEN]) -> u64 {
    u64::from_be_bytes(raw)
}
