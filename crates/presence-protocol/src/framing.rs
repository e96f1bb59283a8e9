//! Line framing over single non-blocking reads.
//!
//! The server never buffers across reads: a read either contains a full
//! `\n`-terminated line or it is dropped.

/// Size of the buffer used for each read from a connection.
pub const READ_WINDOW: usize = 512;

/// Returns the bytes of the first line in `read`, without the newline.
///
/// Returns `None` when `read` holds no `\n`. Anything after the first
/// newline is not part of the result.
pub fn extract_line(read: &[u8]) -> Option<&[u8]> {
    let end = read.iter().position(|&b| b == b'\n')?;
    read.get(..end)
}
