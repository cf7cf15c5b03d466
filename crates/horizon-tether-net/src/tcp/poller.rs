//! Single non-blocking read step used by [`TcpClient::poll`](super::TcpClient::poll).

use std::io::{self, Read};
use std::net::TcpStream;

/// What one read attempt observed.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// At least one byte was read.
    Data(Vec<u8>),
    /// Nothing is available right now.
    Empty,
    /// The peer closed its write side.
    Closed,
    /// The read failed.
    Failed(io::Error),
}

/// Read at most `max_bytes` from `stream` without blocking.
///
/// `stream` must be in non-blocking mode and `max_bytes` must be non-zero,
/// since a zero-length read is indistinguishable from end of stream.
pub(crate) fn read_available(mut stream: &TcpStream, max_bytes: usize) -> ReadOutcome {
    debug_assert!(max_bytes > 0);

    let mut buffer = vec![0u8; max_bytes];
    match stream.read(&mut buffer) {
        Ok(0) => ReadOutcome::Closed,
        Ok(n) => {
            buffer.truncate(n);
            ReadOutcome::Data(buffer)
        }
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ) =>
        {
            ReadOutcome::Empty
        }
        Err(err) => ReadOutcome::Failed(err),
    }
}
