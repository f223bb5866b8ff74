use std::io::{self, Read};

/// Reads until `buf` is full or the reader is exhausted. Returns the number
/// of bytes read; anything short of `buf.len()` means end of stream.
pub fn read_part(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(filled)
}
