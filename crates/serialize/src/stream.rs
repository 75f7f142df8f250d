//! The byte stream capabilities every codec is written against.
//!
//! [`Writer`] and [`Reader`] are deliberately small: single byte and bulk
//! transfers only, no seeking and no rewinding. Both are implemented for every
//! [`std::io::Write`] and [`std::io::Read`], so in-memory buffers, files and
//! sockets can be used directly:
//!
//! ```ignore
//! use strand_serialize::stream::{Reader, Writer};
//!
//! let mut buffer = Vec::new();
//! buffer.write_byte(7)?;
//! buffer.write_str("hi")?;
//!
//! let mut input: &[u8] = &buffer;
//! assert_eq!(input.read_byte()?, 7);
//! ```

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Size of the scratch buffer used when discarding bytes.
const SKIP_CHUNK: usize = 256;

/// A sink of bytes.
///
/// Errors report, through [`Error::bytes`], how many bytes of the failed call
/// reached the sink before the failure.
pub trait Writer {
    /// Writes a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sink fails.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Writes all of `bytes`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sink fails; the error carries the
    /// number of bytes written before the failure.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Writes the UTF-8 bytes of `s`, returning how many were written.
    ///
    /// # Errors
    ///
    /// See [`Writer::write_bytes`].
    fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write_bytes(s.as_bytes())
    }
}

/// A source of bytes.
pub trait Reader {
    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is exhausted or fails.
    fn read_byte(&mut self) -> Result<u8>;

    /// Fills `buf` completely, returning its length.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is exhausted or fails before `buf` is
    /// full; the error carries the number of bytes read into `buf`.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Consumes and discards exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `len` bytes are available; the error
    /// carries the number of bytes discarded.
    fn skip_bytes(&mut self, len: usize) -> Result<usize> {
        let mut scratch = [0u8; SKIP_CHUNK];
        let mut skipped = 0;

        while skipped < len {
            let chunk = (len - skipped).min(SKIP_CHUNK);
            skipped += self
                .read_bytes(&mut scratch[..chunk])
                .map_err(|e| e.offset_by(skipped))?;
        }

        Ok(skipped)
    }
}

impl<W: Write + ?Sized> Writer for W {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte]).map(|_| ())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut written = 0;

        while written < bytes.len() {
            match self.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(Error::from(io::Error::from(
                        io::ErrorKind::WriteZero,
                    ))
                    .offset_by(written));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::from(e).offset_by(written)),
            }
        }

        Ok(written)
    }
}

impl<R: Read + ?Sized> Reader for R {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;

        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::from(io::Error::from(
                        io::ErrorKind::UnexpectedEof,
                    ))
                    .offset_by(filled));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::from(e).offset_by(filled)),
            }
        }

        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// A sink that accepts a fixed number of bytes, one per call.
    struct Trickle {
        accepted: Vec<u8>,
        capacity: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted.len() == self.capacity {
                return Err(io::Error::other("sink full"));
            }
            self.accepted.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn partial_write_reports_written_bytes() {
        let mut sink = Trickle { accepted: Vec::new(), capacity: 3 };

        let error = sink.write_str("hello").unwrap_err();

        assert_eq!(error.bytes(), 3);
        assert_eq!(sink.accepted, b"hel");
        assert!(matches!(error.kind(), ErrorKind::Stream(_)));
    }

    #[test]
    fn short_read_reports_filled_bytes() {
        let mut input: &[u8] = &[1, 2];
        let mut buf = [0u8; 4];

        let error = input.read_bytes(&mut buf).unwrap_err();

        assert_eq!(error.bytes(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
    }

    #[test]
    fn skip_spans_multiple_chunks() {
        let data = vec![9u8; SKIP_CHUNK * 2 + 5];
        let mut input: &[u8] = &data;

        assert_eq!(input.skip_bytes(SKIP_CHUNK + 3).unwrap(), SKIP_CHUNK + 3);
        assert_eq!(input.len(), SKIP_CHUNK + 2);

        let error = input.skip_bytes(SKIP_CHUNK * 2).unwrap_err();
        assert_eq!(error.bytes(), SKIP_CHUNK + 2);
    }
}
