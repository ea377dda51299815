//! Exact-length transfers and absolute seeks over the crate's stream traits.
//!
//! The helpers only rely on the `read` / `write` / `seek` methods shared by the `std::io` traits
//! and their `no_std` counterparts, so the codecs above them are agnostic of the feature set.

use alloc::vec::Vec;

use log::debug;

use crate::{DiskRead, DiskSeek, DiskWrite, GptError, SeekFrom};

/// Largest chunk buffered at once when reading a trailing region of unknown, caller-declared size.
const READ_CHUNK: usize = 0x1000;

#[cfg(feature = "std")]
fn interrupted(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::Interrupted
}

#[cfg(not(feature = "std"))]
fn interrupted(err: &crate::IoError) -> bool {
    match *err {}
}

/// Fills `buf` entirely, or fails with [`GptError::MalformedStream`].
pub(crate) fn read_exact<D>(device: &mut D, buf: &mut [u8]) -> Result<(), GptError>
where
    D: DiskRead + ?Sized,
{
    let mut filled = 0;

    while filled < buf.len() {
        match device.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if interrupted(&err) => continue,
            Err(err) => {
                debug!("read failed after {filled} of {} bytes: {err:?}", buf.len());
                break;
            }
        }
    }

    if filled != buf.len() {
        return Err(GptError::MalformedStream {
            wanted: buf.len(),
            got: filled,
        });
    }

    Ok(())
}

/// Reads exactly `len` bytes into a new buffer.
///
/// Memory grows with the data actually read, so a corrupted length field cannot trigger a huge
/// allocation up front.
pub(crate) fn read_vec<D>(device: &mut D, len: usize) -> Result<Vec<u8>, GptError>
where
    D: DiskRead + ?Sized,
{
    let mut out = Vec::with_capacity(len.min(READ_CHUNK));
    let mut chunk = [0u8; READ_CHUNK];

    while out.len() < len {
        let want = (len - out.len()).min(READ_CHUNK);

        match read_exact(device, &mut chunk[..want]) {
            Ok(()) => out.extend_from_slice(&chunk[..want]),
            Err(GptError::MalformedStream { got, .. }) => {
                return Err(GptError::MalformedStream {
                    wanted: len,
                    got: out.len() + got,
                })
            }
            Err(err) => return Err(err),
        }
    }

    Ok(out)
}

/// Writes all of `buf`, or fails with [`GptError::MalformedStream`].
pub(crate) fn write_all<D>(device: &mut D, buf: &[u8]) -> Result<(), GptError>
where
    D: DiskWrite + ?Sized,
{
    let mut written = 0;

    while written < buf.len() {
        match device.write(&buf[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if interrupted(&err) => continue,
            Err(err) => {
                debug!("write failed after {written} of {} bytes: {err:?}", buf.len());
                break;
            }
        }
    }

    if written != buf.len() {
        return Err(GptError::MalformedStream {
            wanted: buf.len(),
            got: written,
        });
    }

    Ok(())
}

pub(crate) fn seek_to<D>(device: &mut D, offset: u64) -> Result<(), GptError>
where
    D: DiskSeek + ?Sized,
{
    device.seek(SeekFrom::Start(offset)).map_err(|err| {
        debug!("seek to {offset:#x} failed: {err:?}");
        GptError::Seek(offset)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, ErrorKind, Read, Write};
    use std::vec;

    use super::{read_exact, read_vec, write_all, READ_CHUNK};
    use crate::GptError;

    #[test]
    pub fn short_read_reports_progress() {
        let mut dev = Cursor::new(vec![0xAAu8; 10]);
        let mut buf = [0u8; 16];

        assert_eq!(
            read_exact(&mut dev, &mut buf),
            Err(GptError::MalformedStream {
                wanted: 16,
                got: 10
            })
        );
    }

    #[test]
    pub fn chunked_read_spans_chunks() {
        let data: std::vec::Vec<u8> = (0..READ_CHUNK * 2 + 7).map(|i| i as u8).collect();
        let mut dev = Cursor::new(data.clone());

        assert_eq!(read_vec(&mut dev, data.len()).unwrap(), data);
    }

    #[test]
    pub fn chunked_read_counts_partial_chunks() {
        let mut dev = Cursor::new(vec![0u8; READ_CHUNK + 3]);

        assert_eq!(
            read_vec(&mut dev, 1 << 30),
            Err(GptError::MalformedStream {
                wanted: 1 << 30,
                got: READ_CHUNK + 3
            })
        );
    }

    #[test]
    pub fn write_into_full_slice_fails() {
        let mut backing = [0u8; 4];
        let mut dev = Cursor::new(&mut backing[..]);

        assert_eq!(
            write_all(&mut dev, &[1, 2, 3, 4, 5]),
            Err(GptError::MalformedStream { wanted: 5, got: 4 })
        );
    }

    /// Fails its first call with `Interrupted`, then forwards to the inner stream.
    struct Interrupting<T> {
        inner: T,
        interrupted: bool,
    }

    impl<T> Interrupting<T> {
        fn new(inner: T) -> Self {
            Self {
                inner,
                interrupted: false,
            }
        }

        fn interrupt(&mut self) -> io::Result<()> {
            if self.interrupted {
                return Ok(());
            }

            self.interrupted = true;
            Err(io::Error::from(ErrorKind::Interrupted))
        }
    }

    impl<T: Read> Read for Interrupting<T> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt()?;
            self.inner.read(buf)
        }
    }

    impl<T: Write> Write for Interrupting<T> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.interrupt()?;
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    pub fn interrupted_read_is_retried() {
        let mut dev = Interrupting::new(Cursor::new(vec![0x5Au8; 8]));
        let mut buf = [0u8; 8];

        assert_eq!(read_exact(&mut dev, &mut buf), Ok(()));
        assert_eq!(buf, [0x5A; 8]);
    }

    #[test]
    pub fn interrupted_write_is_retried() {
        let mut backing = [0u8; 4];
        let mut dev = Interrupting::new(Cursor::new(&mut backing[..]));

        assert_eq!(write_all(&mut dev, &[1, 2, 3, 4]), Ok(()));
        assert_eq!(backing, [1, 2, 3, 4]);
    }
}
