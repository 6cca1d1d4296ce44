use std::io::{Error, ErrorKind, IoSlice, IoSliceMut, Read, Seek, SeekFrom, Write};

/// Adapter giving a forward-only stream (stdin, a pipe, a compressor) the
/// [`Seek`] bound required by the SIM codec.
///
/// Only seeks that resolve to the current position succeed. Anything else
/// fails with [`ErrorKind::Unsupported`], which means a [`SimReader`] over a
/// `NoSeek` stream can be read once but not [reset].
///
/// [`SimReader`]: crate::sim::reader::SimReader
/// [reset]: crate::sim::reader::SimReader::reset
#[derive(Debug)]
pub struct NoSeek<T> {
    inner: T,
    position: u64,
}

impl<T> NoSeek<T> {
    /// Wraps `inner`, treating its current position as offset 0.
    ///
    /// # Examples
    /// ```
    /// use std::io::{Seek, SeekFrom};
    ///
    /// use simtools::sim::no_seek::NoSeek;
    ///
    /// let data: Vec<u8> = Vec::new();
    /// let mut reader = NoSeek::new(data.as_slice());
    ///
    /// assert!(reader.seek(SeekFrom::Start(0)).is_ok());
    /// assert!(reader.seek(SeekFrom::Start(16)).is_err());
    /// ```
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes read or written through this adapter so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn check_target(&self, target: Option<u64>) -> std::io::Result<u64> {
        match target {
            Some(target) if target == self.position => Ok(self.position),
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                format!(
                    "stream cannot seek away from its current position ({})",
                    self.position
                ),
            )),
        }
    }
}

impl<T> Seek for NoSeek<T> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(0) => Some(self.position),
            SeekFrom::Current(_) => None,
            SeekFrom::End(_) => None,
        };
        self.check_target(target)
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.position)
    }
}

impl<R: Read> Read for NoSeek<R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.inner.read(buf)?;
        self.position += size as u64;
        Ok(size)
    }

    #[inline]
    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> std::io::Result<usize> {
        let size = self.inner.read_vectored(bufs)?;
        self.position += size as u64;
        Ok(size)
    }
}

impl<W: Write> Write for NoSeek<W> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.position += size as u64;
        Ok(size)
    }

    #[inline]
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> std::io::Result<usize> {
        let size = self.inner.write_vectored(bufs)?;
        self.position += size as u64;
        Ok(size)
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
