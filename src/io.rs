use crate::types::BackupError;
use std::fmt;
use std::io::prelude::*;

/// Output stream that keeps track of how many bytes have been written to it.
///
/// All output must go through [`write_str`](ByteCountWriter::write_str) or
/// the `write!` macro; the wrapped stream is never handed out mutably, so the
/// byte count always matches the stream length. Table of contents offsets are
/// taken from [`byte_count`](ByteCountWriter::byte_count).
#[derive(Debug)]
pub struct ByteCountWriter<W: Write> {
    inner: W,
    byte_count: u64,
}

impl<W: Write> ByteCountWriter<W> {
    pub fn new(inner: W) -> ByteCountWriter<W> {
        ByteCountWriter {
            inner,
            byte_count: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), BackupError> {
        self.inner.write_all(s.as_bytes())?;
        self.byte_count += s.len() as u64;
        Ok(())
    }

    /// Target of the `write!` macro.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), BackupError> {
        match args.as_str() {
            Some(s) => self.write_str(s),
            None => self.write_str(&fmt::format(args)),
        }
    }

    pub fn flush(&mut self) -> Result<(), BackupError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn counts_bytes() -> Result<(), BackupError> {
        let mut out = ByteCountWriter::new(Vec::new());
        assert_eq!(out.byte_count(), 0);

        out.write_str("SET statement_timeout = 0;\n")?;
        assert_eq!(out.byte_count(), 27);

        write!(out, "CREATE ROLE {};", "\"r\"")?;
        assert_eq!(out.byte_count(), 27 + 16);

        // empty writes do not move the offset
        out.write_str("")?;
        assert_eq!(out.byte_count(), 43);

        assert_eq!(out.byte_count(), out.get_ref().len() as u64);
        Ok(())
    }

    #[test]
    fn counts_bytes_not_chars() -> Result<(), BackupError> {
        let mut out = ByteCountWriter::new(Vec::new());
        out.write_str("COMMENT ON ROLE \"r\" IS 'café';")?;
        assert_eq!(out.byte_count(), 31);
        assert_eq!(out.into_inner().len(), 31);
        Ok(())
    }

    #[test]
    fn write_errors_are_returned() {
        let mut out = ByteCountWriter::new(BrokenPipe);
        let result = out.write_str("CREATE ROLE \"r\";");
        assert!(matches!(result, Err(BackupError::IOError(_))));
        assert_eq!(out.byte_count(), 0);
    }
}
