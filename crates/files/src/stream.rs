//! Digest stream decorators.
//!
//! [`DigestReader`] and [`DigestWriter`] wrap an inner stream and feed exactly the bytes that
//! were transferred (not the bytes requested) into their [`DigestSet`].

use crate::digest::{Checksums, DigestAlgorithm, DigestSet};
use std::io::{self, Read, Write};

/// Read decorator computing digests over everything read through it.
#[derive(Debug)]
pub struct DigestReader<R> {
    inner: R,
    digests: DigestSet,
}

impl<R: Read> DigestReader<R> {
    pub fn new(inner: R, digests: DigestSet) -> Self {
        Self { inner, digests }
    }

    pub fn digests(&self) -> &DigestSet {
        &self.digests
    }

    pub fn digests_mut(&mut self) -> &mut DigestSet {
        &mut self.digests
    }

    /// Streamed digest for `algorithm`; only complete once the inner stream is exhausted.
    pub fn finalize(&mut self, algorithm: DigestAlgorithm) -> Option<String> {
        self.digests.finalize(algorithm)
    }

    /// Reads the remaining bytes into a sink so every digest covers the whole stream.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }

    pub fn into_parts(self) -> (R, DigestSet) {
        (self.inner, self.digests)
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digests.update(&buf[..n]);
        Ok(n)
    }
}

/// Write decorator computing digests over everything the inner writer accepted.
#[derive(Debug)]
pub struct DigestWriter<W> {
    inner: W,
    digests: DigestSet,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W, digests: DigestSet) -> Self {
        Self { inner, digests }
    }

    pub fn digests(&self) -> &DigestSet {
        &self.digests
    }

    pub fn digests_mut(&mut self) -> &mut DigestSet {
        &mut self.digests
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Finalizes every digest, then flushes the inner writer.
    ///
    /// Digests are finalized before the flush is attempted, so they are available through
    /// [`Self::digests_mut`] even when the flush fails.
    pub fn finish(&mut self) -> io::Result<Checksums> {
        let checksums = self.digests.finalize_all();
        self.inner.flush()?;
        Ok(checksums)
    }

    pub fn into_parts(self) -> (W, DigestSet) {
        (self.inner, self.digests)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digests.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DigestEncoding;
    use std::io::Cursor;

    const ALGORITHMS: [DigestAlgorithm; 3] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha512,
    ];

    /// Accepts at most `limit` bytes per write call.
    struct ShortWriter {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingFlush;

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_write_then_read_matches_one_shot() {
        for len in [0usize, 1, 63, 4096, 100_003] {
            let bytes = sample(len);

            let mut writer = DigestWriter::new(
                Vec::new(),
                DigestSet::new(&ALGORITHMS, DigestEncoding::Hex),
            );
            writer.write_all(&bytes).unwrap();
            let written = writer.finish().unwrap();
            let (stored, _) = writer.into_parts();
            assert_eq!(stored, bytes);

            let mut reader = DigestReader::new(
                Cursor::new(stored),
                DigestSet::new(&ALGORITHMS, DigestEncoding::Hex),
            );
            reader.drain().unwrap();

            for alg in ALGORITHMS {
                let expected = alg.digest(&bytes, DigestEncoding::Hex);
                assert_eq!(written[&alg], expected, "write {alg} len {len}");
                assert_eq!(reader.finalize(alg).unwrap(), expected, "read {alg} len {len}");
            }
        }
    }

    #[test]
    fn test_short_writes_digest_only_accepted_bytes() {
        let bytes = sample(1000);
        let mut writer = DigestWriter::new(
            ShortWriter {
                data: Vec::new(),
                limit: 7,
            },
            DigestSet::new(&[DigestAlgorithm::Sha1], DigestEncoding::Hex),
        );

        // A single write call only transfers `limit` bytes.
        let n = writer.write(&bytes).unwrap();
        assert_eq!(n, 7);
        assert_eq!(writer.digests().bytes_processed(), 7);

        writer.write_all(&bytes[n..]).unwrap();
        let checksums = writer.finish().unwrap();
        assert_eq!(
            checksums[&DigestAlgorithm::Sha1],
            DigestAlgorithm::Sha1.digest(&bytes, DigestEncoding::Hex)
        );
        assert_eq!(writer.get_ref().data, bytes);
    }

    #[test]
    fn test_finish_finalizes_even_when_flush_fails() {
        let mut writer = DigestWriter::new(
            FailingFlush,
            DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex),
        );
        writer.write_all(b"payload").unwrap();
        assert!(writer.finish().is_err());

        let digest = writer.digests_mut().finalize(DigestAlgorithm::Md5).unwrap();
        assert_eq!(digest, DigestAlgorithm::Md5.digest(b"payload", DigestEncoding::Hex));
    }

    #[test]
    fn test_algorithm_added_before_reading() {
        let mut reader = DigestReader::new(
            Cursor::new(b"abc".to_vec()),
            DigestSet::empty(DigestEncoding::Hex),
        );
        reader.digests_mut().add_algorithm(DigestAlgorithm::Sha256);
        reader.drain().unwrap();
        assert_eq!(
            reader.finalize(DigestAlgorithm::Sha256).unwrap(),
            DigestAlgorithm::Sha256.digest(b"abc", DigestEncoding::Hex)
        );
    }

    #[test]
    fn test_reader_finalize_twice() {
        let mut reader = DigestReader::new(
            Cursor::new(b"abc".to_vec()),
            DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex),
        );
        reader.drain().unwrap();
        let first = reader.finalize(DigestAlgorithm::Md5);
        let second = reader.finalize(DigestAlgorithm::Md5);
        assert_eq!(first, second);
    }
}
