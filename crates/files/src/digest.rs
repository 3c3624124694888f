//! Digest algorithms and incrementally fed digest sets.
//!
//! A [`DigestSet`] holds one live accumulator per registered algorithm, in registration order.
//! Finalizing an algorithm consumes its accumulator exactly once and caches the encoded string;
//! later calls return the cached value.
//!
//! A set may also carry an *expected* value per algorithm (typically read from an existing
//! checksum side-file, or supplied by a deploying client). [`DigestSet::checksum`] prefers the
//! expected value, [`DigestSet::verify`] compares it against what was actually streamed.

use crate::{FilesError, FilesResult};
use base64::{engine::general_purpose, Engine as _};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Finalized digests keyed by algorithm.
pub type Checksums = BTreeMap<DigestAlgorithm, String>;

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha512,
    ];

    /// Canonical algorithm name, e.g. `SHA-1`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Side-file extension: the name lowercased with dashes stripped.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Parses an algorithm name, ignoring case, dashes and underscores (`sha-1`, `SHA1`, `Sha_1`).
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnsupportedAlgorithm`] for any other name.
    pub fn from_name(name: &str) -> FilesResult<Self> {
        let normalised: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Self::from_extension(&normalised)
            .ok_or_else(|| FilesError::UnsupportedAlgorithm(name.to_owned()))
    }

    /// Maps a side-file extension back to its algorithm.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.extension() == extension)
    }

    /// One-shot digest of `bytes`.
    pub fn digest(self, bytes: &[u8], encoding: DigestEncoding) -> String {
        let mut accumulator = Accumulator::new(self);
        accumulator.update(bytes);
        encoding.encode(&accumulator.finalize())
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// How finalized digest bytes are turned into text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DigestEncoding {
    /// Lowercase hexadecimal
    #[default]
    Hex,
    /// Standard base64 with padding
    Base64,
}

impl DigestEncoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Compares two encoded digests. Hex comparison ignores case.
    pub fn matches(self, a: &str, b: &str) -> bool {
        let (a, b) = (a.trim(), b.trim());
        match self {
            Self::Hex => a.eq_ignore_ascii_case(b),
            Self::Base64 => a == b,
        }
    }
}

enum Accumulator {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Accumulator {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            DigestAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(bytes),
            Self::Sha1(hasher) => hasher.update(bytes),
            Self::Sha256(hasher) => hasher.update(bytes),
            Self::Sha512(hasher) => hasher.update(bytes),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(ctx) => ctx.compute().0.to_vec(),
            Self::Sha1(hasher) => hasher.finalize().to_vec(),
            Self::Sha256(hasher) => hasher.finalize().to_vec(),
            Self::Sha512(hasher) => hasher.finalize().to_vec(),
        }
    }
}

enum DigestState {
    Live(Accumulator),
    Finalized(String),
    // Transient placeholder while the accumulator is moved out for finalization.
    Taken,
}

struct Entry {
    algorithm: DigestAlgorithm,
    state: DigestState,
    expected: Option<String>,
}

/// Ordered set of digest accumulators attached to one stream.
pub struct DigestSet {
    entries: Vec<Entry>,
    encoding: DigestEncoding,
    bytes: u64,
}

impl DigestSet {
    /// Creates a set with one accumulator per algorithm. Duplicates are ignored.
    pub fn new(algorithms: &[DigestAlgorithm], encoding: DigestEncoding) -> Self {
        let mut set = Self::empty(encoding);
        for algorithm in algorithms {
            set.add_algorithm(*algorithm);
        }
        set
    }

    /// Creates a set from algorithm names.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnsupportedAlgorithm`] on the first unknown name; no algorithm is
    /// silently skipped.
    pub fn from_names<I, S>(names: I, encoding: DigestEncoding) -> FilesResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty(encoding);
        for name in names {
            set.add_algorithm(DigestAlgorithm::from_name(name.as_ref())?);
        }
        Ok(set)
    }

    pub fn empty(encoding: DigestEncoding) -> Self {
        Self {
            entries: Vec::new(),
            encoding,
            bytes: 0,
        }
    }

    /// Registers another algorithm.
    ///
    /// Must be called before any bytes are fed, otherwise the digest only covers the bytes fed
    /// afterwards. Returns `false` if the algorithm was already registered.
    pub fn add_algorithm(&mut self, algorithm: DigestAlgorithm) -> bool {
        if self.contains(algorithm) {
            return false;
        }
        self.entries.push(Entry {
            algorithm,
            state: DigestState::Live(Accumulator::new(algorithm)),
            expected: None,
        });
        true
    }

    pub fn contains(&self, algorithm: DigestAlgorithm) -> bool {
        self.entries.iter().any(|e| e.algorithm == algorithm)
    }

    /// Registered algorithms in registration order.
    pub fn algorithms(&self) -> impl Iterator<Item = DigestAlgorithm> + '_ {
        self.entries.iter().map(|e| e.algorithm)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    /// Number of bytes fed so far.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes
    }

    /// Feeds `bytes` to every live accumulator in registration order.
    pub fn update(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.bytes += bytes.len() as u64;
        for entry in &mut self.entries {
            match &mut entry.state {
                DigestState::Live(accumulator) => accumulator.update(bytes),
                DigestState::Finalized(_) | DigestState::Taken => {
                    tracing::debug!(
                        algorithm = %entry.algorithm,
                        "bytes fed after finalization are not part of the digest"
                    );
                }
            }
        }
    }

    /// Finalizes one algorithm and returns its encoded digest.
    ///
    /// Idempotent: the first call consumes the accumulator, every later call returns the cached
    /// string. Returns `None` if the algorithm is not registered.
    pub fn finalize(&mut self, algorithm: DigestAlgorithm) -> Option<String> {
        let encoding = self.encoding;
        let entry = self.entries.iter_mut().find(|e| e.algorithm == algorithm)?;

        if let DigestState::Finalized(value) = &entry.state {
            return Some(value.clone());
        }

        let value = match std::mem::replace(&mut entry.state, DigestState::Taken) {
            DigestState::Live(accumulator) => encoding.encode(&accumulator.finalize()),
            DigestState::Finalized(value) => value,
            DigestState::Taken => return None,
        };
        entry.state = DigestState::Finalized(value.clone());
        Some(value)
    }

    /// Finalizes every registered algorithm.
    pub fn finalize_all(&mut self) -> Checksums {
        let algorithms: Vec<DigestAlgorithm> = self.algorithms().collect();
        algorithms
            .into_iter()
            .filter_map(|alg| self.finalize(alg).map(|value| (alg, value)))
            .collect()
    }

    /// Records the digest the streamed bytes are expected to produce.
    ///
    /// Ignored (returns `false`) for algorithms that are not registered or for blank values.
    pub fn set_expected(&mut self, algorithm: DigestAlgorithm, value: impl Into<String>) -> bool {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self.entries.iter_mut().find(|e| e.algorithm == algorithm) {
            Some(entry) => {
                entry.expected = Some(value.to_owned());
                true
            }
            None => false,
        }
    }

    pub fn expected(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.algorithm == algorithm)
            .and_then(|e| e.expected.as_deref())
    }

    /// The checksum to report for `algorithm`: the expected value when one was recorded,
    /// otherwise the finalized streamed digest.
    pub fn checksum(&mut self, algorithm: DigestAlgorithm) -> Option<String> {
        if let Some(expected) = self.expected(algorithm) {
            return Some(expected.to_owned());
        }
        self.finalize(algorithm)
    }

    /// Compares every expected value against the streamed digest.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::ChecksumMismatch`] for the first algorithm whose digest differs.
    pub fn verify(&mut self) -> FilesResult<()> {
        let expectations: Vec<(DigestAlgorithm, String)> = self
            .entries
            .iter()
            .filter_map(|e| e.expected.clone().map(|v| (e.algorithm, v)))
            .collect();

        for (algorithm, expected) in expectations {
            let actual = self.finalize(algorithm).unwrap_or_default();
            if !self.encoding.matches(&expected, &actual) {
                return Err(FilesError::ChecksumMismatch {
                    algorithm,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DigestSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestSet")
            .field("algorithms", &self.algorithms().collect::<Vec<_>>())
            .field("encoding", &self.encoding)
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &[u8] = b"hello world";

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            DigestAlgorithm::Md5.digest(HELLO, DigestEncoding::Hex),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            DigestAlgorithm::Sha1.digest(HELLO, DigestEncoding::Hex),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            DigestAlgorithm::Sha256.digest(HELLO, DigestEncoding::Hex),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha512_base64_encoding() {
        let hex = DigestAlgorithm::Sha512.digest(HELLO, DigestEncoding::Hex);
        let b64 = DigestAlgorithm::Sha512.digest(HELLO, DigestEncoding::Base64);
        let decoded = general_purpose::STANDARD.decode(&b64).unwrap();
        assert_eq!(hex::encode(decoded), hex);
        assert_eq!(b64.len(), 88);
    }

    #[test]
    fn test_from_name_accepts_variants() {
        assert_eq!(DigestAlgorithm::from_name("SHA-1").unwrap(), DigestAlgorithm::Sha1);
        assert_eq!(DigestAlgorithm::from_name("sha1").unwrap(), DigestAlgorithm::Sha1);
        assert_eq!(DigestAlgorithm::from_name("Sha_512").unwrap(), DigestAlgorithm::Sha512);
        assert_eq!(DigestAlgorithm::from_name("md5").unwrap(), DigestAlgorithm::Md5);
    }

    #[test]
    fn test_from_names_rejects_unknown() {
        let result = DigestSet::from_names(["MD5", "WHIRLPOOL"], DigestEncoding::Hex);
        assert!(matches!(result, Err(FilesError::UnsupportedAlgorithm(name)) if name == "WHIRLPOOL"));
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut set = DigestSet::new(
            &[DigestAlgorithm::Md5, DigestAlgorithm::Sha1, DigestAlgorithm::Sha512],
            DigestEncoding::Hex,
        );
        for chunk in HELLO.chunks(3) {
            set.update(chunk);
        }
        assert_eq!(set.bytes_processed(), HELLO.len() as u64);

        let all = set.finalize_all();
        for alg in [DigestAlgorithm::Md5, DigestAlgorithm::Sha1, DigestAlgorithm::Sha512] {
            assert_eq!(all[&alg], alg.digest(HELLO, DigestEncoding::Hex));
        }
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Sha1], DigestEncoding::Hex);
        set.update(HELLO);
        let first = set.finalize(DigestAlgorithm::Sha1).unwrap();
        let second = set.finalize(DigestAlgorithm::Sha1).unwrap();
        assert_eq!(first, second);

        // Bytes after finalization do not disturb the cached value.
        set.update(b"more");
        assert_eq!(set.finalize(DigestAlgorithm::Sha1).unwrap(), first);
    }

    #[test]
    fn test_finalize_unregistered_is_none() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex);
        assert!(set.finalize(DigestAlgorithm::Sha256).is_none());
    }

    #[test]
    fn test_duplicate_algorithms_ignored() {
        let mut set = DigestSet::new(
            &[DigestAlgorithm::Md5, DigestAlgorithm::Md5],
            DigestEncoding::Hex,
        );
        assert_eq!(set.algorithms().count(), 1);
        assert!(!set.add_algorithm(DigestAlgorithm::Md5));
        assert!(set.add_algorithm(DigestAlgorithm::Sha1));
    }

    #[test]
    fn test_checksum_prefers_expected() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex);
        set.update(HELLO);
        assert!(set.set_expected(DigestAlgorithm::Md5, "  precomputed\n"));
        assert_eq!(set.checksum(DigestAlgorithm::Md5).unwrap(), "precomputed");
    }

    #[test]
    fn test_blank_expected_ignored() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex);
        assert!(!set.set_expected(DigestAlgorithm::Md5, "   "));
        assert!(!set.set_expected(DigestAlgorithm::Sha1, "abc"));
        assert!(set.expected(DigestAlgorithm::Md5).is_none());
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Sha1], DigestEncoding::Hex);
        set.update(HELLO);
        set.set_expected(DigestAlgorithm::Sha1, "0000");
        let err = set.verify().unwrap_err();
        assert!(matches!(
            err,
            FilesError::ChecksumMismatch { algorithm: DigestAlgorithm::Sha1, .. }
        ));
    }

    #[test]
    fn test_verify_ignores_hex_case() {
        let mut set = DigestSet::new(&[DigestAlgorithm::Md5], DigestEncoding::Hex);
        set.update(HELLO);
        set.set_expected(DigestAlgorithm::Md5, "5EB63BBBE01EEED093CB22BB8F5ACDC3");
        assert!(set.verify().is_ok());
    }
}
