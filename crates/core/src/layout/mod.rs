//! Layout providers.
//!
//! A layout decides how a repository-relative path maps to artifact coordinates, which
//! digests its artifacts carry, what counts as metadata, and what a delete cascades to.
//! The set of layouts is closed; [`LayoutProviderRegistry`] maps configuration aliases onto
//! them.
//!
//! ## Providers
//!
//! | Alias | Provider | Digests | Metadata files |
//! |-------|----------|---------|----------------|
//! | `Maven 2` | [`LayoutProvider::Maven2`] | MD5, SHA-1 (hex) | `maven-metadata*.xml` |
//! | `NuGet` | [`LayoutProvider::NugetHierarchical`] | SHA-512 (base64) | `*.nuspec` |
//! | `P2 Repository` | [`LayoutProvider::P2`] | MD5, SHA-1 (hex) | site indexes |
//! | `Raw` | [`LayoutProvider::Raw`] | MD5, SHA-1 (hex) | none |

pub mod maven;
pub mod nuget;
pub mod p2;
pub mod raw;

pub use maven::MavenCoordinates;
pub use nuget::NugetCoordinates;
pub use p2::{P2Classifier, P2Coordinates};
pub use raw::RawCoordinates;

use crate::catalog::ArtifactCatalog;
use crate::constants::{MAVEN2_LAYOUT, NUGET_LAYOUT, P2_LAYOUT, RAW_LAYOUT};
use crate::fs::RepositoryFileSystem;
use crate::path::RepositoryPath;
use crate::{StorageError, StorageResult};
use depot_files::{ChecksumFiles, ChecksumReport, DigestAlgorithm, DigestEncoding, FilesError};
use depot_types::Repository;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ============================================================================
// Coordinates
// ============================================================================

/// Layout-specific identity parsed from a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactCoordinates {
    Maven(MavenCoordinates),
    Nuget(NugetCoordinates),
    P2(P2Coordinates),
    Raw(RawCoordinates),
}

impl ArtifactCoordinates {
    /// Identity without version: `group:artifact`, package id, unit id or raw path.
    pub fn id(&self) -> String {
        match self {
            Self::Maven(c) => format!("{}:{}", c.group_id, c.artifact_id),
            Self::Nuget(c) => c.id.clone(),
            Self::P2(c) => c.id.clone(),
            Self::Raw(c) => c.path.clone(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Maven(c) => Some(&c.version),
            Self::Nuget(c) => Some(&c.version),
            Self::P2(c) => Some(&c.version),
            Self::Raw(_) => None,
        }
    }

    /// Relative path these coordinates were derived from.
    pub fn to_path(&self) -> String {
        match self {
            Self::Maven(c) => c.to_path(),
            Self::Nuget(c) => c.to_path(),
            Self::P2(c) => c.to_path(),
            Self::Raw(c) => c.path.clone(),
        }
    }

    pub fn as_maven(&self) -> Option<&MavenCoordinates> {
        match self {
            Self::Maven(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maven(c) => c.fmt(f),
            Self::Nuget(c) => c.fmt(f),
            Self::P2(c) => c.fmt(f),
            Self::Raw(c) => c.fmt(f),
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutProvider {
    Maven2,
    NugetHierarchical,
    P2,
    Raw,
}

fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

impl LayoutProvider {
    pub const ALL: [LayoutProvider; 4] = [
        LayoutProvider::Maven2,
        LayoutProvider::NugetHierarchical,
        LayoutProvider::P2,
        LayoutProvider::Raw,
    ];

    /// Alias the provider is registered under by default.
    pub const fn alias(self) -> &'static str {
        match self {
            Self::Maven2 => MAVEN2_LAYOUT,
            Self::NugetHierarchical => NUGET_LAYOUT,
            Self::P2 => P2_LAYOUT,
            Self::Raw => RAW_LAYOUT,
        }
    }

    /// Parses a relative path into coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MalformedCoordinates`] if the path does not fit the layout's
    /// grammar.
    pub fn parse_coordinates(self, relative: &str) -> StorageResult<ArtifactCoordinates> {
        match self {
            Self::Maven2 => maven::parse_coordinates(relative).map(ArtifactCoordinates::Maven),
            Self::NugetHierarchical => {
                nuget::parse_coordinates(relative).map(ArtifactCoordinates::Nuget)
            }
            Self::P2 => p2::parse_coordinates(relative).map(ArtifactCoordinates::P2),
            Self::Raw => raw::parse_coordinates(relative).map(ArtifactCoordinates::Raw),
        }
    }

    pub fn is_metadata(self, relative: &str) -> bool {
        let name = file_name(relative);
        match self {
            Self::Maven2 => maven::is_metadata_file(name),
            Self::NugetHierarchical => nuget::is_manifest(name),
            Self::P2 => p2::is_index_file(name),
            Self::Raw => false,
        }
    }

    /// Whether the path is a checksum side-file of any supported algorithm.
    pub fn is_checksum(self, relative: &str) -> bool {
        ChecksumFiles::is_checksum_file(Path::new(file_name(relative)))
    }

    /// A payload: neither metadata nor a checksum, and parseable as coordinates.
    pub fn is_artifact(self, relative: &str) -> bool {
        !self.is_metadata(relative)
            && !self.is_checksum(relative)
            && self.parse_coordinates(relative).is_ok()
    }

    pub fn digest_algorithms(self) -> Vec<DigestAlgorithm> {
        match self {
            Self::NugetHierarchical => vec![DigestAlgorithm::Sha512],
            Self::Maven2 | Self::P2 | Self::Raw => {
                vec![DigestAlgorithm::Md5, DigestAlgorithm::Sha1]
            }
        }
    }

    pub fn checksum_encoding(self) -> DigestEncoding {
        match self {
            Self::NugetHierarchical => DigestEncoding::Base64,
            Self::Maven2 | Self::P2 | Self::Raw => DigestEncoding::Hex,
        }
    }

    /// Side-files removed together with `relative`.
    ///
    /// Maven repositories commonly carry SHA-256/SHA-512 side-files uploaded by newer clients,
    /// so the Maven cascade covers every supported algorithm.
    pub fn checksum_siblings(self, relative: &str) -> Vec<String> {
        let algorithms = match self {
            Self::Maven2 => DigestAlgorithm::ALL.to_vec(),
            _ => self.digest_algorithms(),
        };
        algorithms
            .into_iter()
            .map(|alg| format!("{relative}.{}", alg.extension()))
            .collect()
    }

    /// Non-checksum files removed together with `relative`: the manifest of a NuGet package.
    pub fn derived_siblings(self, relative: &str) -> Vec<String> {
        match self {
            Self::NugetHierarchical => match nuget::parse_coordinates(relative) {
                Ok(c) if c.extension == nuget::PACKAGE_EXTENSION => vec![c.manifest_path()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Whether the layout maintains `maven-metadata.xml` documents.
    pub fn supports_metadata(self) -> bool {
        matches!(self, Self::Maven2)
    }

    /// Removes the catalog record of `path`, if the catalog has one.
    ///
    /// # Returns
    ///
    /// `true` if a record was found and deleted.
    pub fn remove_catalog_record(
        self,
        catalog: &dyn ArtifactCatalog,
        path: &RepositoryPath,
    ) -> StorageResult<bool> {
        let record =
            catalog.find_one_artifact(path.storage_id(), path.repository_id(), path.relative())?;
        match record {
            Some(record) => {
                catalog.delete(&record)?;
                tracing::debug!(%path, "removed catalog record");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes `path` with the layout's cascade.
    ///
    /// For a file: its catalog record is removed first (a catalog failure aborts the delete),
    /// then the file goes to trash or is removed, then its checksum side-files and derived
    /// files follow when `delete_checksums` is set. For a directory: catalog records of every
    /// artifact below it are removed best-effort (failures are logged), then the whole tree is
    /// trashed or removed. A missing path is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog rejects a single-file removal or the physical
    /// delete fails.
    pub fn delete_path(
        self,
        fs: &RepositoryFileSystem,
        path: &RepositoryPath,
        force: bool,
        delete_checksums: bool,
    ) -> StorageResult<()> {
        if !fs.exists(path) {
            tracing::warn!(%path, "delete requested for a path that does not exist");
            return Ok(());
        }

        if fs.is_directory(path) {
            for file in fs.list_files(path)? {
                if !self.is_artifact(file.relative()) {
                    continue;
                }
                if let Err(e) = self.remove_catalog_record(fs.catalog(), &file) {
                    tracing::warn!(path = %file, error = %e, "failed to remove catalog record");
                }
            }
            fs.remove_physical(path, force)?;
            return Ok(());
        }

        if self.is_artifact(path.relative()) {
            self.remove_catalog_record(fs.catalog(), path)?;
        }
        fs.remove_physical(path, force)?;

        if !delete_checksums || self.is_checksum(path.relative()) {
            return Ok(());
        }

        let cascade = self
            .checksum_siblings(path.relative())
            .into_iter()
            .chain(self.derived_siblings(path.relative()));
        for sibling in cascade {
            let sibling = RepositoryPath::new(std::sync::Arc::clone(path.repository()), &sibling)?;
            if fs.exists(&sibling) {
                fs.remove_physical(&sibling, force)?;
            }
        }
        Ok(())
    }

    /// Writes checksum side-files for every file below `base`, or below each of
    /// `version_directories` (relative to `base`) when that list is not empty.
    ///
    /// A missing version directory is logged and skipped; per-file failures are reported in
    /// [`ChecksumReport::failed`].
    pub fn generate_checksums(
        self,
        fs: &RepositoryFileSystem,
        base: &RepositoryPath,
        version_directories: &[String],
        force: bool,
    ) -> StorageResult<ChecksumReport> {
        let targets = if version_directories.is_empty() {
            vec![base.clone()]
        } else {
            version_directories
                .iter()
                .map(|dir| base.resolve(dir))
                .collect::<StorageResult<Vec<_>>>()?
        };

        let algorithms = self.digest_algorithms();
        let mut report = ChecksumReport::default();
        for target in targets {
            let result = fs.checksum_files().store_checksums(
                &target.physical_path(),
                &algorithms,
                self.checksum_encoding(),
                force,
            );
            match result {
                Ok(partial) => report.absorb(partial),
                Err(FilesError::NotFound(_)) if !version_directories.is_empty() => {
                    tracing::warn!(path = %target, "version directory does not exist");
                }
                Err(e) => return Err(target.error(e)),
            }
        }

        tracing::info!(
            path = %base,
            files = report.files_processed,
            written = report.checksums_written,
            failed = report.failed.len(),
            "generated checksums"
        );
        Ok(report)
    }
}

impl fmt::Display for LayoutProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Alias to provider map, constructed once at startup and shared by `Arc`.
#[derive(Debug, Default)]
pub struct LayoutProviderRegistry {
    providers: RwLock<BTreeMap<String, LayoutProvider>>,
}

impl LayoutProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider under its default alias.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for provider in LayoutProvider::ALL {
            registry.register(provider.alias(), provider);
        }
        registry
    }

    /// Registers `provider` under `alias`, returning the provider it replaced.
    pub fn register(&self, alias: impl Into<String>, provider: LayoutProvider) -> Option<LayoutProvider> {
        let alias = alias.into();
        tracing::debug!(%alias, %provider, "registering layout provider");
        self.providers.write().insert(alias, provider)
    }

    /// # Errors
    ///
    /// Returns [`StorageError::UnknownLayout`] if nothing is registered under `alias`.
    pub fn get(&self, alias: &str) -> StorageResult<LayoutProvider> {
        self.providers
            .read()
            .get(alias)
            .copied()
            .ok_or_else(|| StorageError::UnknownLayout(alias.to_owned()))
    }

    pub fn remove(&self, alias: &str) -> Option<LayoutProvider> {
        self.providers.write().remove(alias)
    }

    /// Registered aliases in sorted order.
    pub fn aliases(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// Provider for a repository's configured layout.
    pub fn provider_for(&self, repository: &Repository) -> StorageResult<LayoutProvider> {
        self.get(repository.layout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults_and_lookup() {
        let registry = LayoutProviderRegistry::with_defaults();
        assert_eq!(
            registry.aliases(),
            vec!["Maven 2", "NuGet", "P2 Repository", "Raw"]
        );
        assert_eq!(registry.get("Maven 2").unwrap(), LayoutProvider::Maven2);
        assert!(matches!(
            registry.get("npm"),
            Err(StorageError::UnknownLayout(alias)) if alias == "npm"
        ));
    }

    #[test]
    fn test_registry_register_and_remove() {
        let registry = LayoutProviderRegistry::new();
        assert_eq!(registry.register("maven", LayoutProvider::Maven2), None);
        assert_eq!(
            registry.register("maven", LayoutProvider::Raw),
            Some(LayoutProvider::Maven2)
        );
        assert_eq!(registry.remove("maven"), Some(LayoutProvider::Raw));
        assert!(registry.get("maven").is_err());
    }

    #[test]
    fn test_maven_classification() {
        let maven = LayoutProvider::Maven2;
        assert!(maven.is_artifact("com/example/foo/1.0/foo-1.0.jar"));
        assert!(maven.is_checksum("com/example/foo/1.0/foo-1.0.jar.md5"));
        assert!(!maven.is_artifact("com/example/foo/1.0/foo-1.0.jar.md5"));
        assert!(maven.is_metadata("com/example/foo/maven-metadata.xml"));
        assert!(!maven.is_artifact("com/example/foo/maven-metadata.xml"));
        assert!(!maven.is_artifact("com/example/foo"));
        assert_eq!(
            maven.digest_algorithms(),
            vec![DigestAlgorithm::Md5, DigestAlgorithm::Sha1]
        );
        assert_eq!(maven.checksum_encoding(), DigestEncoding::Hex);
        assert!(maven.checksum_siblings("a/b/c/1/c-1.jar").contains(&"a/b/c/1/c-1.jar.sha1".to_string()));
    }

    #[test]
    fn test_nuget_classification() {
        let nuget = LayoutProvider::NugetHierarchical;
        assert!(nuget.is_artifact("foo/1.0.0/foo.1.0.0.nupkg"));
        assert!(nuget.is_metadata("foo/1.0.0/foo.nuspec"));
        assert!(nuget.is_checksum("foo/1.0.0/foo.1.0.0.nupkg.sha512"));
        assert_eq!(nuget.digest_algorithms(), vec![DigestAlgorithm::Sha512]);
        assert_eq!(nuget.checksum_encoding(), DigestEncoding::Base64);
        assert_eq!(
            nuget.checksum_siblings("foo/1.0.0/foo.1.0.0.nupkg"),
            vec!["foo/1.0.0/foo.1.0.0.nupkg.sha512"]
        );
        assert_eq!(
            nuget.derived_siblings("foo/1.0.0/foo.1.0.0.nupkg"),
            vec!["foo/1.0.0/foo.nuspec"]
        );
        assert!(nuget.derived_siblings("foo/1.0.0/foo.nuspec").is_empty());
    }

    #[test]
    fn test_p2_and_raw_classification() {
        assert!(LayoutProvider::P2.is_metadata("site/artifacts.jar"));
        assert!(LayoutProvider::P2.is_artifact("site/plugins/a_1.0.jar"));
        assert!(LayoutProvider::Raw.is_artifact("any/file.bin"));
        assert!(!LayoutProvider::Raw.is_artifact("any/file.bin.sha1"));
        assert!(!LayoutProvider::Raw.is_metadata("maven-metadata.xml"));
    }

    #[test]
    fn test_coordinates_round_trip_path() {
        for (provider, path) in [
            (LayoutProvider::Maven2, "com/example/foo/1.0/foo-1.0-sources.jar"),
            (LayoutProvider::NugetHierarchical, "foo/1.0.0/foo.1.0.0.nupkg"),
            (LayoutProvider::P2, "plugins/a.b_1.0.0.jar"),
            (LayoutProvider::Raw, "x/y.bin"),
        ] {
            let coordinates = provider.parse_coordinates(path).unwrap();
            assert_eq!(coordinates.to_path(), path, "{provider}");
        }
    }
}
