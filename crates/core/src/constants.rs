//! Constants shared across the depot core.

/// Layout alias of the Maven 2 provider.
pub const MAVEN2_LAYOUT: &str = "Maven 2";

/// Layout alias of the hierarchical NuGet provider.
pub const NUGET_LAYOUT: &str = "NuGet";

/// Layout alias of the P2 (Eclipse update site) provider.
pub const P2_LAYOUT: &str = "P2 Repository";

/// Layout alias of the raw provider.
pub const RAW_LAYOUT: &str = "Raw";

/// Soft-delete holding area below a repository basedir.
pub const TRASH_DIR_NAME: &str = ".trash";

/// Staging area for in-flight writes below a repository basedir.
pub const TEMP_DIR_NAME: &str = ".temp";

/// Maven metadata document name.
pub const MAVEN_METADATA_FILE: &str = "maven-metadata.xml";

/// Model version written into per-version snapshot metadata.
pub const METADATA_MODEL_VERSION: &str = "1.1.0";

/// `lastUpdated` / `updated` format in Maven metadata.
pub const METADATA_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp format embedded in timestamped snapshot versions.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d.%H%M%S";

/// Version suffix marking a Maven snapshot.
pub const SNAPSHOT_SUFFIX: &str = "SNAPSHOT";

/// Packaging of a Maven plugin pom.
pub const MAVEN_PLUGIN_PACKAGING: &str = "maven-plugin";

/// Number of path lock entries above which dead entries are pruned.
pub const DEFAULT_LOCK_PRUNE_THRESHOLD: usize = 1024;
