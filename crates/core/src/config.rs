//! Core runtime configuration.
//!
//! Resolved once at process startup and passed into the filesystem and managers. Nothing in the
//! core reads environment variables while serving a request.

use crate::constants::{DEFAULT_LOCK_PRUNE_THRESHOLD, TEMP_DIR_NAME, TRASH_DIR_NAME};
use crate::{StorageError, StorageResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    lock_prune_threshold: usize,
    trash_dir_name: String,
    temp_dir_name: String,
    verify_checksums_on_store: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Arguments
    ///
    /// * `lock_prune_threshold` - Path lock entries kept before dead entries are pruned
    /// * `trash_dir_name` - Directory below each basedir that holds trashed files
    /// * `temp_dir_name` - Directory below each basedir that stages in-flight writes
    /// * `verify_checksums_on_store` - Whether checksums supplied with a deploy are enforced
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if:
    /// - the prune threshold is zero
    /// - a directory name is empty, `.`/`..`, or contains a path separator
    /// - the trash and temp directories share a name
    pub fn new(
        lock_prune_threshold: usize,
        trash_dir_name: impl Into<String>,
        temp_dir_name: impl Into<String>,
        verify_checksums_on_store: bool,
    ) -> StorageResult<Self> {
        let trash_dir_name = trash_dir_name.into();
        let temp_dir_name = temp_dir_name.into();

        if lock_prune_threshold == 0 {
            return Err(StorageError::InvalidConfig(
                "lock_prune_threshold must be greater than zero".into(),
            ));
        }
        validate_dir_name("trash_dir_name", &trash_dir_name)?;
        validate_dir_name("temp_dir_name", &temp_dir_name)?;
        if trash_dir_name == temp_dir_name {
            return Err(StorageError::InvalidConfig(
                "trash_dir_name and temp_dir_name must differ".into(),
            ));
        }

        Ok(Self {
            lock_prune_threshold,
            trash_dir_name,
            temp_dir_name,
            verify_checksums_on_store,
        })
    }

    pub fn lock_prune_threshold(&self) -> usize {
        self.lock_prune_threshold
    }

    pub fn trash_dir_name(&self) -> &str {
        &self.trash_dir_name
    }

    pub fn temp_dir_name(&self) -> &str {
        &self.temp_dir_name
    }

    pub fn verify_checksums_on_store(&self) -> bool {
        self.verify_checksums_on_store
    }

    /// Top-level directory names that never hold repository content.
    pub fn reserved_dir_names(&self) -> [&str; 2] {
        [self.trash_dir_name.as_str(), self.temp_dir_name.as_str()]
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_dir_names().contains(&name)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lock_prune_threshold: DEFAULT_LOCK_PRUNE_THRESHOLD,
            trash_dir_name: TRASH_DIR_NAME.to_owned(),
            temp_dir_name: TEMP_DIR_NAME.to_owned(),
            verify_checksums_on_store: true,
        }
    }
}

fn validate_dir_name(field: &str, name: &str) -> StorageResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidConfig(format!("{field} cannot be empty")));
    }
    if trimmed != name || trimmed == "." || trimmed == ".." || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidConfig(format!(
            "{field} must be a single directory name, got '{name}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.trash_dir_name(), ".trash");
        assert_eq!(config.temp_dir_name(), ".temp");
        assert!(config.is_reserved(".trash"));
        assert!(!config.is_reserved("com"));
        assert!(config.verify_checksums_on_store());
    }

    #[test]
    fn test_new_rejects_invalid_values() {
        assert!(CoreConfig::new(0, ".trash", ".temp", true).is_err());
        assert!(CoreConfig::new(16, "", ".temp", true).is_err());
        assert!(CoreConfig::new(16, "a/b", ".temp", true).is_err());
        assert!(CoreConfig::new(16, "..", ".temp", true).is_err());
        assert!(CoreConfig::new(16, ".same", ".same", true).is_err());
        assert!(CoreConfig::new(16, ".bin", ".staging", false).is_ok());
    }
}
