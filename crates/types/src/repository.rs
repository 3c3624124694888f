//! Repository descriptor.

use crate::{RepositoryId, StorageId, TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which kinds of versions a repository accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPolicy {
    Release,
    Snapshot,
    Mixed,
}

impl RepositoryPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Snapshot => "snapshot",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for RepositoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryPolicy {
    type Err = TypesError;

    /// Parses a policy name case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::UnknownPolicy`] for anything other than release, snapshot or mixed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "snapshot" => Ok(Self::Snapshot),
            "mixed" => Ok(Self::Mixed),
            _ => Err(TypesError::UnknownPolicy(s.to_owned())),
        }
    }
}

/// How a repository obtains its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Hosted,
    Proxy,
    Group,
}

impl RepositoryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Proxy => "proxy",
            Self::Group => "group",
        }
    }
}

impl FromStr for RepositoryType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "proxy" => Ok(Self::Proxy),
            "group" => Ok(Self::Group),
            _ => Err(TypesError::UnknownRepositoryType(s.to_owned())),
        }
    }
}

/// A named, policy-governed storage root holding artifacts of one layout.
///
/// Built at configuration time and then shared read-only. `basedir` is the single physical
/// root of the repository; the storage core never changes any field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    storage_id: StorageId,
    id: RepositoryId,
    basedir: PathBuf,
    layout: String,
    policy: RepositoryPolicy,
    repository_type: RepositoryType,
    trash_enabled: bool,
    allows_force_deletion: bool,
    allows_redeployment: bool,
    allows_deletion: bool,
}

impl Repository {
    /// Creates a hosted release repository with trash disabled, deletion allowed, and
    /// redeployment and force deletion forbidden.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidIdentifier`] if `layout` is empty.
    pub fn new(
        storage_id: StorageId,
        id: RepositoryId,
        basedir: impl Into<PathBuf>,
        layout: impl Into<String>,
    ) -> TypesResult<Self> {
        let layout = layout.into();
        if layout.trim().is_empty() {
            return Err(TypesError::InvalidIdentifier(
                "repository layout cannot be empty".into(),
            ));
        }

        Ok(Self {
            storage_id,
            id,
            basedir: basedir.into(),
            layout,
            policy: RepositoryPolicy::Release,
            repository_type: RepositoryType::Hosted,
            trash_enabled: false,
            allows_force_deletion: false,
            allows_redeployment: false,
            allows_deletion: true,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RepositoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_type(mut self, repository_type: RepositoryType) -> Self {
        self.repository_type = repository_type;
        self
    }

    #[must_use]
    pub fn with_trash(mut self, enabled: bool) -> Self {
        self.trash_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_force_deletion(mut self, allowed: bool) -> Self {
        self.allows_force_deletion = allowed;
        self
    }

    #[must_use]
    pub fn with_redeployment(mut self, allowed: bool) -> Self {
        self.allows_redeployment = allowed;
        self
    }

    #[must_use]
    pub fn with_deletion(mut self, allowed: bool) -> Self {
        self.allows_deletion = allowed;
        self
    }

    pub fn storage_id(&self) -> &StorageId {
        &self.storage_id
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Layout alias used to look up the layout provider.
    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn policy(&self) -> RepositoryPolicy {
        self.policy
    }

    pub fn repository_type(&self) -> RepositoryType {
        self.repository_type
    }

    pub fn trash_enabled(&self) -> bool {
        self.trash_enabled
    }

    pub fn allows_force_deletion(&self) -> bool {
        self.allows_force_deletion
    }

    pub fn allows_redeployment(&self) -> bool {
        self.allows_redeployment
    }

    pub fn allows_deletion(&self) -> bool {
        self.allows_deletion
    }

    /// `storage:repository`, the form used in logs and error messages.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.storage_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> Repository {
        Repository::new(
            StorageId::new("storage0").unwrap(),
            RepositoryId::new("releases").unwrap(),
            "/srv/depot/storage0/releases",
            "Maven 2",
        )
        .unwrap()
    }

    #[test]
    fn test_new_repository_defaults() {
        let repo = repository();
        assert_eq!(repo.policy(), RepositoryPolicy::Release);
        assert_eq!(repo.repository_type(), RepositoryType::Hosted);
        assert!(!repo.trash_enabled());
        assert!(!repo.allows_redeployment());
        assert!(!repo.allows_force_deletion());
        assert!(repo.allows_deletion());
        assert_eq!(repo.qualified_id(), "storage0:releases");
    }

    #[test]
    fn test_builder_sets_flags() {
        let repo = repository()
            .with_policy(RepositoryPolicy::Snapshot)
            .with_trash(true)
            .with_redeployment(true);
        assert_eq!(repo.policy(), RepositoryPolicy::Snapshot);
        assert!(repo.trash_enabled());
        assert!(repo.allows_redeployment());
    }

    #[test]
    fn test_empty_layout_rejected() {
        let result = Repository::new(
            StorageId::new("storage0").unwrap(),
            RepositoryId::new("releases").unwrap(),
            "/tmp",
            "  ",
        );
        assert!(matches!(result, Err(TypesError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "Snapshot".parse::<RepositoryPolicy>().unwrap(),
            RepositoryPolicy::Snapshot
        );
        assert_eq!(
            " mixed ".parse::<RepositoryPolicy>().unwrap(),
            RepositoryPolicy::Mixed
        );
        assert!(matches!(
            "nightly".parse::<RepositoryPolicy>(),
            Err(TypesError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn test_repository_type_parsing() {
        assert_eq!(
            "PROXY".parse::<RepositoryType>().unwrap(),
            RepositoryType::Proxy
        );
        assert!("mirror".parse::<RepositoryType>().is_err());
    }

    #[test]
    fn test_repository_serializes_policy_lowercase() {
        let json = serde_json::to_string(&repository()).unwrap();
        assert!(json.contains("\"policy\":\"release\""));
        assert!(json.contains("\"repository_type\":\"hosted\""));
    }
}
