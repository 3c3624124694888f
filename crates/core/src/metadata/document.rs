//! `maven-metadata.xml` model.
//!
//! Field order matches the element order Maven writes. Absent optional elements are omitted
//! on serialization, so an empty `versions` list or `versioning` block is never written.

use crate::constants::MAVEN_PLUGIN_PACKAGING;
use crate::metadata::version::{max_version, sort_versions, SnapshotBuild};
use crate::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "@modelVersion", default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,
    #[serde(default, skip_serializing_if = "Plugins::is_empty")]
    pub plugins: Plugins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Versions::is_empty")]
    pub versions: Versions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "SnapshotVersions::is_empty")]
    pub snapshot_versions: SnapshotVersions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(rename = "version", default)]
    pub version: Vec<String>,
}

impl Versions {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_copy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersions {
    #[serde(rename = "snapshotVersion", default)]
    pub snapshot_version: Vec<SnapshotVersion>,
}

impl SnapshotVersions {
    pub fn is_empty(&self) -> bool {
        self.snapshot_version.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugins {
    #[serde(rename = "plugin", default)]
    pub plugin: Vec<Plugin>,
}

impl Plugins {
    pub fn is_empty(&self) -> bool {
        self.plugin.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub prefix: String,
    pub artifact_id: String,
}

impl Plugin {
    /// Derives the goal prefix from the artifact id: `maven-foo-plugin` and `foo-maven-plugin`
    /// both yield `foo`.
    pub fn prefix_for(artifact_id: &str) -> String {
        let stripped = artifact_id
            .strip_prefix("maven-")
            .and_then(|s| s.strip_suffix("-plugin"))
            .or_else(|| artifact_id.strip_suffix("-maven-plugin"))
            .or_else(|| artifact_id.strip_suffix("-plugin"));
        stripped.unwrap_or(artifact_id).to_owned()
    }
}

impl Metadata {
    /// Parses a metadata document. `location` names the document in the error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MetadataCorrupt`] if the XML is not a metadata document.
    pub fn from_xml(xml: &str, repository: &str, location: &str) -> StorageResult<Self> {
        quick_xml::de::from_str(xml).map_err(|e| StorageError::MetadataCorrupt {
            repository: repository.to_owned(),
            path: location.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Serializes to an indented document with an XML declaration.
    pub fn to_xml(&self) -> StorageResult<String> {
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some("metadata"))
            .map_err(|e| StorageError::MetadataSerialization(e.to_string()))?;
        serializer.indent(' ', 2);
        self.serialize(serializer)
            .map_err(|e| StorageError::MetadataSerialization(e.to_string()))?;
        Ok(format!("{XML_DECLARATION}\n{body}\n"))
    }

    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .map(|v| v.versions.version.as_slice())
            .unwrap_or_default()
    }

    /// Sorts `versions` and points `latest`/`release` at their maxima.
    ///
    /// `latest`/`release` are cleared when no version qualifies, so they always name an
    /// element of `versions`.
    pub fn normalize_versions(&mut self) {
        let Some(versioning) = self.versioning.as_mut() else {
            return;
        };
        sort_versions(&mut versioning.versions.version);
        versioning.latest = max_version(&versioning.versions.version, false);
        versioning.release = max_version(&versioning.versions.version, true);
    }

    /// Merges `incoming` into `self`.
    ///
    /// Versions are unioned and re-sorted, snapshot entries are unioned by
    /// (classifier, extension, value), the newer `snapshot` block wins and plugins are unioned
    /// by artifact id with `incoming` taking precedence.
    pub fn merge(&mut self, incoming: &Metadata) {
        if self.group_id.is_none() {
            self.group_id.clone_from(&incoming.group_id);
        }
        if self.artifact_id.is_none() {
            self.artifact_id.clone_from(&incoming.artifact_id);
        }
        if self.version.is_none() {
            self.version.clone_from(&incoming.version);
        }
        if incoming.model_version.is_some() {
            self.model_version.clone_from(&incoming.model_version);
        }

        if let Some(theirs) = &incoming.versioning {
            let ours = self.versioning.get_or_insert_with(Versioning::default);
            ours.versions
                .version
                .extend(theirs.versions.version.iter().cloned());

            let newer = match (&ours.snapshot, &theirs.snapshot) {
                (Some(a), Some(b)) => snapshot_key(b) > snapshot_key(a),
                (None, Some(_)) => true,
                _ => false,
            };
            if newer {
                ours.snapshot.clone_from(&theirs.snapshot);
            }

            for entry in &theirs.snapshot_versions.snapshot_version {
                let known = ours.snapshot_versions.snapshot_version.iter().any(|e| {
                    e.classifier == entry.classifier
                        && e.extension == entry.extension
                        && e.value == entry.value
                });
                if !known {
                    ours.snapshot_versions.snapshot_version.push(entry.clone());
                }
            }
            sort_snapshot_versions(&mut ours.snapshot_versions.snapshot_version);
        }

        for plugin in &incoming.plugins.plugin {
            self.upsert_plugin(plugin.clone());
        }

        self.normalize_versions();
    }

    /// Adds or replaces the plugin entry with the same artifact id.
    pub fn upsert_plugin(&mut self, plugin: Plugin) {
        match self
            .plugins
            .plugin
            .iter_mut()
            .find(|p| p.artifact_id == plugin.artifact_id)
        {
            Some(existing) => *existing = plugin,
            None => self.plugins.plugin.push(plugin),
        }
        self.plugins
            .plugin
            .sort_by(|a, b| a.artifact_id.cmp(&b.artifact_id));
    }

    /// Drops the plugin entry of `artifact_id`. Returns whether one was present.
    pub fn remove_plugin(&mut self, artifact_id: &str) -> bool {
        let before = self.plugins.plugin.len();
        self.plugins.plugin.retain(|p| p.artifact_id != artifact_id);
        self.plugins.plugin.len() != before
    }

    pub fn set_last_updated(&mut self, timestamp: String) {
        if let Some(versioning) = self.versioning.as_mut() {
            versioning.last_updated = Some(timestamp);
        }
    }
}

fn snapshot_key(snapshot: &Snapshot) -> (Option<&str>, Option<u32>) {
    (snapshot.timestamp.as_deref(), snapshot.build_number)
}

/// Orders entries by the build embedded in `value`, then by update time, classifier and
/// extension.
pub fn sort_snapshot_versions(entries: &mut [SnapshotVersion]) {
    entries.sort_by(|a, b| {
        let build_a = SnapshotBuild::parse(&a.value).map(|b| b.build_number);
        let build_b = SnapshotBuild::parse(&b.value).map(|b| b.build_number);
        build_a
            .cmp(&build_b)
            .then_with(|| a.updated.cmp(&b.updated))
            .then_with(|| a.classifier.cmp(&b.classifier))
            .then_with(|| a.extension.cmp(&b.extension))
    });
}

/// The parts of a pom the metadata manager needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomSummary {
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub packaging: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl PomSummary {
    pub fn from_xml(xml: &str, repository: &str, location: &str) -> StorageResult<Self> {
        quick_xml::de::from_str(xml).map_err(|e| StorageError::MetadataCorrupt {
            repository: repository.to_owned(),
            path: location.to_owned(),
            reason: e.to_string(),
        })
    }

    pub fn is_plugin(&self) -> bool {
        self.packaging.as_deref() == Some(MAVEN_PLUGIN_PACKAGING)
    }
}
