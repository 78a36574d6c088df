//! Descriptor, request list and remote settings.
//!
//! Descriptors and request lists are read from JSON or YAML, picked by file
//! extension. They are validated on load and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::{archive_file_name, ArchiveFormat};
use crate::error::{PacketError, PacketResult};

/// Glob pattern with an optional exclude glob tested against base names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

impl TargetSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exclude: None,
        }
    }

    pub fn excluding(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }
}

/// Bundle descriptor used by `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketConfig {
    pub name: String,
    #[serde(rename = "ver", alias = "version")]
    pub version: String,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// Dependents, each archived and published as its own pipeline.
    #[serde(default)]
    pub packets: Vec<PacketConfig>,
}

impl PacketConfig {
    pub fn load(path: &Path) -> PacketResult<Self> {
        let config: Self = load_document(path)?;
        config.validate()?;
        debug!(
            path = %path.display(),
            name = %config.name,
            version = %config.version,
            dependents = config.dependents().len(),
            "packet descriptor loaded"
        );
        Ok(config)
    }

    /// Check names, the root version and every target pattern.
    pub fn validate(&self) -> PacketResult<()> {
        if self.version.trim().is_empty() {
            return Err(PacketError::config(format!(
                "packet '{}' has no version",
                self.name
            )));
        }
        self.validate_tree()
    }

    fn validate_tree(&self) -> PacketResult<()> {
        if self.name.trim().is_empty() {
            return Err(PacketError::config("packet name must not be empty"));
        }
        if self.targets.iter().any(|t| t.path.trim().is_empty()) {
            return Err(PacketError::config(format!(
                "packet '{}' has an empty target path",
                self.name
            )));
        }
        self.packets.iter().try_for_each(Self::validate_tree)
    }

    /// Archive file name for this descriptor.
    pub fn archive_name(&self, format: ArchiveFormat) -> String {
        archive_file_name(&self.name, &self.version, format)
    }

    /// Every nested dependent, depth-first, excluding `self`.
    pub fn dependents(&self) -> Vec<&PacketConfig> {
        let mut out = Vec::new();
        for child in &self.packets {
            out.push(child);
            out.extend(child.dependents());
        }
        out
    }
}

/// One requested package: a name and an optional version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    pub name: String,
    /// Empty means any version.
    #[serde(rename = "ver", alias = "version", default)]
    pub constraint: String,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }
}

/// Request list used by `update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesConfig {
    #[serde(default)]
    pub packages: Vec<PackageRequest>,
}

impl PackagesConfig {
    pub fn load(path: &Path) -> PacketResult<Self> {
        let config: Self = load_document(path)?;
        config.validate()?;
        debug!(
            path = %path.display(),
            packages = config.packages.len(),
            "package requests loaded"
        );
        Ok(config)
    }

    /// Reject empty and repeated names.
    ///
    /// Constraints are left alone here: a bad one fails only its own pipeline.
    pub fn validate(&self) -> PacketResult<()> {
        let mut seen = HashSet::new();
        for request in &self.packages {
            let name = request.name.trim();
            if name.is_empty() {
                return Err(PacketError::config("package name must not be empty"));
            }
            if !seen.insert(name) {
                return Err(PacketError::config(format!(
                    "package '{name}' is requested more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Where the remote store lives and how to reach it.
///
/// Passed explicitly by the caller; the library never reads the environment.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// `file:///path`, `memory://` or `s3://bucket`.
    pub url: String,
    /// Directory inside the store holding the archives.
    #[serde(default)]
    pub dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("dir", &self.dir)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Read a JSON or YAML document, chosen by extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> PacketResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| PacketError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| {
            PacketError::config_with(format!("invalid YAML in {}", path.display()), e)
        })
    } else {
        serde_json::from_str(&content).map_err(|e| {
            PacketError::config_with(format!("invalid JSON in {}", path.display()), e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_packet_json() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "packet.json",
            r#"{
                "name": "app",
                "ver": "1.2.0",
                "targets": [{"path": "src/*.rs", "exclude": "*_test.rs"}],
                "packets": [
                    {"name": "lib", "ver": "0.3.0", "targets": [{"path": "lib/*"}],
                     "packets": [{"name": "core", "ver": "0.1.0"}]},
                    {"name": "docs", "ver": "1.0.0"}
                ]
            }"#,
        );

        let config = PacketConfig::load(&path).unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.version, "1.2.0");
        assert_eq!(config.targets[0].exclude.as_deref(), Some("*_test.rs"));
        assert_eq!(config.archive_name(ArchiveFormat::Zip), "app-1.2.0.zip");

        let names: Vec<_> = config.dependents().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "core", "docs"]);
    }

    #[test]
    fn test_load_packet_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "packet.yml",
            "name: app\nversion: 2.0.0\ntargets:\n  - path: \"*.txt\"\n",
        );
        let config = PacketConfig::load(&path).unwrap();
        assert_eq!(config.version, "2.0.0");
        assert!(config.packets.is_empty());
    }

    #[test]
    fn test_packet_validation() {
        let dir = TempDir::new().unwrap();
        let empty_target = write(
            &dir,
            "a.json",
            r#"{"name": "app", "ver": "1.0.0", "targets": [{"path": ""}]}"#,
        );
        assert!(PacketConfig::load(&empty_target).unwrap_err().is_config());

        let nameless_child = write(
            &dir,
            "b.json",
            r#"{"name": "app", "ver": "1.0.0", "packets": [{"name": " ", "ver": "1.0.0"}]}"#,
        );
        assert!(PacketConfig::load(&nameless_child).unwrap_err().is_config());
    }

    #[test]
    fn test_load_packages_with_optional_constraint() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "packages.yaml",
            "packages:\n  - name: app\n    ver: \">= 1.2.0\"\n  - name: lib\n",
        );
        let config = PackagesConfig::load(&path).unwrap();
        assert_eq!(
            config.packages,
            vec![
                PackageRequest::new("app", ">= 1.2.0"),
                PackageRequest::new("lib", ""),
            ]
        );
    }

    #[test]
    fn test_packages_keep_bad_constraint_for_resolution() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "packages.json",
            r#"{"packages": [{"name": "good", "ver": "^1"}, {"name": "bad", "ver": "not a range"}]}"#,
        );
        let config = PackagesConfig::load(&path).unwrap();
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.packages[1].constraint, "not a range");
    }

    #[test]
    fn test_packages_reject_duplicate_names() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "packages.yaml",
            "packages:\n  - name: app\n    ver: \"^1\"\n  - name: app\n    ver: \"^2\"\n",
        );
        let err = PackagesConfig::load(&path).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("app"));
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "packet.json", "{ not json");
        assert!(PacketConfig::load(&path).unwrap_err().is_config());
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = PacketConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PacketError::Io { .. }));
    }

    #[test]
    fn test_remote_debug_redacts_secret() {
        let remote = RemoteConfig::new("s3://bucket", "packets")
            .with_region("eu-west-1")
            .with_credentials("AKIA123", "hunter2");
        let rendered = format!("{remote:?}");
        assert!(rendered.contains("AKIA123"));
        assert!(!rendered.contains("hunter2"));
    }
}
