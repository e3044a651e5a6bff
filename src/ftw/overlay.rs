//! go-ftw configuration overlay
//!
//! Loads the base go-ftw configuration, injects the resolved endpoint under
//! `testoverride.input` and writes the result to a fresh temporary file.
//! The document is handled as untyped YAML so keys this runner does not know
//! about pass through untouched.

use serde_yaml::{Mapping, Number, Value};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration errors, each carrying the offending path
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied reading config file: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid YAML in config file {}: {message}", path.display())]
    ParseError { path: PathBuf, message: String },

    #[error("Failed to write config file {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize config to YAML: {message}")]
    SerializeFailed { message: String },
}

/// A go-ftw configuration document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestConfig {
    root: Mapping,
}

impl TestConfig {
    fn input_mut(&mut self) -> &mut Mapping {
        let overrides = child_mapping(&mut self.root, "testoverride");
        child_mapping(overrides, "input")
    }
}

#[cfg(test)]
impl TestConfig {
    pub fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Look up a nested value by key path
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.root.get(*first)?;
        for key in rest {
            value = value.as_mapping()?.get(*key)?;
        }
        Some(value)
    }
}

/// Get `parent[key]` as a mapping, creating or replacing it as needed
fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> &'a mut Mapping {
    let slot = parent.entry(Value::from(key)).or_insert(Value::Null);
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(mapping) => mapping,
        _ => unreachable!("slot was just replaced with a mapping"),
    }
}

/// Load a configuration file
///
/// An empty document loads as an empty configuration.
pub fn load(path: impl AsRef<Path>) -> Result<TestConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let document: Value =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match document {
        Value::Null => Ok(TestConfig::default()),
        Value::Mapping(root) => Ok(TestConfig { root }),
        _ => Err(ConfigError::ParseError {
            path: path.to_path_buf(),
            message: "top-level value must be a mapping".to_string(),
        }),
    }
}

/// Point the configuration at `host:port`
///
/// Only `testoverride.input.dest_addr` and `testoverride.input.port` change.
/// Missing or non-mapping `testoverride`/`input` entries are replaced with
/// mappings.
pub fn overlay(mut config: TestConfig, host: &str, port: u16) -> TestConfig {
    let input = config.input_mut();
    input.insert(Value::from("dest_addr"), Value::from(host));
    input.insert(Value::from("port"), Value::Number(Number::from(port)));
    config
}

/// Send every test with the given Host header
pub fn with_virtual_host(mut config: TestConfig, hostname: &str) -> TestConfig {
    let input = config.input_mut();
    input.insert(Value::from("virtual_host_mode"), Value::Bool(true));
    child_mapping(input, "headers").insert(Value::from("Host"), Value::from(hostname));
    config
}

/// Write the configuration to a new temporary file and return its path
///
/// The file outlives this call; removing it is up to the caller.
pub fn persist(config: &TestConfig) -> Result<PathBuf, ConfigError> {
    let content = serde_yaml::to_string(&config.root).map_err(|e| ConfigError::SerializeFailed {
        message: e.to_string(),
    })?;

    let write_failed = |source: io::Error| ConfigError::WriteFailed {
        path: std::env::temp_dir(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix("ftw_config_")
        .suffix(".yaml")
        .tempfile()
        .map_err(write_failed)?;

    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|source| ConfigError::WriteFailed {
            path: file.path().to_path_buf(),
            source,
        })?;

    let (_, path) = file.keep().map_err(|e| write_failed(e.error))?;
    debug!("Wrote derived config to {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn yaml(text: &str) -> TestConfig {
        match serde_yaml::from_str(text).unwrap() {
            Value::Mapping(root) => TestConfig::from_mapping(root),
            other => panic!("Expected mapping, got {other:?}"),
        }
    }

    #[test]
    fn test_overlay_creates_nested_structure() {
        let result = overlay(yaml("a: 1"), "127.0.0.1", 9999);

        assert_eq!(
            result,
            yaml("a: 1\ntestoverride:\n  input:\n    dest_addr: 127.0.0.1\n    port: 9999\n")
        );
    }

    #[test]
    fn test_overlay_preserves_unrelated_keys() {
        let base = yaml(
            r#"
logfile: /var/log/modsec.log
logmarkerheadername: X-CRS-Test
testoverride:
  ignore:
    "920100-4": "known issue"
  input:
    protocol: http
    dest_addr: old.example.com
    port: 1
  mode: cloud
"#,
        );

        let result = overlay(base, "10.0.0.5", 8080);

        assert_eq!(
            result.get(&["logmarkerheadername"]),
            Some(&Value::from("X-CRS-Test"))
        );
        assert_eq!(
            result.get(&["testoverride", "ignore", "920100-4"]),
            Some(&Value::from("known issue"))
        );
        assert_eq!(
            result.get(&["testoverride", "mode"]),
            Some(&Value::from("cloud"))
        );
        assert_eq!(
            result.get(&["testoverride", "input", "protocol"]),
            Some(&Value::from("http"))
        );
        assert_eq!(
            result.get(&["testoverride", "input", "dest_addr"]),
            Some(&Value::from("10.0.0.5"))
        );
        assert_eq!(
            result.get(&["testoverride", "input", "port"]),
            Some(&Value::Number(Number::from(8080u16)))
        );
    }

    #[test]
    fn test_overlay_replaces_null_sections() {
        let result = overlay(yaml("testoverride:\n"), "127.0.0.1", 80);
        assert_eq!(
            result.get(&["testoverride", "input", "dest_addr"]),
            Some(&Value::from("127.0.0.1"))
        );

        let result = overlay(yaml("testoverride:\n  input: ~\n"), "127.0.0.1", 80);
        assert!(result.get(&["testoverride", "input", "port"]).is_some());
    }

    #[test]
    fn test_virtual_host() {
        let result = with_virtual_host(overlay(yaml("a: 1"), "127.0.0.1", 80), "waf.example.com");

        assert_eq!(
            result.get(&["testoverride", "input", "virtual_host_mode"]),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            result.get(&["testoverride", "input", "headers", "Host"]),
            Some(&Value::from("waf.example.com"))
        );
        assert_eq!(result.get(&["a"]), Some(&Value::Number(Number::from(1))));
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ftw.yaml");
        std::fs::write(&path, "").unwrap();

        assert_eq!(load(&path).unwrap(), TestConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        match load(&path) {
            Err(ConfigError::NotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ftw.yaml");
        std::fs::write(&path, "testoverride: [unclosed\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("ftw.yaml"));
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ftw.yaml");
        std::fs::write(&path, "- a\n- b\n").unwrap();

        assert!(matches!(load(&path), Err(ConfigError::ParseError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("ftw.yaml");
        std::fs::write(&path, "a: 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes
        if std::fs::read(&path).is_ok() {
            return;
        }
        assert!(matches!(
            load(&path),
            Err(ConfigError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("ftw.yaml");
        std::fs::write(
            &base_path,
            "logfile: /tmp/a.log\ntestoverride:\n  ignore:\n    '942100-1': flaky\n",
        )
        .unwrap();

        let overlaid = overlay(load(&base_path).unwrap(), "127.0.0.1", 41234);
        let persisted = persist(&overlaid).unwrap();

        let name = persisted.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ftw_config_") && name.ends_with(".yaml"));

        let reloaded = load(&persisted).unwrap();
        std::fs::remove_file(&persisted).unwrap();

        assert_eq!(reloaded, overlaid);
    }
}
