//! Process configuration, deserialized from TOML files.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DfsError, DfsResult};
use crate::naming::{REGISTRATION_PORT, SERVICE_PORT};
use crate::tree::DEFAULT_REPLICATION_THRESHOLD;

fn unspecified() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Settings of the naming server process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Address both listeners bind to.
    pub host: IpAddr,
    /// Port of the client-facing service interface.
    pub service_port: u16,
    /// Port of the storage-server-facing registration interface.
    pub registration_port: u16,
    /// Shared acquisitions of a single-replica file before it fans out.
    pub replication_threshold: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            host: unspecified(),
            service_port: SERVICE_PORT,
            registration_port: REGISTRATION_PORT,
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
        }
    }
}

/// Settings of a storage server process.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory served by this storage server; `/a/b` maps to `root/a/b`.
    pub root: PathBuf,
    /// Registration endpoint of the naming server.
    pub naming: SocketAddr,
    /// Address both listeners bind to.
    #[serde(default = "unspecified")]
    pub host: IpAddr,
    /// Port of the client file-I/O interface; 0 for a system-chosen port.
    #[serde(default)]
    pub storage_port: u16,
    /// Port of the command interface; 0 for a system-chosen port.
    #[serde(default)]
    pub command_port: u16,
}

impl StorageConfig {
    pub fn new(root: PathBuf, naming: SocketAddr) -> Self {
        Self { root, naming, host: unspecified(), storage_port: 0, command_port: 0 }
    }
}

/// Loads naming server settings from a TOML file.
pub fn load_naming(path: &Path) -> DfsResult<NamingConfig> {
    parse(&read(path)?, path)
}

/// Loads storage server settings from a TOML file.
pub fn load_storage(path: &Path) -> DfsResult<StorageConfig> {
    parse(&read(path)?, path)
}

fn read(path: &Path) -> DfsResult<String> {
    std::fs::read_to_string(path)
        .map_err(|err| DfsError::invalid(format!("read {}: {err}", path.display())))
}

fn parse<T: serde::de::DeserializeOwned>(text: &str, path: &Path) -> DfsResult<T> {
    toml::from_str(text).map_err(|err| DfsError::invalid(format!("parse {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_defaults_use_well_known_ports() {
        let config: NamingConfig = toml::from_str("").unwrap();
        assert_eq!(config.service_port, SERVICE_PORT);
        assert_eq!(config.registration_port, REGISTRATION_PORT);
        assert_eq!(config.replication_threshold, DEFAULT_REPLICATION_THRESHOLD);
    }

    #[test]
    fn naming_settings_override_defaults() {
        let config: NamingConfig = toml::from_str(
            r#"
            host = "127.0.0.1"
            service_port = 7200
            replication_threshold = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.service_port, 7200);
        assert_eq!(config.registration_port, REGISTRATION_PORT);
        assert_eq!(config.replication_threshold, 2);
    }

    #[test]
    fn storage_settings_require_root_and_naming() {
        let config: StorageConfig = toml::from_str(
            r#"
            root = "/srv/files"
            naming = "10.0.0.1:6001"
            "#,
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/files"));
        assert_eq!(config.naming, "10.0.0.1:6001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.storage_port, 0);

        assert!(toml::from_str::<StorageConfig>("root = \"/srv/files\"").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<NamingConfig>("serivce_port = 7200").is_err());
    }
}
