//! `LedgerConfig` (spec §0): every embedder-facing tunable, loadable from
//! TOML/JSON via `serde`, with defaults matching the spec.

use std::path::PathBuf;

use serde::Deserialize;

/// Constructed by hand or via `serde` from a config file; every field has a
/// default matching the protocol's stated defaults (spec §4.13 for the
/// maintenance fields, §4.5/§4.8 for sizing).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Root directory for the `sled` database.
    pub data_dir: PathBuf,
    /// Root directory for the BMEK file and any on-disk key material.
    pub key_dir: PathBuf,
    /// Root directory for off-chain (large payload) ciphertext files.
    pub off_chain_dir: PathBuf,
    /// Soft capacity used by the size monitor and the cleanup free-space guard.
    pub max_db_size_bytes: u64,
    pub maintenance_size_monitor_interval_secs: u64,
    pub maintenance_vacuum_interval_secs: u64,
    pub maintenance_vacuum_min_interval_secs: u64,
    pub maintenance_vacuum_timeout_secs: u64,
    pub maintenance_cleanup_interval_secs: u64,
    pub maintenance_cleanup_max_files: usize,
    pub maintenance_off_chain_compress_age_secs: u64,
    pub maintenance_min_free_space_bytes: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            key_dir: PathBuf::from("./keys"),
            off_chain_dir: PathBuf::from("./data/offchain"),
            max_db_size_bytes: 10 * 1024 * 1024 * 1024,
            maintenance_size_monitor_interval_secs: chainvault_core::MAINTENANCE_SIZE_MONITOR_INTERVAL_SECS,
            maintenance_vacuum_interval_secs: chainvault_core::MAINTENANCE_VACUUM_INTERVAL_SECS,
            maintenance_vacuum_min_interval_secs: chainvault_core::MAINTENANCE_VACUUM_MIN_INTERVAL_SECS,
            maintenance_vacuum_timeout_secs: chainvault_core::MAINTENANCE_VACUUM_TIMEOUT_SECS,
            maintenance_cleanup_interval_secs: chainvault_core::MAINTENANCE_CLEANUP_INTERVAL_SECS,
            maintenance_cleanup_max_files: chainvault_core::MAINTENANCE_CLEANUP_MAX_FILES,
            maintenance_off_chain_compress_age_secs: chainvault_core::OFF_CHAIN_COMPRESS_AGE_SECS as u64,
            maintenance_min_free_space_bytes: 512 * 1024 * 1024,
        }
    }
}

impl LedgerConfig {
    pub(crate) fn maintenance_config(&self) -> chainvault_maintenance::MaintenanceConfig {
        chainvault_maintenance::MaintenanceConfig {
            max_db_size_bytes: self.max_db_size_bytes,
            size_monitor_interval: std::time::Duration::from_secs(self.maintenance_size_monitor_interval_secs),
            vacuum_interval: std::time::Duration::from_secs(self.maintenance_vacuum_interval_secs),
            vacuum_min_interval: std::time::Duration::from_secs(self.maintenance_vacuum_min_interval_secs),
            vacuum_timeout: std::time::Duration::from_secs(self.maintenance_vacuum_timeout_secs),
            cleanup_interval: std::time::Duration::from_secs(self.maintenance_cleanup_interval_secs),
            cleanup_max_files: self.maintenance_cleanup_max_files,
            off_chain_compress_age: std::time::Duration::from_secs(self.maintenance_off_chain_compress_age_secs),
            min_free_space_bytes: self.maintenance_min_free_space_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = LedgerConfig::default();
        assert_eq!(config.maintenance_cleanup_max_files, chainvault_core::MAINTENANCE_CLEANUP_MAX_FILES);
    }

    #[test]
    fn deserializes_partial_toml_with_defaults() {
        let toml = "max_db_size_bytes = 1048576\n";
        let config: LedgerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_db_size_bytes, 1_048_576);
        assert_eq!(config.maintenance_cleanup_max_files, chainvault_core::MAINTENANCE_CLEANUP_MAX_FILES);
    }
}
