//! Service configuration.
//!
//! Everything the bootstrap step needs is passed in explicitly; there is no
//! ambient or global configuration state.

use std::path::PathBuf;

/// Runtime configuration for a hookvault service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the persistent store. Created with restricted
    /// permissions on first open; only the privileged process and its group
    /// may read or write it.
    pub data_dir: PathBuf,
    /// Bundled hook definitions file (JSON array of definitions) shipped
    /// with the host package.
    pub definitions_path: PathBuf,
    /// Package name of the host; its uid is the "owner" identity for
    /// privileged operations.
    pub package_name: String,
    /// Concrete target class substituted for definitions that declare the
    /// dynamic-target placeholder. None leaves such definitions untouched.
    pub dynamic_target_class: Option<String>,
}

impl ServiceConfig {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        definitions_path: impl Into<PathBuf>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            definitions_path: definitions_path.into(),
            package_name: package_name.into(),
            dynamic_target_class: None,
        }
    }

    pub fn with_dynamic_target_class(mut self, class: impl Into<String>) -> Self {
        self.dynamic_target_class = Some(class.into());
        self
    }

    /// Full path of the store database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(StoreConfig::DB_FILE_NAME)
    }
}

/// Store-level constants.
pub struct StoreConfig;

impl StoreConfig {
    pub const DB_FILE_NAME: &'static str = "hookvault.db";
    /// Expected on-disk schema version; openings below this apply the
    /// one-shot schema upgrade.
    pub const SCHEMA_VERSION: i32 = 1;
    /// Owner + group only.
    #[cfg(unix)]
    pub const DATA_DIR_MODE: u32 = 0o770;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path() {
        let config = ServiceConfig::new("/var/lib/hookvault", "/opt/hooks.json", "org.hookvault");
        assert_eq!(
            config.db_path(),
            PathBuf::from("/var/lib/hookvault/hookvault.db")
        );
        assert!(config.dynamic_target_class.is_none());
    }
}
