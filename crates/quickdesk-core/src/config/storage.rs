use serde::{Deserialize, Serialize};

/// Attachment storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for attachment storage.
    #[serde(default = "default_root")]
    pub root: String,

    /// Bucket name, the directory under `root` objects are written to.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Base URL the `/storage` route is reachable at.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Upper bound for a single upload, in megabytes. The admin setting may
    /// lower it further but never raise it.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            bucket: default_bucket(),
            public_base_url: default_public_base_url(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl StorageConfig {
    /// Hard upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn default_root() -> String {
    "./data/storage".to_string()
}

fn default_bucket() -> String {
    "attachments".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/storage".to_string()
}

fn default_max_file_size_mb() -> u64 {
    100
}
