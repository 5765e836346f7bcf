use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ForumConfig {
    pub api_port: u16,
    pub paths: ForumPaths,
    pub file: FileConfig,
}

impl ForumConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("ACADEMIQ_BASE_DIR") {
            Ok(raw) if !raw.trim().is_empty() => ForumPaths::from_base_dir(raw.trim())?,
            _ => ForumPaths::discover()?,
        };
        let api_port = env::var("ACADEMIQ_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let file = FileConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            file,
        })
    }

    pub fn new(api_port: u16, paths: ForumPaths) -> Self {
        Self {
            api_port,
            paths,
            file: FileConfig::default(),
        }
    }

    pub fn with_file(api_port: u16, paths: ForumPaths, file: FileConfig) -> Self {
        Self {
            api_port,
            paths,
            file,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Per-file cap for uploaded materials. The request body limit is derived
    /// from it.
    pub max_upload_bytes: u64,
    /// Prefix for material URLs handed back to clients. Empty means
    /// server-relative URLs (`/materials/<name>`).
    pub public_base_url: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            public_base_url: String::new(),
        }
    }
}

impl FileConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("ACADEMIQ_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let public_base_url = env::var("ACADEMIQ_PUBLIC_URL")
            .ok()
            .map(|raw| raw.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Self {
            max_upload_bytes,
            public_base_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ForumPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub materials_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ForumPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("academiq.db");
        let files_dir = base.join("files");
        let materials_dir = files_dir.join("materials");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            files_dir,
            materials_dir,
            logs_dir,
        })
    }
}
