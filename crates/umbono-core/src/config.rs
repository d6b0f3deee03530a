//! Configuration for the classification engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration: where the artifact lives and where it comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Directory holding the downloaded artifact
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// File name of the serialized model inside `artifact_dir`
    #[serde(default = "default_artifact_filename")]
    pub artifact_filename: String,

    /// Remote URL the artifact is downloaded from when missing locally
    #[serde(default = "default_artifact_url")]
    pub artifact_url: String,

    /// Timeout for remote fetches (artifact download and classify-by-url)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            artifact_filename: default_artifact_filename(),
            artifact_url: default_artifact_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl ClassifierConfig {
    /// Full path of the local artifact file
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.artifact_filename)
    }
}

fn default_artifact_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("UMBONO_DATA_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("umbono")
}

fn default_artifact_filename() -> String {
    std::env::var("UMBONO_ARTIFACT_FILE").unwrap_or_else(|_| "export.safetensors".to_string())
}

fn default_artifact_url() -> String {
    std::env::var("UMBONO_ARTIFACT_URL")
        .unwrap_or_else(|_| "https://models.umbono.dev/export.safetensors".to_string())
}

fn default_fetch_timeout_secs() -> u64 {
    std::env::var("UMBONO_FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
