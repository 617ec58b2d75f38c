//! Engine configuration.
//!
//! Defaults come from the environment so binaries and tests can share one
//! constructor:
//!
//! | variable          | default           |
//! |-------------------|-------------------|
//! | `UPE_MODEL`       | `gpt-4o-mini`     |
//! | `UPE_CARTRIDGE`   | `cartridge@1.0.0` |
//! | `UPE_STORAGE_DIR` | `.upe/runs`       |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CARTRIDGE: &str = "cartridge@1.0.0";
pub const DEFAULT_STORAGE_DIR: &str = ".upe/runs";
pub const DEFAULT_ROLE: &str = "Domain Expert";
pub const DEFAULT_STYLE: &str = "Executive, terse, data-first";

/// Prompt-shaping and storage settings of an [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub model: String,
    pub cartridge_version: String,
    pub role: String,
    pub style: String,
    pub banlist: Vec<String>,
    /// Tool manifest text embedded in the prompt.
    pub tools: String,
    /// Root of the filesystem run store, used by binaries.
    pub storage_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            model: std::env::var("UPE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            cartridge_version: std::env::var("UPE_CARTRIDGE")
                .unwrap_or_else(|_| DEFAULT_CARTRIDGE.to_string()),
            role: DEFAULT_ROLE.to_string(),
            style: DEFAULT_STYLE.to_string(),
            banlist: vec!["emojis".to_string(), "hyperbole".to_string()],
            tools: "[]".to_string(),
            storage_dir: std::env::var("UPE_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR)),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_cartridge(mut self, cartridge_version: impl Into<String>) -> Self {
        self.cartridge_version = cartridge_version.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_banlist(mut self, banlist: Vec<String>) -> Self {
        self.banlist = banlist;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.storage_dir = dir.as_ref().to_path_buf();
        self
    }
}
