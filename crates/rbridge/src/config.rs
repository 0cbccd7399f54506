//! Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codepage::CodePage;
use crate::error::Result;

/// Names and conventions shared with the script-side support package.
///
/// All fields have defaults, so a config file only needs to list the ones it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Separator between components of a qualified function name.
    pub qualifier: char,

    /// Script function that registers a foreign object in the runtime's
    /// object table before it is handed to script code.
    pub install_foreign_object: String,

    /// Expression evaluated to produce the function catalog.
    pub list_functions: String,

    /// Host command sent when a foreign handle is released.
    pub release_command: String,

    /// Command routed through the console channel instead of the call channel.
    pub console_history_command: String,

    /// S4 class used for cell ranges.
    pub range_class: String,

    /// Code page used to repair strings that are not valid UTF-8.
    pub legacy_code_page: CodePage,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            qualifier: '$',
            install_foreign_object: "BERT$install.com.pointer".to_string(),
            list_functions: "BERT$list.functions()".to_string(),
            release_command: "release-pointer".to_string(),
            console_history_command: "console-history".to_string(),
            range_class: "xlReference".to_string(),
            legacy_code_page: CodePage::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!("loaded bridge config from {}", path.display());
        Ok(config)
    }
}
