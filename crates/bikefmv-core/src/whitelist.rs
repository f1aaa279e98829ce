use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistModel {
    pub model: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistBrand {
    pub brand: String,
    pub models: Vec<WhitelistModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistFile {
    pub brands: Vec<WhitelistBrand>,
}

/// One flattened `(brand, model, category)` row, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub brand: String,
    pub model: String,
    pub category: Option<String>,
}

impl WhitelistFile {
    /// Flattens the brand → models tree, preserving file order.
    #[must_use]
    pub fn entries(&self) -> Vec<WhitelistEntry> {
        self.brands
            .iter()
            .flat_map(|b| {
                b.models.iter().map(|m| WhitelistEntry {
                    brand: b.brand.trim().to_string(),
                    model: m.model.trim().to_string(),
                    category: m.category.clone(),
                })
            })
            .collect()
    }
}

/// Load and validate the model whitelist from a JSON file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_whitelist(path: &Path) -> Result<WhitelistFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::WhitelistIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_whitelist(&content)
}

/// Parse and validate a whitelist from its JSON text.
///
/// # Errors
///
/// Returns `ConfigError` if the JSON is malformed or fails validation.
pub fn parse_whitelist(content: &str) -> Result<WhitelistFile, ConfigError> {
    let whitelist: WhitelistFile =
        serde_json::from_str(content).map_err(ConfigError::WhitelistParse)?;
    validate_whitelist(&whitelist)?;
    Ok(whitelist)
}

fn validate_whitelist(whitelist: &WhitelistFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for brand in &whitelist.brands {
        if brand.brand.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }

        for model in &brand.models {
            if model.model.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "brand '{}' has a model with an empty name",
                    brand.brand
                )));
            }

            let key = (
                brand.brand.trim().to_lowercase(),
                model.model.trim().to_lowercase(),
            );
            if !seen.insert(key) {
                return Err(ConfigError::Validation(format!(
                    "duplicate whitelist entry: '{} {}'",
                    brand.brand, model.model
                )));
            }
        }
    }

    Ok(())
}
