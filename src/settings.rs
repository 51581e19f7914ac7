use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::config::MAX_BASE_COST;
use crate::credits::PricingTable;
use crate::error::{ServiceError, ServiceResult};
use crate::export::ReportConfig;
use crate::model::TestType;

/// Operator settings that survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentSettings {
    /// Defaults applied to every export before per-request options.
    #[serde(default)]
    pub report: ReportConfig,
    /// Base cost overrides keyed by test type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<BTreeMap<String, u32>>,
}

impl PersistentSettings {
    pub fn pricing_table(&self) -> PricingTable {
        match &self.pricing {
            Some(overrides) => PricingTable::with_overrides(overrides),
            None => PricingTable::default(),
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(overrides) = &self.pricing {
            for (key, cost) in overrides {
                key.parse::<TestType>().map_err(|_| {
                    ServiceError::Validation(format!("Unknown test type in pricing: {}", key))
                })?;
                if *cost > MAX_BASE_COST {
                    return Err(ServiceError::Validation(format!(
                        "Base cost for {} must be at most {}, got {}",
                        key, MAX_BASE_COST, cost
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn load_settings(path: &Path) -> PersistentSettings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings at {:?}: {}", path, e);
            PersistentSettings::default()
        }),
        Err(_) => PersistentSettings::default(),
    }
}

pub fn save_settings(path: &Path, settings: &PersistentSettings) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).map_err(|e| {
        warn!("Failed to save settings to {:?}: {}", path, e);
        anyhow::anyhow!("Failed to save settings: {}", e)
    })
}
