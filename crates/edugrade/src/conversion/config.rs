use serde::{Deserialize, Serialize};

use super::domain::SystemCode;

pub const DEFAULT_REFERENCE_SYSTEM: &str = "ZA";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Pivot scale every rule converts into or out of. Projections onto this
    /// system return the stored reference value unchanged.
    pub reference_system: SystemCode,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            reference_system: SystemCode::new(DEFAULT_REFERENCE_SYSTEM),
        }
    }
}
