use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// AWS provider settings shared by every regional client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Region the service stack is deployed to. Source tables live here.
    pub region: String,
    /// Optional endpoint override, used for LocalStack style environments.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-operation timeout applied to every SDK call.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::EmptyField("provider.region".to_string()));
        }

        if self.timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "provider.timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
