//! Request DTOs for the worker control API
//!
//! Defines the structure of incoming control request bodies.

use serde::Deserialize;

use crate::notify::NotificationIntent;

/// Request body for POST /__worker/install
///
/// Both fields fall back to the configured generation name and manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallRequest {
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

impl InstallRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(generation) = &self.generation {
            if generation.trim().is_empty() {
                return Some("Generation name cannot be empty".to_string());
            }
        }
        if let Some(manifest) = &self.manifest {
            if let Some(bad) = manifest.iter().find(|p| !p.starts_with('/') || p.starts_with("//")) {
                return Some(format!("Manifest path '{}' must be an origin-relative path", bad));
            }
        }
        None
    }
}

/// Request body for POST /__worker/notifications/click
#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    /// Action identifier the user picked
    pub action: String,
    /// Notification the action belongs to
    pub intent: NotificationIntent,
}
