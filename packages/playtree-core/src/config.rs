#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Knobs of the playlist mutation service.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Renumber the remaining entries after a removal.
    pub rebalance_on_remove: bool,
    /// Take a per-playlist lock before loading a playlist for mutation.
    pub lock_playlists: bool,
    /// Upper bound on the rows of one playlist, nested contents included.
    pub max_playlist_items: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rebalance_on_remove: true,
            lock_playlists: true,
            max_playlist_items: None,
        }
    }
}

#[cfg(feature = "serde")]
impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::InvalidOperation(format!("invalid engine config: {e}")))
    }
}

/// Load the engine config from a YAML file, falling back to defaults when the file is missing
/// or unreadable.
#[cfg(feature = "serde")]
pub fn load_config(path: &std::path::Path) -> EngineConfig {
    if !path.exists() {
        tracing::info!(?path, "engine config not found, using defaults");
        return EngineConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match EngineConfig::from_yaml_str(&contents) {
            Ok(config) => {
                tracing::info!(?path, ?config, "loaded engine config");
                config
            }
            Err(e) => {
                tracing::warn!(?path, error = %e, "failed to parse engine config, using defaults");
                EngineConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to read engine config, using defaults");
            EngineConfig::default()
        }
    }
}
