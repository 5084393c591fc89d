//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Listener and capacity settings.
    pub server: ServerSettings,
    /// Login policy settings.
    pub login: LoginSettings,
    /// Anti-abuse escalation settings.
    pub abuse: AbuseSettings,
    /// Per-feature client permission toggles.
    pub features: FeatureToggles,
    /// Debug/development settings.
    pub debug: DebugSettings,
}

/// Listener and capacity settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the game listener binds to.
    pub bind_address: String,
    /// Game port.
    pub port: u16,
    /// Player cap; logins past it join the waiting list.
    pub max_players: u32,
    /// Think-tick cadence in milliseconds.
    pub think_interval_ms: u64,
    /// Connection attempts allowed per address within the attempt window.
    pub attempt_limit: u32,
    /// Attempt window in milliseconds.
    pub attempt_window_ms: u64,
    /// How long an address stays throttled after exceeding the limit.
    pub throttle_ms: u64,
}

/// Login policy settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoginSettings {
    /// Logging into an already-online character kicks the old session and
    /// takes its place; with this off the new login is rejected instead.
    pub replace_on_login: bool,
    /// Oldest accepted client protocol version.
    pub version_min: u16,
    /// Newest accepted client protocol version.
    pub version_max: u16,
    /// Version range as shown in the rejection message.
    pub version_text: String,
    /// Route namelocked characters into the account-manager flow instead of
    /// refusing them.
    pub namelock_manager: bool,
    /// Accept logins with an empty account name into the account-manager
    /// flow instead of refusing them.
    pub account_manager: bool,
    /// At most one character of an account may be online at a time.
    pub one_character_per_account: bool,
    /// Cap on the retry time quoted to queued logins, in seconds.
    pub waitlist_retry_cap_secs: u32,
}

/// Anti-abuse escalation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AbuseSettings {
    /// Escalate unknown opcodes into warnings and bans. With this off they
    /// are only logged.
    pub escalate_unknown_opcodes: bool,
    /// Warning count at which the banishment becomes final.
    pub warnings_to_final_ban: u32,
    /// Warning count at which the account is deleted.
    pub warnings_to_deletion: u32,
    /// Temporary banishment length in seconds.
    pub ban_duration_secs: u64,
    /// Final banishment length in seconds.
    pub final_ban_duration_secs: u64,
    /// Near-ceiling frames tolerated before the session is dropped.
    pub max_oversized_frames: u32,
}

/// Per-feature client permission toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureToggles {
    /// Players may switch outfits.
    pub allow_outfit_change: bool,
    /// Players may recolour outfit parts.
    pub allow_color_change: bool,
    /// Players may toggle outfit addons.
    pub allow_addon_change: bool,
    /// Players may select mounts.
    pub allow_mounts: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7171,
            max_players: 900,
            think_interval_ms: 1000,
            attempt_limit: 10,
            attempt_window_ms: 1000,
            throttle_ms: 10_000,
        }
    }
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            replace_on_login: true,
            version_min: 860,
            version_max: 860,
            version_text: "8.60".to_string(),
            namelock_manager: true,
            account_manager: true,
            one_character_per_account: true,
            waitlist_retry_cap_secs: 120,
        }
    }
}

impl Default for AbuseSettings {
    fn default() -> Self {
        Self {
            escalate_unknown_opcodes: true,
            warnings_to_final_ban: 4,
            warnings_to_deletion: 5,
            ban_duration_secs: 7 * 24 * 60 * 60,
            final_ban_duration_secs: 30 * 24 * 60 * 60,
            max_oversized_frames: 10,
        }
    }
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            allow_outfit_change: true,
            allow_color_change: true,
            allow_addon_change: true,
            allow_mounts: true,
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("port: 7171"));
        assert!(ron_str.contains("max_players: 900"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        // Config missing the `abuse` section entirely
        let ron_str = "(server: (), login: (), features: (), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.abuse, AbuseSettings::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        // RON with #[serde(default)] and deny_unknown_fields not set should accept this
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.port = 7175;
        config.server.max_players = 50;
        config.login.replace_on_login = false;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.server.max_players = 1200;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().server.max_players, 1200);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_ron_comments_accepted() {
        let ron_str = "// This is a comment\n(\n  // Another comment\n)";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config, Config::default());
    }
}
