//! Login and anti-abuse policy, snapshotted from configuration.
//!
//! The engine and the connection layer both work from this plain copy so a
//! config reload never changes policy under a live session mid-decision.

use eldermoor_config::Config;

/// Which parts of an outfit-change request are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutfitPolicy {
    pub allow_change: bool,
    pub allow_colors: bool,
    pub allow_addons: bool,
    pub allow_mounts: bool,
}

/// Everything the session layer needs to know from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPolicy {
    pub replace_on_login: bool,
    pub version_min: u16,
    pub version_max: u16,
    /// Version range as quoted in the rejection message.
    pub version_text: String,
    pub namelock_manager: bool,
    pub account_manager: bool,
    pub one_character_per_account: bool,
    pub waitlist_retry_cap_secs: u32,
    pub max_players: u32,
    pub think_interval_ms: u64,
    pub escalate_unknown_opcodes: bool,
    pub warnings_to_final_ban: u32,
    pub warnings_to_deletion: u32,
    pub ban_duration_secs: u64,
    pub final_ban_duration_secs: u64,
    /// Near-ceiling frames tolerated before the connection is dropped.
    pub max_oversized_frames: u32,
    pub outfit: OutfitPolicy,
}

impl SessionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            replace_on_login: config.login.replace_on_login,
            version_min: config.login.version_min,
            version_max: config.login.version_max,
            version_text: config.login.version_text.clone(),
            namelock_manager: config.login.namelock_manager,
            account_manager: config.login.account_manager,
            one_character_per_account: config.login.one_character_per_account,
            waitlist_retry_cap_secs: config.login.waitlist_retry_cap_secs,
            max_players: config.server.max_players,
            think_interval_ms: config.server.think_interval_ms,
            escalate_unknown_opcodes: config.abuse.escalate_unknown_opcodes,
            warnings_to_final_ban: config.abuse.warnings_to_final_ban,
            warnings_to_deletion: config.abuse.warnings_to_deletion,
            ban_duration_secs: config.abuse.ban_duration_secs,
            final_ban_duration_secs: config.abuse.final_ban_duration_secs,
            max_oversized_frames: config.abuse.max_oversized_frames,
            outfit: OutfitPolicy {
                allow_change: config.features.allow_outfit_change,
                allow_colors: config.features.allow_color_change,
                allow_addons: config.features.allow_addon_change,
                allow_mounts: config.features.allow_mounts,
            },
        }
    }

    /// Whether a client protocol version is inside the accepted range.
    pub fn version_accepted(&self, version: u16) -> bool {
        version >= self.version_min && version <= self.version_max
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_range_is_inclusive() {
        let mut policy = SessionPolicy::default();
        policy.version_min = 854;
        policy.version_max = 860;
        assert!(policy.version_accepted(854));
        assert!(policy.version_accepted(860));
        assert!(!policy.version_accepted(853));
        assert!(!policy.version_accepted(861));
    }

    #[test]
    fn test_snapshot_follows_config() {
        let mut config = Config::default();
        config.login.replace_on_login = false;
        config.features.allow_mounts = false;
        config.abuse.max_oversized_frames = 3;

        let policy = SessionPolicy::from_config(&config);
        assert!(!policy.replace_on_login);
        assert!(!policy.outfit.allow_mounts);
        assert_eq!(policy.max_oversized_frames, 3);
    }
}
