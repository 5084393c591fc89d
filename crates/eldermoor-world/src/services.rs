//! Capability seams between the protocol session and the rest of the server.
//!
//! The session never reaches into world, account, or chat internals; it is
//! constructed over these narrow traits. Production wires them to the live
//! world and storage, tests wire them to in-memory fakes. All methods take
//! `&self` so implementations choose their own interior mutability; the
//! session only ever calls them from the single game-logic thread.

use std::net::IpAddr;

use crate::commands::PlayerCommand;
use crate::events::WorldEffect;
use crate::position::Position;
use crate::snapshot::{
    CreatureView, ItemView, LightInfo, MountChoice, OutfitChoice, PlayerStats, QuestLine,
    QuestMission, SkillSet, TileView,
};

/// Storage-side account key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u32);

/// Storage-side character key, also the creature id a bound player uses on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacterId(pub u32);

/// Coarse world run state, checked before any login proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldRunState {
    /// Still loading; logins wait.
    Starting,
    /// Normal operation.
    Open,
    /// Staff-only window.
    Maintenance,
    /// Closed to regular players.
    Closed,
    /// Going down; new connections are dropped without a reply.
    ShuttingDown,
}

/// A recorded banishment, dates preformatted by the storage side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    /// When the sanction was issued.
    pub issued: String,
    /// When it lifts; "never" for permanent sanctions.
    pub expires: String,
    /// Who issued it.
    pub actor: String,
    pub reason: String,
    /// The action taken, e.g. "banishment" or "final banishment".
    pub action: String,
    pub comment: String,
}

/// Account standing as far as login is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    /// The account was removed; the record says when and why.
    Deleted(BanRecord),
    Banished(BanRecord),
}

/// Per-character privilege flags the session consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privileges {
    pub gamemaster: bool,
    /// Bypasses the player cap and closed-world gate.
    pub can_always_login: bool,
    /// Logout succeeds even in combat or no-logout zones.
    pub can_logout_anytime: bool,
    pub can_report_bugs: bool,
}

/// Character facts needed to admit a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    /// Namelocked characters are routed into the account-manager flow when
    /// that feature is on, refused otherwise.
    pub namelocked: bool,
    /// Premium accounts get the larger VIP list.
    pub premium: bool,
    pub privileges: Privileges,
}

/// One watched contact on the VIP list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipEntry {
    pub id: CharacterId,
    pub name: String,
}

/// Durable sanction applied by the abuse escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanction {
    /// Temporary banishment.
    Banish { duration_secs: u64 },
    /// Long banishment past the final-warning threshold.
    FinalBanish { duration_secs: u64 },
    /// The account is removed outright.
    Deletion,
}

/// Credential check failure. Login reports both the same way to the client;
/// the distinction is for the log.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown account name")]
    UnknownAccount,
    #[error("wrong password")]
    WrongPassword,
}

/// Read access to world state, snapshot-shaped.
pub trait WorldView: Send + Sync {
    fn run_state(&self) -> WorldRunState;

    /// Snapshot of one tile; `None` outside the loaded map.
    fn tile(&self, pos: Position) -> Option<TileView>;

    /// Snapshot of a live creature; `None` once it left the world.
    fn creature(&self, id: u32) -> Option<CreatureView>;

    /// Where a live creature stands; `None` once it left the world.
    fn creature_position(&self, id: u32) -> Option<Position>;

    fn world_light(&self) -> LightInfo;

    fn players_online(&self) -> u32;

    /// Presence check for VIP notifications.
    fn is_character_online(&self, id: CharacterId) -> bool;

    /// Whether `observer` is allowed to perceive `target` at all, position
    /// aside. Covers invisibility and staff ghost mode.
    fn can_observe(&self, observer: u32, target: u32) -> bool;

    /// Status-bar block of a player creature.
    fn player_stats(&self, id: u32) -> Option<PlayerStats>;

    fn player_skills(&self, id: u32) -> Option<SkillSet>;

    /// Item worn in an equipment slot, `None` for an empty slot.
    fn equipment_item(&self, id: u32, slot: u8) -> Option<ItemView>;

    /// Active condition icons, as the client bitmask.
    fn player_icons(&self, id: u32) -> u16;

    /// Outfits this player may wear, addons already narrowed to what they
    /// unlocked.
    fn outfit_choices(&self, id: u32) -> Vec<OutfitChoice>;

    /// Mounts this player has tamed.
    fn mount_choices(&self, id: u32) -> Vec<MountChoice>;

    /// Quests this player has started.
    fn quest_log(&self, id: u32) -> Vec<QuestLine>;

    /// Missions of one quest as this player sees them; `None` for a quest id
    /// the player never started.
    fn quest_missions(&self, id: u32, quest: u16) -> Option<Vec<QuestMission>>;
}

/// Account, character, ban, and VIP persistence.
pub trait AccountDirectory: Send + Sync {
    fn authenticate(&self, account: &str, password: &str) -> Result<AccountId, AuthError>;

    /// Whether connections from this address are banned outright.
    fn ip_banished(&self, ip: IpAddr) -> bool;

    fn account_status(&self, id: AccountId) -> AccountStatus;

    /// Character owned by `account` with this name.
    fn character(&self, account: AccountId, name: &str) -> Option<CharacterRecord>;

    fn character_ban(&self, character: CharacterId) -> Option<BanRecord>;

    /// Any character by name, for VIP bookkeeping.
    fn find_character(&self, name: &str) -> Option<VipEntry>;

    /// Stand-in character bound when a connection enters the
    /// account-manager flow without a character of its own. `None` disables
    /// that flow regardless of configuration.
    fn manager_character(&self) -> Option<CharacterRecord>;

    fn vip_list(&self, account: AccountId) -> Vec<VipEntry>;

    /// Store a VIP entry; false when it was already present.
    fn vip_store(&self, account: AccountId, character: CharacterId) -> bool;

    fn vip_erase(&self, account: AccountId, character: CharacterId);

    /// Bump and return the account's abuse warning count.
    fn note_warning(&self, id: AccountId) -> u32;

    /// Record a durable sanction with a short policy reason.
    fn apply_sanction(&self, id: AccountId, sanction: Sanction, reason: &str);
}

/// A chat channel as listed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u16,
    pub name: String,
}

/// Chat-channel membership bookkeeping.
pub trait ChatRegistry: Send + Sync {
    /// Channels this player may open, for the channel-list dialog.
    fn channels_for(&self, player: CharacterId) -> Vec<ChannelInfo>;

    /// Channel name plus members and invitees shown when a conversation
    /// channel opens; `None` when the channel does not exist for this
    /// player. Plain channels report empty rosters.
    fn open_channel(
        &self,
        channel: u16,
        player: CharacterId,
    ) -> Option<(String, Vec<String>, Vec<String>)>;

    /// Everyone who hears `speaker` talk in a channel, the speaker included;
    /// `None` when the speaker is not in the channel.
    fn channel_members(&self, channel: u16, speaker: CharacterId) -> Option<Vec<CharacterId>>;

    /// Drop the player from every channel. Used when a session is replaced
    /// or torn down.
    fn remove_from_all(&self, player: CharacterId);

    /// Open a conversation channel owned by `owner`, or return the existing
    /// one. `None` when the player may not own a channel.
    fn create_private(&self, owner: CharacterId, owner_name: &str) -> Option<ChannelInfo>;

    /// Invite `target` into the owner's conversation channel; returns the
    /// channel id on success.
    fn invite(&self, owner: CharacterId, target: CharacterId) -> Option<u16>;

    /// Revoke an invitation or eject a member from the owner's conversation
    /// channel; returns the channel id on success.
    fn exclude(&self, owner: CharacterId, target: CharacterId) -> Option<u16>;

    /// Leave a channel. When leaving dissolves a conversation channel the
    /// remaining members are returned so each can be told it closed.
    fn leave(&self, player: CharacterId, channel: u16) -> Vec<CharacterId>;
}

/// Placement failure when a character enters the world.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no walkable tile at or around the start position")]
    Blocked,
    #[error("the character is already in the world")]
    AlreadyPresent,
}

/// Logout refused by simulation rules, with the message for the client.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct LogoutDenied(pub String);

/// The simulation behind the session layer.
///
/// One implementation runs on the game thread and owns all mutable world
/// state. The session layer calls in with decoded commands and fans the
/// returned effects out to every client allowed to see them; the simulation
/// never addresses clients itself.
pub trait GameWorld: WorldView {
    /// Put a character into the world at its start position.
    fn enter_world(&mut self, record: &CharacterRecord)
    -> Result<Vec<WorldEffect>, PlacementError>;

    /// Take a creature out of the world. `forced` skips the combat and
    /// no-logout checks, for kicks and privileged logout.
    fn leave_world(&mut self, creature: u32, forced: bool)
    -> Result<Vec<WorldEffect>, LogoutDenied>;

    /// Apply one player command and report what changed.
    fn handle_command(&mut self, creature: u32, command: PlayerCommand) -> Vec<WorldEffect>;

    /// Periodic world upkeep, driven by the recurring think tick.
    fn think(&mut self) -> Vec<WorldEffect> {
        Vec::new()
    }
}
