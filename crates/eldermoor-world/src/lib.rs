//! World-facing data model: coordinates, view snapshots, viewport rules, and
//! the capability seams the protocol session consumes (world lookup, account
//! directory, chat registry).

pub mod commands;
pub mod events;
pub mod position;
pub mod services;
pub mod snapshot;
pub mod viewport;

pub use commands::{FightStance, PlayerCommand};
pub use events::WorldEffect;
pub use position::{Direction, Position};
pub use services::{
    AccountDirectory, AccountId, AccountStatus, AuthError, BanRecord, ChannelInfo, CharacterId,
    CharacterRecord, ChatRegistry, GameWorld, LogoutDenied, PlacementError, Privileges, Sanction,
    VipEntry, WorldRunState, WorldView,
};
pub use snapshot::{
    ContainerView, CreatureView, GoodsEntry, ItemView, LightInfo, MountChoice, Outfit,
    OutfitChoice, PlayerStats, QuestLine, QuestMission, ShopEntry, SkillSet, SkillView, TileView,
};
pub use viewport::{
    BOTTOM_FLOOR, SURFACE_FLOOR, TILE_STACK_LIMIT, UNDERGROUND_DEPTH, VIEW_HEIGHT, VIEW_WIDTH,
    in_view,
};
