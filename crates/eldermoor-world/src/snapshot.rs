//! Immutable views of world objects, shaped for the encoder.
//!
//! The protocol session never touches live world structures; the world
//! facade hands out these value snapshots and the encoder serialises them.
//! Field meanings the simulation assigns (skull colours, shield states) pass
//! through as raw bytes.

use crate::position::Direction;

/// One item as a client sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView {
    /// Client-side item type id.
    pub client_id: u16,
    /// Stack count or fluid subtype for types that carry one.
    pub count: Option<u8>,
}

impl ItemView {
    pub fn plain(client_id: u16) -> Self {
        Self {
            client_id,
            count: None,
        }
    }

    pub fn counted(client_id: u16, count: u8) -> Self {
        Self {
            client_id,
            count: Some(count),
        }
    }
}

/// Appearance of a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outfit {
    /// Outfit sprite id; 0 means the creature is disguised as an item and
    /// `item_disguise` is sent instead of the colour block.
    pub look_type: u16,
    pub head: u8,
    pub body: u8,
    pub legs: u8,
    pub feet: u8,
    pub addons: u8,
    pub mount: u16,
    /// Item type shown when `look_type` is 0.
    pub item_disguise: u16,
}

/// Light a creature or the world emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightInfo {
    pub level: u8,
    pub color: u8,
}

/// Creature kind byte inside a full creature record.
pub mod creature_kind {
    pub const PLAYER: u8 = 0;
    pub const MONSTER: u8 = 1;
    pub const NPC: u8 = 2;
}

/// One creature as a client sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatureView {
    pub id: u32,
    pub name: String,
    /// One of [`creature_kind`].
    pub kind: u8,
    /// 0..=100.
    pub health_percent: u8,
    pub direction: Direction,
    pub outfit: Outfit,
    pub light: LightInfo,
    /// Walk speed in client units.
    pub speed: u16,
    pub skull: u8,
    pub party_shield: u8,
    pub guild_emblem: u8,
    /// True when other creatures cannot walk through this one.
    pub blocks_path: bool,
    /// Character level shown next to player speech; 0 hides it.
    pub level: u16,
}

/// Contents of one tile, in description order: ground, top items, creatures
/// (ids; arrival order, oldest first), bottom items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileView {
    pub ground: Option<ItemView>,
    pub top_items: Vec<ItemView>,
    pub creatures: Vec<u32>,
    pub bottom_items: Vec<ItemView>,
}

impl TileView {
    /// A tile holding only ground.
    pub fn bare(ground: ItemView) -> Self {
        Self {
            ground: Some(ground),
            ..Self::default()
        }
    }
}

/// Equipment slots, numbered as the client numbers them.
pub const EQUIPMENT_SLOT_FIRST: u8 = 1;
pub const EQUIPMENT_SLOT_LAST: u8 = 10;

/// Trained skills in wire order: fist, club, sword, axe, distance,
/// shielding, fishing.
pub const SKILL_COUNT: usize = 7;

/// One trained skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillView {
    pub level: u8,
    pub base: u8,
    /// Progress towards the next level, 0..=100.
    pub percent: u8,
}

pub type SkillSet = [SkillView; SKILL_COUNT];

/// The status-bar block of a player, shaped for the stats encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub health: u16,
    pub max_health: u16,
    /// Carry capacities in hundredths of an ounce.
    pub free_capacity: u32,
    pub capacity: u32,
    pub experience: u64,
    pub level: u16,
    pub level_percent: u8,
    pub mana: u16,
    pub max_mana: u16,
    pub magic_level: u8,
    pub base_magic_level: u8,
    pub magic_level_percent: u8,
    pub soul: u8,
    pub stamina_minutes: u16,
    pub speed: u16,
    /// Remaining food regeneration, in seconds.
    pub regeneration_secs: u16,
}

/// One wearable outfit offered in the outfit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitChoice {
    pub look_type: u16,
    pub name: String,
    pub addons: u8,
}

/// One tamed mount offered in the outfit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountChoice {
    pub client_id: u16,
    pub name: String,
}

/// One started quest line in the quest log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestLine {
    pub id: u16,
    pub name: String,
    pub completed: bool,
}

/// One active mission within a quest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestMission {
    pub name: String,
    pub description: String,
}

/// An opened container as shown to its viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerView {
    pub item: ItemView,
    pub name: String,
    pub capacity: u8,
    pub has_parent: bool,
    pub items: Vec<ItemView>,
}

/// One line of a shop window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopEntry {
    pub client_id: u16,
    /// Subtype, charge count, or zero, as the item type dictates.
    pub count_byte: u8,
    pub name: String,
    /// Hundredths of an ounce.
    pub weight: u32,
    pub buy_price: u32,
    pub sell_price: u32,
}

/// One sellable-goods line of the cash-and-goods update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodsEntry {
    pub client_id: u16,
    pub count: u8,
}
