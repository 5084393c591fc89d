//! Opcode constants for both wire directions.
//!
//! The protocol is opcode-tagged: every frame payload starts with one byte
//! naming its decoder. Client and server number spaces overlap but are
//! unrelated, so they live in separate modules.

/// Opcodes the client sends.
pub mod client {
    pub const LOGOUT: u8 = 0x14;
    pub const PING: u8 = 0x1E;

    // Movement.
    pub const WALK_PATH: u8 = 0x64;
    pub const WALK_NORTH: u8 = 0x65;
    pub const WALK_EAST: u8 = 0x66;
    pub const WALK_SOUTH: u8 = 0x67;
    pub const WALK_WEST: u8 = 0x68;
    pub const WALK_STOP: u8 = 0x69;
    pub const WALK_NORTHEAST: u8 = 0x6A;
    pub const WALK_SOUTHEAST: u8 = 0x6B;
    pub const WALK_SOUTHWEST: u8 = 0x6C;
    pub const WALK_NORTHWEST: u8 = 0x6D;
    pub const TURN_NORTH: u8 = 0x6F;
    pub const TURN_EAST: u8 = 0x70;
    pub const TURN_SOUTH: u8 = 0x71;
    pub const TURN_WEST: u8 = 0x72;

    // Items and containers.
    pub const MOVE_OBJECT: u8 = 0x78;
    pub const SHOP_LOOK: u8 = 0x79;
    pub const SHOP_BUY: u8 = 0x7A;
    pub const SHOP_SELL: u8 = 0x7B;
    pub const SHOP_CLOSE: u8 = 0x7C;
    pub const TRADE_REQUEST: u8 = 0x7D;
    pub const TRADE_LOOK: u8 = 0x7E;
    pub const TRADE_ACCEPT: u8 = 0x7F;
    pub const TRADE_CLOSE: u8 = 0x80;
    pub const USE_ITEM: u8 = 0x82;
    pub const USE_ITEM_ON: u8 = 0x83;
    pub const USE_ON_CREATURE: u8 = 0x84;
    pub const ROTATE_ITEM: u8 = 0x85;
    pub const CONTAINER_CLOSE: u8 = 0x87;
    pub const CONTAINER_UP: u8 = 0x88;
    pub const TEXT_WINDOW: u8 = 0x89;
    pub const HOUSE_WINDOW: u8 = 0x8A;
    pub const LOOK_AT: u8 = 0x8C;

    // Chat.
    pub const SAY: u8 = 0x96;
    pub const CHANNEL_LIST: u8 = 0x97;
    pub const CHANNEL_OPEN: u8 = 0x98;
    pub const CHANNEL_CLOSE: u8 = 0x99;
    pub const PRIVATE_OPEN: u8 = 0x9A;
    pub const NPC_CHANNEL_CLOSE: u8 = 0x9E;

    // Combat and party.
    pub const FIGHT_MODES: u8 = 0xA0;
    pub const ATTACK: u8 = 0xA1;
    pub const FOLLOW: u8 = 0xA2;
    pub const PARTY_INVITE: u8 = 0xA3;
    pub const PARTY_JOIN: u8 = 0xA4;
    pub const PARTY_REVOKE: u8 = 0xA5;
    pub const PARTY_PASS_LEADERSHIP: u8 = 0xA6;
    pub const PARTY_LEAVE: u8 = 0xA7;
    pub const PARTY_SHARE_EXP: u8 = 0xA8;
    pub const CHANNEL_CREATE: u8 = 0xAA;
    pub const CHANNEL_INVITE: u8 = 0xAB;
    pub const CHANNEL_EXCLUDE: u8 = 0xAC;

    pub const CANCEL_MOVE: u8 = 0xBE;
    pub const TILE_UPDATE: u8 = 0xC9;
    pub const CONTAINER_UPDATE: u8 = 0xCA;

    // Appearance and social lists.
    pub const OUTFIT_REQUEST: u8 = 0xD2;
    pub const OUTFIT_SET: u8 = 0xD3;
    pub const MOUNT_SET: u8 = 0xD4;
    pub const VIP_ADD: u8 = 0xDC;
    pub const VIP_REMOVE: u8 = 0xDD;

    // Reports and quests.
    pub const BUG_REPORT: u8 = 0xE6;
    pub const DEBUG_ASSERT: u8 = 0xE8;
    pub const QUEST_LOG: u8 = 0xF0;
    pub const QUEST_INFO: u8 = 0xF1;
    pub const VIOLATION_REPORT: u8 = 0xF2;
}

/// Opcodes the server sends.
pub mod server {
    pub const LOGIN_SUCCESS: u8 = 0x0A;
    pub const DISCONNECT: u8 = 0x14;
    pub const FYI_BOX: u8 = 0x15;
    pub const WAITING_LIST: u8 = 0x16;
    pub const PING: u8 = 0x1E;
    pub const GREETING: u8 = 0x1F;
    pub const RELOGIN_WINDOW: u8 = 0x28;

    // Map and tiles.
    pub const MAP_FULL: u8 = 0x64;
    pub const MAP_NORTH_ROW: u8 = 0x65;
    pub const MAP_EAST_COL: u8 = 0x66;
    pub const MAP_SOUTH_ROW: u8 = 0x67;
    pub const MAP_WEST_COL: u8 = 0x68;
    pub const TILE_UPDATE: u8 = 0x69;
    pub const TILE_ADD_THING: u8 = 0x6A;
    pub const TILE_TRANSFORM_THING: u8 = 0x6B;
    pub const TILE_REMOVE_THING: u8 = 0x6C;
    pub const CREATURE_MOVE: u8 = 0x6D;
    pub const FLOOR_UP: u8 = 0xBE;
    pub const FLOOR_DOWN: u8 = 0xBF;

    // Containers, inventory, shop, trade.
    pub const CONTAINER_OPEN: u8 = 0x6E;
    pub const CONTAINER_CLOSE: u8 = 0x6F;
    pub const CONTAINER_ADD: u8 = 0x70;
    pub const CONTAINER_UPDATE: u8 = 0x71;
    pub const CONTAINER_REMOVE: u8 = 0x72;
    pub const INVENTORY_SET: u8 = 0x78;
    pub const INVENTORY_CLEAR: u8 = 0x79;
    pub const SHOP_OPEN: u8 = 0x7A;
    pub const SHOP_GOODS: u8 = 0x7B;
    pub const SHOP_CLOSE: u8 = 0x7C;
    pub const TRADE_OWN_OFFER: u8 = 0x7D;
    pub const TRADE_COUNTER_OFFER: u8 = 0x7E;
    pub const TRADE_CLOSE: u8 = 0x7F;

    // Ambient and per-creature updates.
    pub const WORLD_LIGHT: u8 = 0x82;
    pub const MAGIC_EFFECT: u8 = 0x83;
    pub const DISTANCE_SHOT: u8 = 0x85;
    pub const CREATURE_SQUARE: u8 = 0x86;
    pub const CREATURE_HEALTH: u8 = 0x8C;
    pub const CREATURE_LIGHT: u8 = 0x8D;
    pub const CREATURE_OUTFIT: u8 = 0x8E;
    pub const CREATURE_SPEED: u8 = 0x8F;
    pub const CREATURE_SKULL: u8 = 0x90;
    pub const CREATURE_SHIELD: u8 = 0x91;
    pub const CREATURE_WALKTHROUGH: u8 = 0x92;

    pub const TEXT_WINDOW: u8 = 0x96;
    pub const HOUSE_WINDOW: u8 = 0x97;

    // Player state.
    pub const PLAYER_STATS: u8 = 0xA0;
    pub const PLAYER_SKILLS: u8 = 0xA1;
    pub const PLAYER_ICONS: u8 = 0xA2;
    pub const CANCEL_TARGET: u8 = 0xA3;
    pub const SPELL_COOLDOWN: u8 = 0xA4;
    pub const SPELL_GROUP_COOLDOWN: u8 = 0xA5;

    // Chat.
    pub const CREATURE_SPEAK: u8 = 0xAA;
    pub const CHANNEL_LIST: u8 = 0xAB;
    pub const CHANNEL_OPEN: u8 = 0xAC;
    pub const CHANNEL_PRIVATE: u8 = 0xAD;
    pub const CHANNEL_CREATE: u8 = 0xB2;
    pub const CHANNEL_CLOSE: u8 = 0xB3;
    pub const TEXT_MESSAGE: u8 = 0xB4;
    pub const CANCEL_WALK: u8 = 0xB5;
    pub const CHANNEL_EVENT: u8 = 0xF3;

    pub const OUTFIT_WINDOW: u8 = 0xC8;
    pub const VIP_ENTRY: u8 = 0xD2;
    pub const VIP_ONLINE: u8 = 0xD3;
    pub const VIP_OFFLINE: u8 = 0xD4;
    pub const TUTORIAL: u8 = 0xDC;
    pub const MAP_MARKER: u8 = 0xDD;
    pub const QUEST_LOG: u8 = 0xF0;
    pub const QUEST_INFO: u8 = 0xF1;
}

/// Magic effect ids the server references itself. Stored 0-based; the
/// encoder adds one on the wire.
pub mod effect {
    pub const POFF: u8 = 0x02;
    pub const TELEPORT: u8 = 0x0A;
    pub const GREEN_SPARKLES: u8 = 0x0E;
}

/// 16-bit markers that introduce a creature inside a tile description.
pub mod creature_mark {
    /// Full record follows; also carries the id evicted from the peer's
    /// known-entity cache.
    pub const UNKNOWN: u16 = 0x61;
    /// Short form: the id alone, the peer already knows the rest.
    pub const KNOWN: u16 = 0x62;
    /// Reference by id inside a transform op (creature turn).
    pub const REFERENCE: u16 = 0x63;
}
