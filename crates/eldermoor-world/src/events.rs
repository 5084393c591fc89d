//! Events the simulation hands back for broadcasting.
//!
//! Commands go in, effects come out: the simulation applies its rules and
//! returns these value objects, and the session layer encodes each one for
//! every connected client allowed to see it. Visibility filtering happens at
//! encode time, per observer, so the simulation never needs to know who is
//! watching.

use eldermoor_wire::{MessageClass, MessageDetails};

use crate::position::{Direction, Position};
use crate::snapshot::{ContainerView, GoodsEntry, ItemView, LightInfo, Outfit, ShopEntry};

/// A change in the world, or an instruction aimed at one player's client.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEffect {
    /// A creature entered the world or stepped into existence at `position`.
    CreatureAppeared {
        creature: u32,
        position: Position,
        stack: u8,
    },
    /// A creature left the world from `position`.
    CreatureVanished {
        creature: u32,
        position: Position,
        stack: u8,
    },
    CreatureMoved {
        creature: u32,
        from: Position,
        from_stack: u8,
        to: Position,
        to_stack: u8,
        teleported: bool,
    },
    CreatureTurned {
        creature: u32,
        position: Position,
        stack: u8,
        direction: Direction,
    },
    /// Something was said. The simulation has already resolved the audience;
    /// `hearers` lists the player creatures that hear it. `position` is set
    /// for talk carried by the map, `channel` is read for channel classes.
    Speech {
        speaker: u32,
        name: String,
        level: u16,
        class: MessageClass,
        channel: u16,
        text: String,
        position: Option<Position>,
        hearers: Vec<u32>,
    },
    WorldLightChanged(LightInfo),
    MagicEffect {
        position: Position,
        effect: u8,
    },
    DistanceEffect {
        from: Position,
        to: Position,
        effect: u8,
    },
    TileItemAdded {
        position: Position,
        stack: u8,
        item: ItemView,
    },
    TileItemUpdated {
        position: Position,
        stack: u8,
        item: ItemView,
    },
    TileItemRemoved {
        position: Position,
        stack: u8,
    },
    /// The tile changed wholesale; observers get a fresh description.
    TileRefreshed {
        position: Position,
    },
    HealthChanged {
        creature: u32,
        percent: u8,
    },
    CreatureLightChanged {
        creature: u32,
        light: LightInfo,
    },
    OutfitChanged {
        creature: u32,
        outfit: Outfit,
    },
    SpeedChanged {
        creature: u32,
        speed: u16,
    },
    SkullChanged {
        creature: u32,
        skull: u8,
    },
    PartyShieldChanged {
        creature: u32,
        shield: u8,
    },
    WalkthroughChanged {
        creature: u32,
        walkable: bool,
    },
    /// Client-side target square around a creature, for the one player.
    SquareMarked {
        player: u32,
        creature: u32,
        color: u8,
    },

    /// Status bar data changed; the session re-reads and resends it.
    StatsChanged {
        player: u32,
    },
    SkillsChanged {
        player: u32,
    },
    /// One equipment slot changed; the session re-reads the slot.
    InventoryChanged {
        player: u32,
        slot: u8,
    },
    IconsChanged {
        player: u32,
    },
    /// A requested step was refused; the client snaps back to `direction`.
    WalkCancelled {
        player: u32,
        direction: Direction,
    },
    TargetCancelled {
        player: u32,
    },
    /// A message for one player's screen or console.
    TextFor {
        player: u32,
        class: MessageClass,
        text: String,
        position: Option<Position>,
        details: Option<MessageDetails>,
    },
    /// A modal notice box for one player.
    FyiFor {
        player: u32,
        text: String,
    },
    /// The player died; the client shows the relogin dialog.
    ReloginPrompted {
        player: u32,
        /// Percentage shown on the unfair-fight frame of the dialog.
        pvp_frame_percent: u8,
    },
    /// A spell went on cooldown; the client greys its icon.
    CooldownStarted {
        player: u32,
        icon: u8,
        millis: u32,
    },
    /// A whole spell group went on cooldown.
    CooldownGroupStarted {
        player: u32,
        group: u8,
        millis: u32,
    },
    /// The client plays a tutorial hint.
    TutorialShown {
        player: u32,
        hint: u8,
    },
    /// A flag appears on the player's minimap.
    MapMarkerAdded {
        player: u32,
        position: Position,
        kind: u8,
        description: String,
    },

    ContainerOpened {
        player: u32,
        container: u8,
        view: ContainerView,
    },
    ContainerClosed {
        player: u32,
        container: u8,
    },
    ContainerItemAdded {
        player: u32,
        container: u8,
        item: ItemView,
    },
    ContainerItemUpdated {
        player: u32,
        container: u8,
        slot: u8,
        item: ItemView,
    },
    ContainerItemRemoved {
        player: u32,
        container: u8,
        slot: u8,
    },

    ShopOpened {
        player: u32,
        trader: String,
        stock: Vec<ShopEntry>,
    },
    ShopClosed {
        player: u32,
    },
    /// Purse and sellable-goods refresh for the open shop window.
    GoodsUpdated {
        player: u32,
        money: u32,
        goods: Vec<GoodsEntry>,
    },

    /// Own (`counter_offer` false) or partner (`counter_offer` true) side of
    /// a trade window; `items` is the offered item plus container contents,
    /// flattened.
    TradeItemsShown {
        player: u32,
        partner: String,
        counter_offer: bool,
        items: Vec<ItemView>,
    },
    TradeClosed {
        player: u32,
    },

    TextWindowShown {
        player: u32,
        window: u32,
        item: ItemView,
        text: String,
        /// When set, the window is writable up to this many bytes.
        writable_to: Option<u16>,
        writer: String,
        date: String,
    },
    HouseWindowShown {
        player: u32,
        window: u32,
        text: String,
    },
}

impl WorldEffect {
    /// The player this effect is addressed to, or `None` when it fans out to
    /// every observer that can see it.
    pub fn addressee(&self) -> Option<u32> {
        match self {
            Self::SquareMarked { player, .. }
            | Self::StatsChanged { player }
            | Self::SkillsChanged { player }
            | Self::InventoryChanged { player, .. }
            | Self::IconsChanged { player }
            | Self::WalkCancelled { player, .. }
            | Self::TargetCancelled { player }
            | Self::TextFor { player, .. }
            | Self::FyiFor { player, .. }
            | Self::ReloginPrompted { player, .. }
            | Self::CooldownStarted { player, .. }
            | Self::CooldownGroupStarted { player, .. }
            | Self::TutorialShown { player, .. }
            | Self::MapMarkerAdded { player, .. }
            | Self::ContainerOpened { player, .. }
            | Self::ContainerClosed { player, .. }
            | Self::ContainerItemAdded { player, .. }
            | Self::ContainerItemUpdated { player, .. }
            | Self::ContainerItemRemoved { player, .. }
            | Self::ShopOpened { player, .. }
            | Self::ShopClosed { player }
            | Self::GoodsUpdated { player, .. }
            | Self::TradeItemsShown { player, .. }
            | Self::TradeClosed { player }
            | Self::TextWindowShown { player, .. }
            | Self::HouseWindowShown { player, .. } => Some(*player),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_effects_broadcast() {
        let effect = WorldEffect::MagicEffect {
            position: Position::new(100, 100, 7),
            effect: 2,
        };
        assert_eq!(effect.addressee(), None, "map effects fan out to observers");
    }

    #[test]
    fn test_window_effects_are_addressed() {
        let effect = WorldEffect::ShopClosed { player: 9 };
        assert_eq!(effect.addressee(), Some(9));
    }
}
