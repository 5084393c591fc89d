//! Commands a session forwards into the simulation.
//!
//! These are the plain task values carried over the game queue: one variant
//! per world-touching client action, payloads already decoded and validated.
//! The simulation pattern-matches and applies its own rules; the session
//! never interprets them beyond decoding.

use eldermoor_wire::MessageClass;

use crate::position::{Direction, Position};
use crate::snapshot::Outfit;

/// Attack stance sent alongside chase and secure flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightStance {
    Offensive,
    Balanced,
    Defensive,
}

impl FightStance {
    /// Wire byte: 1 offensive, 2 balanced, 3 defensive.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Offensive),
            2 => Some(Self::Balanced),
            3 => Some(Self::Defensive),
            _ => None,
        }
    }
}

/// A world-touching action requested by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Walk(Direction),
    WalkPath(Vec<Direction>),
    StopWalk,
    Turn(Direction),
    /// Move an item or creature between positions; `count` is the moved
    /// stack portion.
    MoveThing {
        from: Position,
        client_id: u16,
        from_stack: u8,
        to: Position,
        count: u8,
    },
    UseItem {
        position: Position,
        client_id: u16,
        stack: u8,
        /// Container index the result opens into.
        index: u8,
        hotkey: bool,
    },
    UseItemOn {
        from: Position,
        from_client_id: u16,
        from_stack: u8,
        to: Position,
        to_client_id: u16,
        to_stack: u8,
        hotkey: bool,
    },
    UseOnCreature {
        position: Position,
        client_id: u16,
        stack: u8,
        target: u32,
        hotkey: bool,
    },
    RotateItem {
        position: Position,
        client_id: u16,
        stack: u8,
    },
    Look {
        position: Position,
        client_id: u16,
        stack: u8,
    },
    Say {
        class: MessageClass,
        channel: u16,
        receiver: String,
        text: String,
    },
    Attack {
        target: u32,
    },
    Follow {
        target: u32,
    },
    CancelAttackAndFollow,
    SetFightModes {
        stance: FightStance,
        chase: bool,
        secure: bool,
    },
    InviteToParty {
        target: u32,
    },
    JoinParty {
        host: u32,
    },
    RevokePartyInvite {
        target: u32,
    },
    PassPartyLeadership {
        target: u32,
    },
    LeaveParty,
    SharePartyExperience {
        active: bool,
    },
    CloseContainer {
        container: u8,
    },
    ContainerUp {
        container: u8,
    },
    RefreshContainer {
        container: u8,
    },
    EditText {
        window: u32,
        text: String,
    },
    EditHouseText {
        door: u8,
        window: u32,
        text: String,
    },
    InspectShopItem {
        client_id: u16,
        count: u8,
    },
    BuyItem {
        client_id: u16,
        count: u8,
        amount: u8,
        ignore_capacity: bool,
        with_backpacks: bool,
    },
    SellItem {
        client_id: u16,
        count: u8,
        amount: u8,
        ignore_equipped: bool,
    },
    CloseShop,
    RequestTrade {
        position: Position,
        client_id: u16,
        stack: u8,
        partner: u32,
    },
    InspectTradeItem {
        counter_offer: bool,
        index: u8,
    },
    AcceptTrade,
    CloseTrade,
    SetOutfit(Outfit),
    ToggleMount(bool),
    CloseNpcChannel,
}

impl PlayerCommand {
    /// Whether this command goes on the queue as a timed task, dropped when
    /// stale instead of executing late.
    pub fn deferrable(&self) -> bool {
        matches!(
            self,
            Self::Turn(_)
                | Self::MoveThing { .. }
                | Self::UseItem { .. }
                | Self::UseItemOn { .. }
                | Self::UseOnCreature { .. }
                | Self::RotateItem { .. }
                | Self::Look { .. }
                | Self::Say { .. }
                | Self::SetFightModes { .. }
                | Self::InspectShopItem { .. }
                | Self::BuyItem { .. }
                | Self::SellItem { .. }
                | Self::InspectTradeItem { .. }
        )
    }
}
