//! Message classes shared by chat and status text.
//!
//! One byte space covers both speech (say, yell, channel talk) and status
//! messages (advance notices, combat numbers). The class decides the rest of
//! the payload: speech classes carry a map position, channel classes a
//! channel id, and the combat classes a position plus up to two value/colour
//! pairs.

/// Longest chat message a client may submit; longer ones are dropped.
pub const SPEAK_MAX_LENGTH: usize = 255;

/// Well-known channel ids.
pub mod channel {
    pub const GUILD: u16 = 0x00;
    pub const PARTY: u16 = 0x01;
    /// Private conversation windows share one pseudo id.
    pub const PRIVATE: u16 = 0xFFFF;
}

/// Event byte of a channel-event notice.
pub mod channel_event {
    pub const JOIN: u8 = 0;
    pub const LEAVE: u8 = 1;
    pub const INVITE: u8 = 2;
    pub const EXCLUDE: u8 = 3;
}

/// The class byte leading every spoken or status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageClass {
    Say = 0x01,
    Whisper = 0x02,
    Yell = 0x03,
    PrivateFrom = 0x04,
    PrivateTo = 0x05,
    ChannelManagement = 0x06,
    Channel = 0x07,
    ChannelHighlight = 0x08,
    Spell = 0x09,
    NpcFrom = 0x0A,
    NpcTo = 0x0B,
    GamemasterBroadcast = 0x0C,
    GamemasterChannel = 0x0D,
    GamemasterPrivateFrom = 0x0E,
    GamemasterPrivateTo = 0x0F,
    MonsterSay = 0x10,
    MonsterYell = 0x11,
    ConsoleRed = 0x12,
    ConsoleOrange = 0x13,
    ConsoleOrangeTwo = 0x14,
    Warning = 0x15,
    EventAdvance = 0x16,
    EventDefault = 0x17,
    StatusDefault = 0x18,
    Info = 0x19,
    StatusSmall = 0x1A,
    ConsoleBlue = 0x1B,
    DamageDealt = 0x1C,
    DamageReceived = 0x1D,
    Healed = 0x1E,
    Experience = 0x1F,
    DamageOthers = 0x20,
    HealedOthers = 0x21,
    ExperienceOthers = 0x22,
}

impl MessageClass {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::Say,
            0x02 => Self::Whisper,
            0x03 => Self::Yell,
            0x04 => Self::PrivateFrom,
            0x05 => Self::PrivateTo,
            0x06 => Self::ChannelManagement,
            0x07 => Self::Channel,
            0x08 => Self::ChannelHighlight,
            0x09 => Self::Spell,
            0x0A => Self::NpcFrom,
            0x0B => Self::NpcTo,
            0x0C => Self::GamemasterBroadcast,
            0x0D => Self::GamemasterChannel,
            0x0E => Self::GamemasterPrivateFrom,
            0x0F => Self::GamemasterPrivateTo,
            0x10 => Self::MonsterSay,
            0x11 => Self::MonsterYell,
            0x12 => Self::ConsoleRed,
            0x13 => Self::ConsoleOrange,
            0x14 => Self::ConsoleOrangeTwo,
            0x15 => Self::Warning,
            0x16 => Self::EventAdvance,
            0x17 => Self::EventDefault,
            0x18 => Self::StatusDefault,
            0x19 => Self::Info,
            0x1A => Self::StatusSmall,
            0x1B => Self::ConsoleBlue,
            0x1C => Self::DamageDealt,
            0x1D => Self::DamageReceived,
            0x1E => Self::Healed,
            0x1F => Self::Experience,
            0x20 => Self::DamageOthers,
            0x21 => Self::HealedOthers,
            0x22 => Self::ExperienceOthers,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Speech classes whose payload carries the speaker's map position.
    pub fn carries_position(self) -> bool {
        matches!(
            self,
            Self::Say
                | Self::Whisper
                | Self::Yell
                | Self::MonsterSay
                | Self::MonsterYell
                | Self::Spell
                | Self::NpcFrom
        )
    }

    /// Speech classes whose payload carries a channel id.
    pub fn carries_channel(self) -> bool {
        matches!(
            self,
            Self::Channel | Self::ChannelHighlight | Self::GamemasterChannel
        )
    }

    /// Inbound speech classes addressed to a named receiver.
    pub fn carries_receiver(self) -> bool {
        matches!(self, Self::PrivateTo | Self::GamemasterPrivateTo)
    }

    /// Status classes carrying a position plus two value/colour pairs.
    pub fn carries_damage_pair(self) -> bool {
        matches!(
            self,
            Self::DamageDealt | Self::DamageReceived | Self::DamageOthers
        )
    }

    /// Status classes carrying a position plus one value/colour pair.
    pub fn carries_single_value(self) -> bool {
        matches!(
            self,
            Self::Experience | Self::ExperienceOthers | Self::Healed | Self::HealedOthers
        )
    }
}

/// Combat numbers attached to damage, heal, and experience messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageDetails {
    pub value: u32,
    pub color: u8,
    /// Second value/colour pair, e.g. the mana part of a hybrid hit.
    pub sub: Option<(u32, u8)>,
}

impl MessageDetails {
    pub fn single(value: u32, color: u8) -> Self {
        Self {
            value,
            color,
            sub: None,
        }
    }
}
