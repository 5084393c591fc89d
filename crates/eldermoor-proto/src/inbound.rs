//! Client frame decoding: the login handshake and the per-opcode command
//! table.
//!
//! Decoding is strict where the original client is strict (fixed layouts,
//! exact field order) and lenient where real clients misbehave: an oversized
//! chat line or a bogus path tag drops the frame, never the connection.
//! Unknown opcodes are reported upward so the abuse ladder can count them.

use eldermoor_wire::message::{MessageClass, SPEAK_MAX_LENGTH};
use eldermoor_wire::opcode::client;
use eldermoor_wire::reader::{PacketReader, ReadError};
use eldermoor_world::snapshot::Outfit;
use eldermoor_world::{Direction, FightStance, PlayerCommand, Position};
use tracing::debug;

/// Longest auto-walk path accepted; extra steps are cut off.
pub const WALK_PATH_LIMIT: usize = 32;

/// Longest character name accepted in a VIP addition.
const VIP_NAME_LIMIT: usize = 32;

/// The login handshake, first frame of every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstPacket {
    pub operating_system: u16,
    pub version: u16,
    /// Symmetric key words offered by the client; carried but unused while
    /// the cipher layer is off.
    pub key: [u32; 4],
    /// The client-side gamemaster toggle. Asserting it without the matching
    /// privilege refuses the login.
    pub gamemaster: bool,
    pub account: String,
    pub character: String,
    pub password: String,
}

impl FirstPacket {
    /// Trailing padding after the password is ignored.
    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ReadError> {
        let operating_system = reader.get_u16()?;
        let version = reader.get_u16()?;
        let key = [
            reader.get_u32()?,
            reader.get_u32()?,
            reader.get_u32()?,
            reader.get_u32()?,
        ];
        let gamemaster = reader.get_u8()? != 0;
        let account = reader.get_string()?;
        let character = reader.get_string()?;
        let password = reader.get_string()?;
        Ok(Self {
            operating_system,
            version,
            key,
            gamemaster,
            account,
            character,
            password,
        })
    }
}

/// A client request the session layer answers itself, without the
/// simulation: lifecycle, chat-channel bookkeeping, lists and dialogs served
/// from snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Logout,
    Pong,
    RequestChannels,
    OpenChannel { channel: u16 },
    CloseChannel { channel: u16 },
    OpenPrivate { receiver: String },
    CreateOwnChannel,
    ChannelInvite { name: String },
    ChannelExclude { name: String },
    RefreshTile { position: Position },
    RequestOutfitWindow,
    AddVip { name: String },
    RemoveVip { character: u32 },
    BugReport { text: String },
    DebugReport { assertion: String, date: String, description: String, comment: String },
    RequestQuestLog,
    RequestQuestInfo { quest: u16 },
    /// Rule-violation reports go to a moderation pipeline this server does
    /// not run; the frame is acknowledged by ignoring it.
    ViolationReport,
}

/// One decoded client frame, split by who handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Session(SessionCommand),
    Player(PlayerCommand),
}

/// Decode failure for one frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// No decoder for this opcode. Feeds the unknown-packet abuse ladder.
    #[error("unknown client opcode {0:#04x}")]
    Unknown(u8),
    /// The payload ended before its layout did.
    #[error("truncated payload for opcode {opcode:#04x}")]
    Truncated {
        opcode: u8,
        #[source]
        source: ReadError,
    },
}

/// Decode the frame behind `opcode`. `Ok(None)` means the frame was valid
/// enough to parse but is dropped by rule (oversized text, empty path).
pub fn decode(
    opcode: u8,
    reader: &mut PacketReader<'_>,
) -> Result<Option<Decoded>, DecodeError> {
    match decode_table(opcode, reader) {
        Ok(decoded) => Ok(decoded),
        Err(TableError::Unknown) => Err(DecodeError::Unknown(opcode)),
        Err(TableError::Read(source)) => Err(DecodeError::Truncated { opcode, source }),
    }
}

enum TableError {
    Unknown,
    Read(ReadError),
}

impl From<ReadError> for TableError {
    fn from(error: ReadError) -> Self {
        Self::Read(error)
    }
}

fn decode_table(
    opcode: u8,
    r: &mut PacketReader<'_>,
) -> Result<Option<Decoded>, TableError> {
    use Decoded::{Player, Session};
    use PlayerCommand as Cmd;
    use SessionCommand as Sess;

    let decoded = match opcode {
        client::LOGOUT => Session(Sess::Logout),
        client::PING => Session(Sess::Pong),

        client::WALK_PATH => match decode_walk_path(r)? {
            Some(path) => Player(Cmd::WalkPath(path)),
            None => return Ok(None),
        },
        client::WALK_NORTH => Player(Cmd::Walk(Direction::North)),
        client::WALK_EAST => Player(Cmd::Walk(Direction::East)),
        client::WALK_SOUTH => Player(Cmd::Walk(Direction::South)),
        client::WALK_WEST => Player(Cmd::Walk(Direction::West)),
        client::WALK_STOP => Player(Cmd::StopWalk),
        client::WALK_NORTHEAST => Player(Cmd::Walk(Direction::NorthEast)),
        client::WALK_SOUTHEAST => Player(Cmd::Walk(Direction::SouthEast)),
        client::WALK_SOUTHWEST => Player(Cmd::Walk(Direction::SouthWest)),
        client::WALK_NORTHWEST => Player(Cmd::Walk(Direction::NorthWest)),
        client::TURN_NORTH => Player(Cmd::Turn(Direction::North)),
        client::TURN_EAST => Player(Cmd::Turn(Direction::East)),
        client::TURN_SOUTH => Player(Cmd::Turn(Direction::South)),
        client::TURN_WEST => Player(Cmd::Turn(Direction::West)),

        client::MOVE_OBJECT => {
            let from = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let from_stack = r.get_u8()?;
            let to = Position::read_from(r)?;
            let count = r.get_u8()?;
            if to == from {
                return Ok(None);
            }
            Player(Cmd::MoveThing {
                from,
                client_id,
                from_stack,
                to,
                count,
            })
        }
        client::SHOP_LOOK => {
            let client_id = r.get_u16()?;
            let count = r.get_u8()?;
            Player(Cmd::InspectShopItem { client_id, count })
        }
        client::SHOP_BUY => {
            let client_id = r.get_u16()?;
            let count = r.get_u8()?;
            let amount = r.get_u8()?;
            let ignore_capacity = r.get_u8()? != 0;
            let with_backpacks = r.get_u8()? != 0;
            Player(Cmd::BuyItem {
                client_id,
                count,
                amount,
                ignore_capacity,
                with_backpacks,
            })
        }
        client::SHOP_SELL => {
            let client_id = r.get_u16()?;
            let count = r.get_u8()?;
            let amount = r.get_u8()?;
            let ignore_equipped = r.get_u8()? != 0;
            Player(Cmd::SellItem {
                client_id,
                count,
                amount,
                ignore_equipped,
            })
        }
        client::SHOP_CLOSE => Player(Cmd::CloseShop),
        client::TRADE_REQUEST => {
            let position = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let stack = r.get_u8()?;
            let partner = r.get_u32()?;
            Player(Cmd::RequestTrade {
                position,
                client_id,
                stack,
                partner,
            })
        }
        client::TRADE_LOOK => {
            let counter_offer = r.get_u8()? != 0;
            let index = r.get_u8()?;
            Player(Cmd::InspectTradeItem {
                counter_offer,
                index,
            })
        }
        client::TRADE_ACCEPT => Player(Cmd::AcceptTrade),
        client::TRADE_CLOSE => Player(Cmd::CloseTrade),

        client::USE_ITEM => {
            let position = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let stack = r.get_u8()?;
            let index = r.get_u8()?;
            let hotkey = is_hotkey(position);
            Player(Cmd::UseItem {
                position,
                client_id,
                stack,
                index,
                hotkey,
            })
        }
        client::USE_ITEM_ON => {
            let from = Position::read_from(r)?;
            let from_client_id = r.get_u16()?;
            let from_stack = r.get_u8()?;
            let to = Position::read_from(r)?;
            let to_client_id = r.get_u16()?;
            let to_stack = r.get_u8()?;
            let hotkey = is_hotkey(from);
            Player(Cmd::UseItemOn {
                from,
                from_client_id,
                from_stack,
                to,
                to_client_id,
                to_stack,
                hotkey,
            })
        }
        client::USE_ON_CREATURE => {
            let position = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let stack = r.get_u8()?;
            let target = r.get_u32()?;
            let hotkey = is_hotkey(position);
            Player(Cmd::UseOnCreature {
                position,
                client_id,
                stack,
                target,
                hotkey,
            })
        }
        client::ROTATE_ITEM => {
            let position = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let stack = r.get_u8()?;
            Player(Cmd::RotateItem {
                position,
                client_id,
                stack,
            })
        }
        client::CONTAINER_CLOSE => Player(Cmd::CloseContainer {
            container: r.get_u8()?,
        }),
        client::CONTAINER_UP => Player(Cmd::ContainerUp {
            container: r.get_u8()?,
        }),
        client::TEXT_WINDOW => {
            let window = r.get_u32()?;
            let text = r.get_string()?;
            Player(Cmd::EditText { window, text })
        }
        client::HOUSE_WINDOW => {
            let door = r.get_u8()?;
            let window = r.get_u32()?;
            let text = r.get_string()?;
            Player(Cmd::EditHouseText { door, window, text })
        }
        client::LOOK_AT => {
            let position = Position::read_from(r)?;
            let client_id = r.get_u16()?;
            let stack = r.get_u8()?;
            Player(Cmd::Look {
                position,
                client_id,
                stack,
            })
        }

        client::SAY => match decode_say(r)? {
            Some(say) => Player(say),
            None => return Ok(None),
        },
        client::CHANNEL_LIST => Session(Sess::RequestChannels),
        client::CHANNEL_OPEN => Session(Sess::OpenChannel {
            channel: r.get_u16()?,
        }),
        client::CHANNEL_CLOSE => Session(Sess::CloseChannel {
            channel: r.get_u16()?,
        }),
        client::PRIVATE_OPEN => Session(Sess::OpenPrivate {
            receiver: r.get_string()?,
        }),
        client::NPC_CHANNEL_CLOSE => Player(Cmd::CloseNpcChannel),

        client::FIGHT_MODES => {
            let stance = r.get_u8()?;
            let chase = r.get_u8()? != 0;
            let secure = r.get_u8()? != 0;
            let Some(stance) = FightStance::from_byte(stance) else {
                debug!(stance, "fight-mode frame with a stance outside 1..=3");
                return Ok(None);
            };
            Player(Cmd::SetFightModes {
                stance,
                chase,
                secure,
            })
        }
        client::ATTACK => Player(Cmd::Attack {
            target: r.get_u32()?,
        }),
        client::FOLLOW => Player(Cmd::Follow {
            target: r.get_u32()?,
        }),
        client::PARTY_INVITE => Player(Cmd::InviteToParty {
            target: r.get_u32()?,
        }),
        client::PARTY_JOIN => Player(Cmd::JoinParty {
            host: r.get_u32()?,
        }),
        client::PARTY_REVOKE => Player(Cmd::RevokePartyInvite {
            target: r.get_u32()?,
        }),
        client::PARTY_PASS_LEADERSHIP => Player(Cmd::PassPartyLeadership {
            target: r.get_u32()?,
        }),
        client::PARTY_LEAVE => Player(Cmd::LeaveParty),
        client::PARTY_SHARE_EXP => {
            let active = r.get_u8()? != 0;
            r.get_u8()?; // unused trailing byte the client always sends
            Player(Cmd::SharePartyExperience { active })
        }
        client::CHANNEL_CREATE => Session(Sess::CreateOwnChannel),
        client::CHANNEL_INVITE => Session(Sess::ChannelInvite {
            name: r.get_string()?,
        }),
        client::CHANNEL_EXCLUDE => Session(Sess::ChannelExclude {
            name: r.get_string()?,
        }),

        client::CANCEL_MOVE => Player(Cmd::CancelAttackAndFollow),
        client::TILE_UPDATE => Session(Sess::RefreshTile {
            position: Position::read_from(r)?,
        }),
        client::CONTAINER_UPDATE => Player(Cmd::RefreshContainer {
            container: r.get_u8()?,
        }),

        client::OUTFIT_REQUEST => Session(Sess::RequestOutfitWindow),
        client::OUTFIT_SET => {
            let look_type = r.get_u16()?;
            let head = r.get_u8()?;
            let body = r.get_u8()?;
            let legs = r.get_u8()?;
            let feet = r.get_u8()?;
            let addons = r.get_u8()?;
            let mount = r.get_u16()?;
            Player(Cmd::SetOutfit(Outfit {
                look_type,
                head,
                body,
                legs,
                feet,
                addons,
                mount,
                item_disguise: 0,
            }))
        }
        client::MOUNT_SET => Player(Cmd::ToggleMount(r.get_u8()? != 0)),

        client::VIP_ADD => {
            let name = r.get_string()?;
            if name.len() > VIP_NAME_LIMIT {
                debug!(len = name.len(), "vip addition with an overlong name");
                return Ok(None);
            }
            Session(Sess::AddVip { name })
        }
        client::VIP_REMOVE => Session(Sess::RemoveVip {
            character: r.get_u32()?,
        }),

        client::BUG_REPORT => Session(Sess::BugReport {
            text: r.get_string()?,
        }),
        client::DEBUG_ASSERT => {
            let assertion = r.get_string()?;
            let date = r.get_string()?;
            let description = r.get_string()?;
            let comment = r.get_string()?;
            Session(Sess::DebugReport {
                assertion,
                date,
                description,
                comment,
            })
        }
        client::QUEST_LOG => Session(Sess::RequestQuestLog),
        client::QUEST_INFO => Session(Sess::RequestQuestInfo {
            quest: r.get_u16()?,
        }),
        client::VIOLATION_REPORT => Session(Sess::ViolationReport),

        _ => return Err(TableError::Unknown),
    };
    Ok(Some(decoded))
}

fn is_hotkey(position: Position) -> bool {
    position.x == 0xFFFF && position.y == 0 && position.z == 0
}

fn decode_walk_path(r: &mut PacketReader<'_>) -> Result<Option<Vec<Direction>>, ReadError> {
    let count = r.get_u8()?;
    let mut path = Vec::with_capacity(usize::from(count).min(WALK_PATH_LIMIT));
    for _ in 0..count {
        let tag = r.get_u8()?;
        if path.len() >= WALK_PATH_LIMIT {
            continue;
        }
        match Direction::from_path_tag(tag) {
            Some(direction) => path.push(direction),
            None => debug!(tag, "auto-walk frame with an unmapped step tag"),
        }
    }
    if path.is_empty() {
        return Ok(None);
    }
    Ok(Some(path))
}

fn decode_say(r: &mut PacketReader<'_>) -> Result<Option<PlayerCommand>, ReadError> {
    let class_byte = r.get_u8()?;
    let Some(class) = MessageClass::from_byte(class_byte) else {
        debug!(class = class_byte, "say frame with an unmapped message class");
        return Ok(None);
    };

    let mut receiver = String::new();
    let mut channel = 0u16;
    if class.carries_receiver() {
        receiver = r.get_string()?;
    } else if class.carries_channel() {
        channel = r.get_u16()?;
    }

    let text = r.get_string()?;
    if text.len() > SPEAK_MAX_LENGTH {
        debug!(len = text.len(), "dropping an oversized chat message");
        return Ok(None);
    }

    Ok(Some(PlayerCommand::Say {
        class,
        channel,
        receiver,
        text,
    }))
}
