//! In-memory world, accounts, and chat for running the server standalone.
//!
//! A flat grass plain with a handful of built-in accounts and three public
//! chat channels. Enough to log in, walk around, talk, and exercise the
//! whole session layer without a storage backend or a real simulation.

use std::net::IpAddr;
use std::sync::Mutex;

use eldermoor_wire::MessageClass;
use eldermoor_world::snapshot::{
    CreatureView, ItemView, LightInfo, MountChoice, Outfit, OutfitChoice, PlayerStats, QuestLine,
    QuestMission, SKILL_COUNT, SkillSet, SkillView, TileView, creature_kind,
};
use eldermoor_world::{
    AccountDirectory, AccountId, AccountStatus, AuthError, BanRecord, ChannelInfo, CharacterId,
    CharacterRecord, ChatRegistry, Direction, GameWorld, LogoutDenied, PlacementError,
    PlayerCommand, Position, Privileges, Sanction, VipEntry, WorldEffect, WorldRunState, WorldView,
};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

/// Client id of the ground covering the plain.
const GRASS: u16 = 4526;
/// Tiles the plain extends from the spawn point in each direction.
const PLAIN_EXTENT: u16 = 25;
/// The whole demo lives on the surface floor.
const PLAIN_FLOOR: u8 = 7;

/// Speech carry, in tiles from the speaker.
const SAY_RANGE: (i32, i32) = (8, 6);
const WHISPER_RANGE: (i32, i32) = (1, 1);
const YELL_RANGE: (i32, i32) = (24, 18);

/// Stand-in character id for account-manager sessions.
const MANAGER_ID: u32 = 1000;

fn spawn_point() -> Position {
    Position::new(1000, 1000, PLAIN_FLOOR)
}

/// The built-in cast, shared by the directory and the chat name table.
/// Each account's password equals its login name.
fn roster() -> Vec<(AccountId, &'static str, CharacterRecord)> {
    vec![
        (
            AccountId(1),
            "demo",
            CharacterRecord {
                id: CharacterId(1),
                name: "Wanderer".to_string(),
                namelocked: false,
                premium: false,
                privileges: Privileges::default(),
            },
        ),
        (
            AccountId(2),
            "scout",
            CharacterRecord {
                id: CharacterId(2),
                name: "Rambler".to_string(),
                namelocked: false,
                premium: false,
                privileges: Privileges::default(),
            },
        ),
        (
            AccountId(3),
            "gamemaster",
            CharacterRecord {
                id: CharacterId(3),
                name: "Overseer".to_string(),
                namelocked: false,
                premium: true,
                privileges: Privileges {
                    gamemaster: true,
                    can_always_login: true,
                    can_logout_anytime: true,
                    can_report_bugs: true,
                },
            },
        ),
    ]
}

/// Log the built-in credentials so a fresh checkout is usable immediately.
pub fn announce_accounts() {
    for (_, login, record) in roster() {
        info!(
            "log in with account {login:?}, password {login:?}, character {:?}",
            record.name
        );
    }
}

// --- world ---

/// A flat grass plain hosting every logged-in character.
pub struct DemoWorld {
    spawn: Position,
    creatures: FxHashMap<u32, CreatureView>,
    positions: FxHashMap<u32, Position>,
    /// Who stands on each tile, arrival order, oldest first.
    standing: FxHashMap<Position, Vec<u32>>,
}

impl DemoWorld {
    pub fn new() -> Self {
        Self {
            spawn: spawn_point(),
            creatures: FxHashMap::default(),
            positions: FxHashMap::default(),
            standing: FxHashMap::default(),
        }
    }

    fn on_the_plain(&self, position: Position) -> bool {
        position.z == PLAIN_FLOOR
            && position.x.abs_diff(self.spawn.x) <= PLAIN_EXTENT
            && position.y.abs_diff(self.spawn.y) <= PLAIN_EXTENT
    }

    /// Wire stack index of a creature on its tile: ground is 0 and the
    /// newest arrival stands right above it.
    fn stack_of(&self, creature: u32, position: Position) -> u8 {
        let Some(list) = self.standing.get(&position) else {
            return 1;
        };
        match list.iter().position(|&id| id == creature) {
            Some(index) => 1 + (list.len() - 1 - index) as u8,
            None => 1,
        }
    }

    fn facing(&self, creature: u32) -> Direction {
        self.creatures
            .get(&creature)
            .map(|view| view.direction)
            .unwrap_or(Direction::South)
    }

    fn step(&mut self, creature: u32, direction: Direction) -> Vec<WorldEffect> {
        let Some(from) = self.positions.get(&creature).copied() else {
            return Vec::new();
        };
        let target = from.step(direction).filter(|to| self.on_the_plain(*to));
        let Some(to) = target else {
            return vec![WorldEffect::WalkCancelled {
                player: creature,
                direction: self.facing(creature),
            }];
        };

        let from_stack = self.stack_of(creature, from);
        if let Some(list) = self.standing.get_mut(&from) {
            list.retain(|&id| id != creature);
        }
        self.standing.entry(to).or_default().push(creature);
        self.positions.insert(creature, to);
        if let Some(view) = self.creatures.get_mut(&creature) {
            // Diagonal steps keep the previous facing, as the client does.
            if let Direction::North | Direction::East | Direction::South | Direction::West =
                direction
            {
                view.direction = direction;
            }
        }

        vec![WorldEffect::CreatureMoved {
            creature,
            from,
            from_stack,
            to,
            to_stack: 1,
            teleported: false,
        }]
    }

    fn speech(&self, creature: u32, class: MessageClass, text: String) -> Vec<WorldEffect> {
        let Some(position) = self.positions.get(&creature).copied() else {
            return Vec::new();
        };
        let Some(view) = self.creatures.get(&creature) else {
            return Vec::new();
        };

        let (range_x, range_y) = match class {
            MessageClass::Whisper => WHISPER_RANGE,
            MessageClass::Yell => YELL_RANGE,
            _ => SAY_RANGE,
        };
        let hearers = self
            .positions
            .iter()
            .filter(|(_, standing)| {
                standing.z == position.z
                    && (standing.x as i32 - position.x as i32).abs() <= range_x
                    && (standing.y as i32 - position.y as i32).abs() <= range_y
            })
            .map(|(&id, _)| id)
            .collect();
        let text = if class == MessageClass::Yell {
            text.to_uppercase()
        } else {
            text
        };

        vec![WorldEffect::Speech {
            speaker: creature,
            name: view.name.clone(),
            level: view.level,
            class,
            channel: 0,
            text,
            position: Some(position),
            hearers,
        }]
    }

    fn describe(&self, creature: u32, position: Position) -> Vec<WorldEffect> {
        let top = self
            .standing
            .get(&position)
            .and_then(|list| list.last())
            .and_then(|id| self.creatures.get(id).map(|view| (*id, view)));
        let text = match top {
            Some((id, _)) if id == creature => "You see yourself.".to_string(),
            Some((_, view)) => format!("You see {}.", view.name),
            None if self.on_the_plain(position) => "You see a patch of grass.".to_string(),
            None => "You see nothing special.".to_string(),
        };
        vec![WorldEffect::TextFor {
            player: creature,
            class: MessageClass::Info,
            text,
            position: None,
            details: None,
        }]
    }

    fn peaceful_refusal(&self, creature: u32) -> Vec<WorldEffect> {
        vec![
            WorldEffect::TextFor {
                player: creature,
                class: MessageClass::StatusSmall,
                text: "This is a peaceful place.".to_string(),
                position: None,
                details: None,
            },
            WorldEffect::TargetCancelled { player: creature },
        ]
    }
}

impl Default for DemoWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn newcomer(record: &CharacterRecord) -> CreatureView {
    CreatureView {
        id: record.id.0,
        name: record.name.clone(),
        kind: creature_kind::PLAYER,
        health_percent: 100,
        direction: Direction::South,
        outfit: Outfit {
            look_type: 128,
            head: 78,
            body: 69,
            legs: 58,
            feet: 76,
            addons: 0,
            mount: 0,
            item_disguise: 0,
        },
        light: LightInfo { level: 0, color: 0 },
        speed: 220,
        skull: 0,
        party_shield: 0,
        guild_emblem: 0,
        blocks_path: true,
        level: 8,
    }
}

impl WorldView for DemoWorld {
    fn run_state(&self) -> WorldRunState {
        WorldRunState::Open
    }

    fn tile(&self, position: Position) -> Option<TileView> {
        if !self.on_the_plain(position) {
            return None;
        }
        Some(TileView {
            ground: Some(ItemView::plain(GRASS)),
            creatures: self.standing.get(&position).cloned().unwrap_or_default(),
            ..TileView::default()
        })
    }

    fn creature(&self, id: u32) -> Option<CreatureView> {
        self.creatures.get(&id).cloned()
    }

    fn creature_position(&self, id: u32) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    fn world_light(&self) -> LightInfo {
        LightInfo {
            level: 250,
            color: 215,
        }
    }

    fn players_online(&self) -> u32 {
        self.creatures.len() as u32
    }

    fn is_character_online(&self, id: CharacterId) -> bool {
        self.positions.contains_key(&id.0)
    }

    fn can_observe(&self, _observer: u32, _target: u32) -> bool {
        true
    }

    fn player_stats(&self, id: u32) -> Option<PlayerStats> {
        let view = self.creatures.get(&id)?;
        Some(PlayerStats {
            health: 185,
            max_health: 185,
            free_capacity: 42_000,
            capacity: 47_000,
            experience: 4200,
            level: view.level,
            level_percent: 40,
            mana: 90,
            max_mana: 90,
            magic_level: 1,
            base_magic_level: 1,
            magic_level_percent: 0,
            soul: 100,
            stamina_minutes: 2520,
            speed: view.speed,
            regeneration_secs: 0,
        })
    }

    fn player_skills(&self, id: u32) -> Option<SkillSet> {
        self.creatures.contains_key(&id).then(|| {
            [SkillView {
                level: 10,
                base: 10,
                percent: 0,
            }; SKILL_COUNT]
        })
    }

    fn equipment_item(&self, _id: u32, _slot: u8) -> Option<ItemView> {
        None
    }

    fn player_icons(&self, _id: u32) -> u16 {
        0
    }

    fn outfit_choices(&self, id: u32) -> Vec<OutfitChoice> {
        if !self.creatures.contains_key(&id) {
            return Vec::new();
        }
        [
            (128, "Citizen"),
            (129, "Hunter"),
            (130, "Mage"),
            (131, "Knight"),
        ]
        .into_iter()
        .map(|(look_type, name)| OutfitChoice {
            look_type,
            name: name.to_string(),
            addons: 0,
        })
        .collect()
    }

    fn mount_choices(&self, _id: u32) -> Vec<MountChoice> {
        Vec::new()
    }

    fn quest_log(&self, _id: u32) -> Vec<QuestLine> {
        vec![QuestLine {
            id: 1,
            name: "The Greenfields".to_string(),
            completed: false,
        }]
    }

    fn quest_missions(&self, _id: u32, quest: u16) -> Option<Vec<QuestMission>> {
        (quest == 1).then(|| {
            vec![QuestMission {
                name: "A Quiet Beginning".to_string(),
                description: "Walk the plain and find the others.".to_string(),
            }]
        })
    }
}

impl GameWorld for DemoWorld {
    fn enter_world(
        &mut self,
        record: &CharacterRecord,
    ) -> Result<Vec<WorldEffect>, PlacementError> {
        let id = record.id.0;
        if self.creatures.contains_key(&id) {
            return Err(PlacementError::AlreadyPresent);
        }
        let position = self.spawn;
        self.creatures.insert(id, newcomer(record));
        self.positions.insert(id, position);
        self.standing.entry(position).or_default().push(id);
        Ok(vec![WorldEffect::CreatureAppeared {
            creature: id,
            position,
            stack: 1,
        }])
    }

    fn leave_world(
        &mut self,
        creature: u32,
        _forced: bool,
    ) -> Result<Vec<WorldEffect>, LogoutDenied> {
        // No combat on the plain, so logout is never refused.
        let Some(position) = self.positions.remove(&creature) else {
            return Ok(Vec::new());
        };
        let stack = self.stack_of(creature, position);
        self.creatures.remove(&creature);
        if let Some(list) = self.standing.get_mut(&position) {
            list.retain(|&id| id != creature);
        }
        Ok(vec![WorldEffect::CreatureVanished {
            creature,
            position,
            stack,
        }])
    }

    fn handle_command(&mut self, creature: u32, command: PlayerCommand) -> Vec<WorldEffect> {
        match command {
            PlayerCommand::Walk(direction) => self.step(creature, direction),
            PlayerCommand::WalkPath(path) => {
                let mut effects = Vec::new();
                for direction in path {
                    let step = self.step(creature, direction);
                    let cancelled = step
                        .iter()
                        .any(|effect| matches!(effect, WorldEffect::WalkCancelled { .. }));
                    effects.extend(step);
                    if cancelled {
                        break;
                    }
                }
                effects
            }
            PlayerCommand::Turn(direction) => {
                let Some(position) = self.positions.get(&creature).copied() else {
                    return Vec::new();
                };
                let stack = self.stack_of(creature, position);
                if let Some(view) = self.creatures.get_mut(&creature) {
                    view.direction = direction;
                }
                vec![WorldEffect::CreatureTurned {
                    creature,
                    position,
                    stack,
                    direction,
                }]
            }
            PlayerCommand::Say { class, text, .. } => self.speech(creature, class, text),
            PlayerCommand::Look { position, .. } => self.describe(creature, position),
            PlayerCommand::SetOutfit(outfit) => {
                let Some(view) = self.creatures.get_mut(&creature) else {
                    return Vec::new();
                };
                view.outfit = outfit;
                vec![WorldEffect::OutfitChanged {
                    creature,
                    outfit: view.outfit,
                }]
            }
            PlayerCommand::Attack { target } | PlayerCommand::Follow { target } if target != 0 => {
                self.peaceful_refusal(creature)
            }
            // Everything else has nothing to act on out here.
            _ => Vec::new(),
        }
    }
}

// --- account directory ---

/// Built-in accounts; sanctions and warnings live only for the process.
pub struct DemoDirectory {
    accounts: FxHashMap<String, (AccountId, String)>,
    characters: Vec<(AccountId, CharacterRecord)>,
    vip: Mutex<Vec<(AccountId, CharacterId)>>,
    warnings: Mutex<FxHashMap<u32, u32>>,
}

impl DemoDirectory {
    pub fn new() -> Self {
        let mut accounts = FxHashMap::default();
        let mut characters = Vec::new();
        for (id, login, record) in roster() {
            accounts.insert(login.to_string(), (id, login.to_string()));
            characters.push((id, record));
        }
        Self {
            accounts,
            characters,
            vip: Mutex::new(Vec::new()),
            warnings: Mutex::new(FxHashMap::default()),
        }
    }
}

impl Default for DemoDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for DemoDirectory {
    fn authenticate(&self, account: &str, password: &str) -> Result<AccountId, AuthError> {
        let (id, stored) = self
            .accounts
            .get(account)
            .ok_or(AuthError::UnknownAccount)?;
        if stored != password {
            return Err(AuthError::WrongPassword);
        }
        Ok(*id)
    }

    fn ip_banished(&self, _ip: IpAddr) -> bool {
        false
    }

    fn account_status(&self, _id: AccountId) -> AccountStatus {
        AccountStatus::Active
    }

    fn character(&self, account: AccountId, name: &str) -> Option<CharacterRecord> {
        self.characters
            .iter()
            .find(|(owner, record)| *owner == account && record.name.eq_ignore_ascii_case(name))
            .map(|(_, record)| record.clone())
    }

    fn character_ban(&self, _character: CharacterId) -> Option<BanRecord> {
        None
    }

    fn find_character(&self, name: &str) -> Option<VipEntry> {
        self.characters
            .iter()
            .find(|(_, record)| record.name.eq_ignore_ascii_case(name))
            .map(|(_, record)| VipEntry {
                id: record.id,
                name: record.name.clone(),
            })
    }

    fn manager_character(&self) -> Option<CharacterRecord> {
        Some(CharacterRecord {
            id: CharacterId(MANAGER_ID),
            name: "Account Manager".to_string(),
            namelocked: false,
            premium: false,
            privileges: Privileges::default(),
        })
    }

    fn vip_list(&self, account: AccountId) -> Vec<VipEntry> {
        let vip = self.vip.lock().unwrap();
        vip.iter()
            .filter(|(owner, _)| *owner == account)
            .filter_map(|(_, character)| {
                self.characters
                    .iter()
                    .find(|(_, record)| record.id == *character)
                    .map(|(_, record)| VipEntry {
                        id: record.id,
                        name: record.name.clone(),
                    })
            })
            .collect()
    }

    fn vip_store(&self, account: AccountId, character: CharacterId) -> bool {
        let mut vip = self.vip.lock().unwrap();
        if vip.contains(&(account, character)) {
            return false;
        }
        vip.push((account, character));
        true
    }

    fn vip_erase(&self, account: AccountId, character: CharacterId) {
        self.vip
            .lock()
            .unwrap()
            .retain(|entry| *entry != (account, character));
    }

    fn note_warning(&self, id: AccountId) -> u32 {
        let mut warnings = self.warnings.lock().unwrap();
        let count = warnings.entry(id.0).or_insert(0);
        *count += 1;
        *count
    }

    fn apply_sanction(&self, id: AccountId, sanction: Sanction, reason: &str) {
        // Nothing durable behind the demo; the sanction only makes the log.
        warn!(account = id.0, ?sanction, reason, "sanction recorded");
    }
}

// --- chat ---

const GOSSIP: u16 = 1;
const TRADE: u16 = 2;
const HELP: u16 = 3;
/// Conversation channels get ids from here up.
const FIRST_PRIVATE: u16 = 0xA0;

struct PrivateRoom {
    owner: u32,
    name: String,
}

struct ChatRooms {
    members: FxHashMap<u16, Vec<u32>>,
    invites: FxHashMap<u16, Vec<u32>>,
    private: FxHashMap<u16, PrivateRoom>,
    next_private: u16,
}

/// Three public channels plus player-owned conversation channels.
pub struct DemoChat {
    public: Vec<ChannelInfo>,
    names: FxHashMap<u32, String>,
    state: Mutex<ChatRooms>,
}

impl DemoChat {
    pub fn new() -> Self {
        let public = [(GOSSIP, "Gossip"), (TRADE, "Trade"), (HELP, "Help")]
            .into_iter()
            .map(|(id, name)| ChannelInfo {
                id,
                name: name.to_string(),
            })
            .collect();
        let names = roster()
            .into_iter()
            .map(|(_, _, record)| (record.id.0, record.name))
            .collect();
        Self {
            public,
            names,
            state: Mutex::new(ChatRooms {
                members: FxHashMap::default(),
                invites: FxHashMap::default(),
                private: FxHashMap::default(),
                next_private: FIRST_PRIVATE,
            }),
        }
    }

    fn named(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.names.get(id).cloned())
            .collect()
    }

    fn owned_room(rooms: &ChatRooms, owner: u32) -> Option<u16> {
        rooms
            .private
            .iter()
            .find(|(_, room)| room.owner == owner)
            .map(|(&id, _)| id)
    }
}

impl Default for DemoChat {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatRegistry for DemoChat {
    fn channels_for(&self, player: CharacterId) -> Vec<ChannelInfo> {
        let rooms = self.state.lock().unwrap();
        let mut list = self.public.clone();
        if let Some(id) = Self::owned_room(&rooms, player.0) {
            if let Some(room) = rooms.private.get(&id) {
                list.push(ChannelInfo {
                    id,
                    name: room.name.clone(),
                });
            }
        }
        list
    }

    fn open_channel(
        &self,
        channel: u16,
        player: CharacterId,
    ) -> Option<(String, Vec<String>, Vec<String>)> {
        let mut rooms = self.state.lock().unwrap();

        if let Some(info) = self.public.iter().find(|info| info.id == channel) {
            let members = rooms.members.entry(channel).or_default();
            if !members.contains(&player.0) {
                members.push(player.0);
            }
            // Public channels show no rosters.
            return Some((info.name.clone(), Vec::new(), Vec::new()));
        }

        let room = rooms.private.get(&channel)?;
        let invited = rooms
            .invites
            .get(&channel)
            .is_some_and(|list| list.contains(&player.0));
        if room.owner != player.0 && !invited {
            return None;
        }
        let name = room.name.clone();

        let members = rooms.members.entry(channel).or_default();
        if !members.contains(&player.0) {
            members.push(player.0);
        }
        let member_names = self.named(members);
        let invite_names =
            self.named(rooms.invites.get(&channel).map_or(&[][..], |list| list.as_slice()));
        Some((name, member_names, invite_names))
    }

    fn channel_members(&self, channel: u16, speaker: CharacterId) -> Option<Vec<CharacterId>> {
        let rooms = self.state.lock().unwrap();
        let members = rooms.members.get(&channel)?;
        if !members.contains(&speaker.0) {
            return None;
        }
        Some(members.iter().map(|&id| CharacterId(id)).collect())
    }

    fn remove_from_all(&self, player: CharacterId) {
        let mut rooms = self.state.lock().unwrap();
        for members in rooms.members.values_mut() {
            members.retain(|&id| id != player.0);
        }
    }

    fn create_private(&self, owner: CharacterId, owner_name: &str) -> Option<ChannelInfo> {
        let mut rooms = self.state.lock().unwrap();
        if let Some(id) = Self::owned_room(&rooms, owner.0) {
            let name = rooms.private[&id].name.clone();
            return Some(ChannelInfo { id, name });
        }

        let id = rooms.next_private;
        rooms.next_private += 1;
        let name = format!("{owner_name}'s Channel");
        rooms.private.insert(
            id,
            PrivateRoom {
                owner: owner.0,
                name: name.clone(),
            },
        );
        rooms.members.insert(id, vec![owner.0]);
        Some(ChannelInfo { id, name })
    }

    fn invite(&self, owner: CharacterId, target: CharacterId) -> Option<u16> {
        let mut rooms = self.state.lock().unwrap();
        let id = Self::owned_room(&rooms, owner.0)?;
        if target == owner {
            return None;
        }
        let invites = rooms.invites.entry(id).or_default();
        if !invites.contains(&target.0) {
            invites.push(target.0);
        }
        Some(id)
    }

    fn exclude(&self, owner: CharacterId, target: CharacterId) -> Option<u16> {
        let mut rooms = self.state.lock().unwrap();
        let id = Self::owned_room(&rooms, owner.0)?;
        if let Some(invites) = rooms.invites.get_mut(&id) {
            invites.retain(|&who| who != target.0);
        }
        if let Some(members) = rooms.members.get_mut(&id) {
            members.retain(|&who| who != target.0);
        }
        Some(id)
    }

    fn leave(&self, player: CharacterId, channel: u16) -> Vec<CharacterId> {
        let mut rooms = self.state.lock().unwrap();
        let rooms = &mut *rooms;
        let Some(members) = rooms.members.get_mut(&channel) else {
            return Vec::new();
        };
        members.retain(|&id| id != player.0);

        let owned = rooms
            .private
            .get(&channel)
            .is_some_and(|room| room.owner == player.0);
        if owned {
            let remaining = members.iter().map(|&id| CharacterId(id)).collect();
            rooms.members.remove(&channel);
            rooms.invites.remove(&channel);
            rooms.private.remove(&channel);
            return remaining;
        }
        Vec::new()
    }
}
