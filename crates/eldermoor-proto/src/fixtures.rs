//! In-memory stand-ins for the capability seams, shared by the crate's
//! tests. State that outlives a move into the engine sits behind `Arc` so a
//! test can keep a handle and inspect it afterwards.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use eldermoor_world::snapshot::creature_kind;
use eldermoor_world::{
    AccountDirectory, AccountId, AccountStatus, AuthError, BanRecord, ChannelInfo, CharacterId,
    CharacterRecord, ChatRegistry, CreatureView, Direction, GameWorld, ItemView, LightInfo,
    LogoutDenied, MountChoice, Outfit, OutfitChoice, PlacementError, PlayerCommand, PlayerStats,
    Position, Privileges, QuestLine, QuestMission, Sanction, SkillSet, TileView, VipEntry,
    WorldEffect, WorldRunState, WorldView,
};

use crate::sink::{FrameSink, LoginGate, SinkClosed};

// --- world ---

/// A plausible player snapshot for tests that only care about identity.
pub fn player_view(id: u32, name: &str) -> CreatureView {
    CreatureView {
        id,
        name: name.to_string(),
        kind: creature_kind::PLAYER,
        health_percent: 100,
        direction: Direction::South,
        outfit: Outfit {
            look_type: 128,
            ..Outfit::default()
        },
        light: LightInfo::default(),
        speed: 220,
        skull: 0,
        party_shield: 0,
        guild_emblem: 0,
        blocks_path: true,
        level: 8,
    }
}

pub fn character_record(id: u32, name: &str) -> CharacterRecord {
    CharacterRecord {
        id: CharacterId(id),
        name: name.to_string(),
        namelocked: false,
        premium: false,
        privileges: Privileges::default(),
    }
}

/// Mutable half of [`FakeWorld`], kept behind a handle.
#[derive(Default)]
pub struct FakeWorldState {
    pub creatures: HashMap<u32, CreatureView>,
    pub positions: HashMap<u32, Position>,
    /// Commands the engine forwarded into the simulation.
    pub commands: Vec<(u32, PlayerCommand)>,
}

pub struct FakeWorld {
    pub run: WorldRunState,
    pub light: LightInfo,
    /// Where entering characters are placed.
    pub start: Position,
    pub placement_fails: bool,
    /// Creatures whose unforced logout is refused.
    pub no_logout: Vec<u32>,
    pub tiles: HashMap<Position, TileView>,
    pub equipment: HashMap<(u32, u8), ItemView>,
    pub icons: u16,
    pub outfits: Vec<OutfitChoice>,
    pub mounts: Vec<MountChoice>,
    pub quests: Vec<QuestLine>,
    pub missions: HashMap<u16, Vec<QuestMission>>,
    pub state: Arc<Mutex<FakeWorldState>>,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self {
            run: WorldRunState::Open,
            light: LightInfo {
                level: 250,
                color: 215,
            },
            start: Position::new(100, 100, 7),
            placement_fails: false,
            no_logout: Vec::new(),
            tiles: HashMap::new(),
            equipment: HashMap::new(),
            icons: 0,
            outfits: Vec::new(),
            mounts: Vec::new(),
            quests: Vec::new(),
            missions: HashMap::new(),
            state: Arc::default(),
        }
    }

    pub fn put_player(&mut self, id: u32, name: &str, pos: Position) {
        let mut state = self.state.lock().unwrap();
        state.creatures.insert(id, player_view(id, name));
        state.positions.insert(id, pos);
    }

    pub fn put_tile(&mut self, pos: Position, tile: TileView) {
        self.tiles.insert(pos, tile);
    }
}

impl WorldView for FakeWorld {
    fn run_state(&self) -> WorldRunState {
        self.run
    }

    fn tile(&self, pos: Position) -> Option<TileView> {
        self.tiles.get(&pos).cloned()
    }

    fn creature(&self, id: u32) -> Option<CreatureView> {
        self.state.lock().unwrap().creatures.get(&id).cloned()
    }

    fn creature_position(&self, id: u32) -> Option<Position> {
        self.state.lock().unwrap().positions.get(&id).copied()
    }

    fn world_light(&self) -> LightInfo {
        self.light
    }

    fn players_online(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state
            .creatures
            .values()
            .filter(|view| view.kind == creature_kind::PLAYER)
            .count() as u32
    }

    fn is_character_online(&self, id: CharacterId) -> bool {
        self.state.lock().unwrap().creatures.contains_key(&id.0)
    }

    fn can_observe(&self, _observer: u32, _target: u32) -> bool {
        true
    }

    fn player_stats(&self, id: u32) -> Option<PlayerStats> {
        self.state
            .lock()
            .unwrap()
            .creatures
            .contains_key(&id)
            .then(PlayerStats::default)
    }

    fn player_skills(&self, id: u32) -> Option<SkillSet> {
        self.state
            .lock()
            .unwrap()
            .creatures
            .contains_key(&id)
            .then(SkillSet::default)
    }

    fn equipment_item(&self, id: u32, slot: u8) -> Option<ItemView> {
        self.equipment.get(&(id, slot)).cloned()
    }

    fn player_icons(&self, _id: u32) -> u16 {
        self.icons
    }

    fn outfit_choices(&self, _id: u32) -> Vec<OutfitChoice> {
        self.outfits.clone()
    }

    fn mount_choices(&self, _id: u32) -> Vec<MountChoice> {
        self.mounts.clone()
    }

    fn quest_log(&self, _id: u32) -> Vec<QuestLine> {
        self.quests.clone()
    }

    fn quest_missions(&self, _id: u32, quest: u16) -> Option<Vec<QuestMission>> {
        self.missions.get(&quest).cloned()
    }
}

impl GameWorld for FakeWorld {
    fn enter_world(
        &mut self,
        record: &CharacterRecord,
    ) -> Result<Vec<WorldEffect>, PlacementError> {
        if self.placement_fails {
            return Err(PlacementError::Blocked);
        }
        let id = record.id.0;
        let mut state = self.state.lock().unwrap();
        state.creatures.insert(id, player_view(id, &record.name));
        state.positions.insert(id, self.start);
        Ok(vec![WorldEffect::CreatureAppeared {
            creature: id,
            position: self.start,
            stack: 1,
        }])
    }

    fn leave_world(
        &mut self,
        creature: u32,
        forced: bool,
    ) -> Result<Vec<WorldEffect>, LogoutDenied> {
        if !forced && self.no_logout.contains(&creature) {
            return Err(LogoutDenied(
                "You may not logout during or immediately after a fight!".into(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        state.creatures.remove(&creature);
        let position = state.positions.remove(&creature).unwrap_or(self.start);
        Ok(vec![WorldEffect::CreatureVanished {
            creature,
            position,
            stack: 1,
        }])
    }

    fn handle_command(&mut self, creature: u32, command: PlayerCommand) -> Vec<WorldEffect> {
        self.state.lock().unwrap().commands.push((creature, command));
        Vec::new()
    }
}

// --- account directory ---

#[derive(Default)]
pub struct DirectoryState {
    pub warnings: HashMap<u32, u32>,
    pub sanctions: Vec<(u32, Sanction, String)>,
    /// (account, character) pairs on VIP lists.
    pub vip: Vec<(u32, u32)>,
}

pub struct FakeAccounts {
    /// Account name to (id, password).
    pub accounts: HashMap<String, (u32, String)>,
    /// Character name to (owning account id, record).
    pub characters: HashMap<String, (u32, CharacterRecord)>,
    pub banned_ips: Vec<IpAddr>,
    pub statuses: HashMap<u32, AccountStatus>,
    pub char_bans: HashMap<u32, BanRecord>,
    pub manager: Option<CharacterRecord>,
    pub state: Arc<Mutex<DirectoryState>>,
}

impl FakeAccounts {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            characters: HashMap::new(),
            banned_ips: Vec::new(),
            statuses: HashMap::new(),
            char_bans: HashMap::new(),
            manager: None,
            state: Arc::default(),
        }
    }

    pub fn add_account(&mut self, name: &str, password: &str, id: u32) {
        self.accounts
            .insert(name.to_string(), (id, password.to_string()));
    }

    pub fn add_character(&mut self, account: u32, record: CharacterRecord) {
        self.characters
            .insert(record.name.clone(), (account, record));
    }
}

impl AccountDirectory for FakeAccounts {
    fn authenticate(&self, account: &str, password: &str) -> Result<AccountId, AuthError> {
        match self.accounts.get(account) {
            Some((id, stored)) if stored == password => Ok(AccountId(*id)),
            Some(_) => Err(AuthError::WrongPassword),
            None => Err(AuthError::UnknownAccount),
        }
    }

    fn ip_banished(&self, ip: IpAddr) -> bool {
        self.banned_ips.contains(&ip)
    }

    fn account_status(&self, id: AccountId) -> AccountStatus {
        self.statuses
            .get(&id.0)
            .cloned()
            .unwrap_or(AccountStatus::Active)
    }

    fn character(&self, account: AccountId, name: &str) -> Option<CharacterRecord> {
        let (owner, record) = self.characters.get(name)?;
        (*owner == account.0).then(|| record.clone())
    }

    fn character_ban(&self, character: CharacterId) -> Option<BanRecord> {
        self.char_bans.get(&character.0).cloned()
    }

    fn find_character(&self, name: &str) -> Option<VipEntry> {
        self.characters.values().find_map(|(_, record)| {
            record.name.eq_ignore_ascii_case(name).then(|| VipEntry {
                id: record.id,
                name: record.name.clone(),
            })
        })
    }

    fn manager_character(&self) -> Option<CharacterRecord> {
        self.manager.clone()
    }

    fn vip_list(&self, account: AccountId) -> Vec<VipEntry> {
        let state = self.state.lock().unwrap();
        state
            .vip
            .iter()
            .filter(|(owner, _)| *owner == account.0)
            .map(|(_, character)| {
                let name = self
                    .characters
                    .values()
                    .find(|(_, record)| record.id.0 == *character)
                    .map(|(_, record)| record.name.clone())
                    .unwrap_or_default();
                VipEntry {
                    id: CharacterId(*character),
                    name,
                }
            })
            .collect()
    }

    fn vip_store(&self, account: AccountId, character: CharacterId) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.vip.contains(&(account.0, character.0)) {
            return false;
        }
        state.vip.push((account.0, character.0));
        true
    }

    fn vip_erase(&self, account: AccountId, character: CharacterId) {
        self.state
            .lock()
            .unwrap()
            .vip
            .retain(|&(owner, entry)| owner != account.0 || entry != character.0);
    }

    fn note_warning(&self, id: AccountId) -> u32 {
        let mut state = self.state.lock().unwrap();
        let count = state.warnings.entry(id.0).or_insert(0);
        *count += 1;
        *count
    }

    fn apply_sanction(&self, id: AccountId, sanction: Sanction, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .sanctions
            .push((id.0, sanction, reason.to_string()));
    }
}

// --- chat ---

#[derive(Default)]
pub struct ChatState {
    pub members: HashMap<u16, Vec<u32>>,
    pub invites: HashMap<u16, Vec<u32>>,
    /// Conversation channel to its owner.
    pub owners: HashMap<u16, u32>,
    pub next_private: u16,
}

pub struct FakeChat {
    /// Channels every player may list and open.
    pub channels: Vec<ChannelInfo>,
    pub state: Arc<Mutex<ChatState>>,
}

impl FakeChat {
    pub fn new() -> Self {
        let state = ChatState {
            next_private: 100,
            ..ChatState::default()
        };
        Self {
            channels: Vec::new(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_channel(mut self, id: u16, name: &str) -> Self {
        self.channels.push(ChannelInfo {
            id,
            name: name.to_string(),
        });
        self
    }
}

impl ChatRegistry for FakeChat {
    fn channels_for(&self, _player: CharacterId) -> Vec<ChannelInfo> {
        self.channels.clone()
    }

    fn open_channel(
        &self,
        channel: u16,
        player: CharacterId,
    ) -> Option<(String, Vec<String>, Vec<String>)> {
        let info = self.channels.iter().find(|info| info.id == channel)?;
        let mut state = self.state.lock().unwrap();
        let members = state.members.entry(channel).or_default();
        if !members.contains(&player.0) {
            members.push(player.0);
        }
        Some((info.name.clone(), Vec::new(), Vec::new()))
    }

    fn channel_members(&self, channel: u16, speaker: CharacterId) -> Option<Vec<CharacterId>> {
        let state = self.state.lock().unwrap();
        let members = state.members.get(&channel)?;
        members.contains(&speaker.0).then(|| {
            members.iter().map(|&id| CharacterId(id)).collect()
        })
    }

    fn remove_from_all(&self, player: CharacterId) {
        let mut state = self.state.lock().unwrap();
        for members in state.members.values_mut() {
            members.retain(|&id| id != player.0);
        }
    }

    fn create_private(&self, owner: CharacterId, owner_name: &str) -> Option<ChannelInfo> {
        let mut state = self.state.lock().unwrap();
        if let Some((&id, _)) = state.owners.iter().find(|&(_, &who)| who == owner.0) {
            return Some(ChannelInfo {
                id,
                name: format!("{owner_name}'s Channel"),
            });
        }
        let id = state.next_private;
        state.next_private += 1;
        state.owners.insert(id, owner.0);
        state.members.insert(id, vec![owner.0]);
        Some(ChannelInfo {
            id,
            name: format!("{owner_name}'s Channel"),
        })
    }

    fn invite(&self, owner: CharacterId, target: CharacterId) -> Option<u16> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .owners
            .iter()
            .find(|&(_, &who)| who == owner.0)
            .map(|(&id, _)| id)?;
        let invites = state.invites.entry(channel).or_default();
        if !invites.contains(&target.0) {
            invites.push(target.0);
        }
        Some(channel)
    }

    fn exclude(&self, owner: CharacterId, target: CharacterId) -> Option<u16> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .owners
            .iter()
            .find(|&(_, &who)| who == owner.0)
            .map(|(&id, _)| id)?;
        if let Some(invites) = state.invites.get_mut(&channel) {
            invites.retain(|&id| id != target.0);
        }
        if let Some(members) = state.members.get_mut(&channel) {
            members.retain(|&id| id != target.0);
        }
        Some(channel)
    }

    fn leave(&self, player: CharacterId, channel: u16) -> Vec<CharacterId> {
        let mut state = self.state.lock().unwrap();
        if let Some(members) = state.members.get_mut(&channel) {
            members.retain(|&id| id != player.0);
        }
        if state.owners.get(&channel) == Some(&player.0) {
            // The owner leaving dissolves the conversation channel.
            state.owners.remove(&channel);
            let remaining = state
                .members
                .remove(&channel)
                .unwrap_or_default()
                .into_iter()
                .map(CharacterId)
                .collect();
            state.invites.remove(&channel);
            return remaining;
        }
        Vec::new()
    }
}

// --- connection side ---

/// Frame sink that stores delivered batches for inspection.
pub struct CaptureSink {
    outbox: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl CaptureSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            outbox: Arc::clone(&outbox),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (sink, outbox)
    }

    /// Handle that turns true once the engine asked the connection to close.
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl FrameSink for CaptureSink {
    fn deliver(&self, payload: Vec<u8>) -> Result<(), SinkClosed> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SinkClosed);
        }
        self.outbox.lock().unwrap().push(payload);
        Ok(())
    }

    fn request_close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

pub struct NoopGate;

impl LoginGate for NoopGate {
    fn note_success(&self, _peer: IpAddr) {}
}
