//! The game engine loop: one consumer draining the task queue, owning every
//! session and the capability handles into the simulation.
//!
//! Connection tasks never touch game state. They decode frames into
//! [`GameTask`] values and push them here; the engine applies each task,
//! writes replies into the affected sessions, and flushes the batches back
//! through each session's [`FrameSink`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eldermoor_dispatch::{PeriodicRegistry, Scheduler, TaskReceiver, TimerId};
use eldermoor_wire::message::channel_event;
use eldermoor_wire::opcode::effect;
use eldermoor_wire::{BufferPool, MessageClass};
use eldermoor_world::{
    AccountDirectory, AccountId, AccountStatus, AuthError, CharacterId, CharacterRecord,
    ChatRegistry, Direction, GameWorld, Outfit, PlayerCommand, Position, Sanction, WorldEffect,
    WorldRunState, WorldView,
};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::inbound::{Decoded, FirstPacket, SessionCommand};
use crate::login::{self, BanScope};
use crate::map_view::ViewEncoder;
use crate::outbound;
use crate::policy::SessionPolicy;
use crate::session::{ClientSession, SessionId, SessionState};
use crate::sink::{FrameSink, LoginGate};
use crate::waitlist::WaitingList;

/// Interval between keep-alive pings to playing sessions.
const PING_INTERVAL: Duration = Duration::from_secs(5);
/// A playing session silent for this long is kicked, fights permitting.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace between pushing out a replaced connection and rebinding the
/// character to its replacement.
const RECONNECT_DELAY: Duration = Duration::from_millis(1000);
/// Delay between the escalation farewell and the kick that follows it.
const ESCALATION_KICK_DELAY: Duration = Duration::from_millis(1000);
/// Interval between waiting-list sweeps for entries that stopped retrying.
const WAITLIST_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Outbound buffers the pool keeps warm between flushes.
const POOL_RETAINED: usize = 64;
/// Starting capacity of a fresh outbound buffer.
const BATCH_CAPACITY: usize = 4096;

/// Reason recorded with sanctions from the unknown-opcode ladder.
const UNKNOWN_OPCODE_REASON: &str = "Sending unknown packets to the server.";

const TICK_WORLD: &str = "world";
const TICK_PING: &str = "ping";
const TICK_WAITLIST: &str = "waitlist";

/// One unit of work for the game thread.
pub enum GameTask {
    /// A connection finished the transport handshake and can be addressed.
    SessionOpened {
        session: SessionId,
        peer: SocketAddr,
        sink: Box<dyn FrameSink>,
    },
    /// The connection's first frame, carrying the credentials.
    LoginRequest {
        session: SessionId,
        handshake: FirstPacket,
    },
    /// A decoded in-game frame.
    Command { session: SessionId, decoded: Decoded },
    /// A frame whose opcode is outside the protocol table.
    UnknownOpcode { session: SessionId, opcode: u8 },
    /// The connection dropped, or finished closing after we asked it to.
    Disconnected { session: SessionId },
    /// A replacing login waited out its grace period.
    ReconnectDue { creature: u32 },
    /// The delayed kick scheduled by the escalation ladder.
    KickDue { session: SessionId },
    /// Recurring upkeep: world think, pings, waiting-list sweep.
    Think,
    /// Stop the engine loop.
    Shutdown,
}

/// A replaced character waiting for its new session to take over.
pub(crate) struct PendingReconnect {
    timer: TimerId,
    pub(crate) session: SessionId,
}

/// Owner of all sessions and the single consumer of the game queue.
pub struct GameEngine {
    pub(crate) world: Box<dyn GameWorld>,
    pub(crate) directory: Box<dyn AccountDirectory>,
    pub(crate) chat: Box<dyn ChatRegistry>,
    pub(crate) policy: SessionPolicy,
    pub(crate) gate: Arc<dyn LoginGate>,
    pub(crate) tasks: TaskReceiver<GameTask>,
    pub(crate) scheduler: Scheduler<GameTask>,
    pub(crate) pool: BufferPool,
    pub(crate) periodic: PeriodicRegistry,
    pub(crate) sessions: FxHashMap<SessionId, ClientSession>,
    /// Creature id to the session it is bound to.
    pub(crate) by_creature: FxHashMap<u32, SessionId>,
    /// Creature id to owning account, for every character in the world.
    /// Orphaned creatures keep their entry so the one-character rule still
    /// sees them.
    pub(crate) online_accounts: FxHashMap<u32, AccountId>,
    pub(crate) pending_reconnects: FxHashMap<u32, PendingReconnect>,
    pub(crate) waitlist: WaitingList,
    /// Statement counter stamped on player speech.
    pub(crate) statements: u32,
}

impl GameEngine {
    pub fn new(
        world: Box<dyn GameWorld>,
        directory: Box<dyn AccountDirectory>,
        chat: Box<dyn ChatRegistry>,
        policy: SessionPolicy,
        gate: Arc<dyn LoginGate>,
        tasks: TaskReceiver<GameTask>,
        scheduler: Scheduler<GameTask>,
    ) -> Self {
        let mut periodic = PeriodicRegistry::new();
        periodic.register(TICK_WORLD, Duration::from_millis(policy.think_interval_ms));
        periodic.register(TICK_PING, PING_INTERVAL);
        periodic.register(TICK_WAITLIST, WAITLIST_SWEEP_INTERVAL);
        Self {
            world,
            directory,
            chat,
            policy,
            gate,
            tasks,
            scheduler,
            pool: BufferPool::new(POOL_RETAINED, BATCH_CAPACITY),
            periodic,
            sessions: FxHashMap::default(),
            by_creature: FxHashMap::default(),
            online_accounts: FxHashMap::default(),
            pending_reconnects: FxHashMap::default(),
            waitlist: WaitingList::new(),
            statements: 0,
        }
    }

    /// Drain the queue until it closes or a [`GameTask::Shutdown`] arrives.
    pub fn run(&mut self) {
        self.arm_think();
        while let Some(task) = self.tasks.recv() {
            if !self.apply(task) {
                break;
            }
            self.flush_all();
        }
        info!("game queue drained, engine stopping");
    }

    /// Apply one task. Returns false to stop the loop.
    pub(crate) fn apply(&mut self, task: GameTask) -> bool {
        match task {
            GameTask::SessionOpened { session, peer, sink } => {
                self.on_session_opened(session, peer, sink)
            }
            GameTask::LoginRequest { session, handshake } => self.on_login(session, handshake),
            GameTask::Command { session, decoded } => self.on_command(session, decoded),
            GameTask::UnknownOpcode { session, opcode } => self.on_unknown_opcode(session, opcode),
            GameTask::Disconnected { session } => self.on_disconnected(session),
            GameTask::ReconnectDue { creature } => self.on_reconnect_due(creature),
            GameTask::KickDue { session } => self.on_kick_due(session),
            GameTask::Think => self.on_think(),
            GameTask::Shutdown => {
                info!("shutdown requested");
                return false;
            }
        }
        true
    }

    fn arm_think(&self) {
        self.scheduler.schedule(
            Duration::from_millis(self.policy.think_interval_ms),
            GameTask::Think,
        );
    }

    pub(crate) fn flush_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.flush(&mut self.pool);
        }
    }

    // --- connection lifecycle ---

    fn on_session_opened(&mut self, id: SessionId, peer: SocketAddr, sink: Box<dyn FrameSink>) {
        let buffer = self.pool.acquire();
        self.sessions
            .insert(id, ClientSession::new(id, peer, sink, buffer, Instant::now()));
        debug!(session = %id, %peer, "session opened");
    }

    fn on_disconnected(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.remove(&id) else {
            return;
        };
        session.release_buffer(&mut self.pool);
        debug!(session = %id, "connection gone");

        // A reconnect aimed at this session can never finish.
        let abandoned: Vec<u32> = self
            .pending_reconnects
            .iter()
            .filter(|(_, pending)| pending.session == id)
            .map(|(&creature, _)| creature)
            .collect();
        for creature in abandoned {
            if let Some(pending) = self.pending_reconnects.remove(&creature) {
                self.scheduler.cancel(pending.timer);
                debug!(creature, "reconnect abandoned, its session dropped");
            }
        }

        let Some(creature) = session.creature else {
            return;
        };
        if self.by_creature.get(&creature) != Some(&id) {
            return;
        }
        self.by_creature.remove(&creature);
        if self.world.creature(creature).is_none() {
            self.online_accounts.remove(&creature);
            self.chat.remove_from_all(CharacterId(creature));
            return;
        }
        match self.world.leave_world(creature, false) {
            Ok(effects) => {
                self.online_accounts.remove(&creature);
                self.chat.remove_from_all(CharacterId(creature));
                self.fan_out(&effects);
                self.notify_vip_watchers(CharacterId(creature), false);
                info!(session = %id, creature, "connection lost, character left the world");
            }
            Err(denied) => {
                // Still in a fight: the creature lingers unbound until the
                // simulation lets it go or a fresh login reclaims it.
                debug!(session = %id, creature, %denied, "character stays in the world");
            }
        }
    }

    // --- login ---

    fn on_login(&mut self, id: SessionId, handshake: FirstPacket) {
        let peer = match self.sessions.get_mut(&id) {
            Some(session) => {
                if session.state != SessionState::Unauthenticated {
                    debug!(session = %id, "repeated first frame ignored");
                    return;
                }
                session.state = SessionState::LoginPending;
                session.peer
            }
            None => return,
        };

        if self.world.run_state() == WorldRunState::ShuttingDown {
            self.drop_quietly(id);
            return;
        }
        if !self.policy.version_accepted(handshake.version) {
            self.refuse_login(id, &login::version_refusal(&self.policy.version_text));
            return;
        }

        // An empty account name asks for the account-manager flow.
        let manager_record = if handshake.account.is_empty() {
            let record = self
                .policy
                .account_manager
                .then(|| self.directory.manager_character())
                .flatten();
            match record {
                Some(record) => Some(record),
                None => {
                    self.refuse_login(id, login::INVALID_ACCOUNT);
                    return;
                }
            }
        } else {
            None
        };

        match self.world.run_state() {
            WorldRunState::Starting => {
                self.refuse_login(id, login::WORLD_STARTING);
                return;
            }
            WorldRunState::Maintenance => {
                self.refuse_login(id, login::WORLD_MAINTENANCE);
                return;
            }
            _ => {}
        }

        if self.directory.ip_banished(peer.ip()) {
            self.refuse_login(id, login::IP_BANISHED);
            return;
        }

        let (account, record, account_manager) = match manager_record {
            Some(record) => (None, record, true),
            None => match self.check_credentials(id, &handshake) {
                Some((account, record, manager)) => (Some(account), record, manager),
                None => return,
            },
        };

        if handshake.gamemaster && !record.privileges.gamemaster {
            self.refuse_login(id, login::NOT_GAMEMASTER);
            return;
        }

        let privileges = record.privileges;
        if self.world.run_state() == WorldRunState::Closed && !privileges.can_always_login {
            self.refuse_login(id, login::WORLD_CLOSED);
            return;
        }

        // One character per account, counted over creatures still in the
        // world so a lingering orphan blocks its siblings.
        if self.policy.one_character_per_account && !account_manager {
            if let Some(account) = account {
                let mut others_online = false;
                let mut target_online = false;
                for (&creature, &owner) in &self.online_accounts {
                    if owner != account {
                        continue;
                    }
                    if creature == record.id.0 {
                        target_online = true;
                    } else {
                        others_online = true;
                    }
                }
                if others_online && !target_online {
                    self.refuse_login(id, login::ONE_CHARACTER_ONLY);
                    return;
                }
            }
        }

        if let Err(slot) = self.waitlist.try_admit(
            record.id,
            privileges.can_always_login,
            self.world.players_online(),
            self.policy.max_players,
            self.policy.waitlist_retry_cap_secs,
            Instant::now(),
        ) {
            let retry = WaitingList::retry_secs(slot, self.policy.waitlist_retry_cap_secs);
            if let Some(session) = self.sessions.get_mut(&id) {
                outbound::waiting_list(&mut session.writer, &WaitingList::notice(slot), retry);
                session.flush(&mut self.pool);
                session.sink.request_close();
                session.state = SessionState::Closing;
            }
            debug!(session = %id, character = %record.name, slot, "queued on the waiting list");
            return;
        }

        let creature = record.id.0;
        if self.pending_reconnects.contains_key(&creature) {
            self.refuse_login(id, login::ALREADY_LOGGED_IN);
            return;
        }

        if let Some(&existing) = self.by_creature.get(&creature) {
            if !self.policy.replace_on_login {
                self.refuse_login(id, login::ALREADY_LOGGED_IN);
                return;
            }
            self.replace_session(id, existing, account, record, account_manager);
            return;
        }

        if self.world.creature(creature).is_some() {
            // The creature survived its old connection; rebind in place.
            self.bind_session(id, account, record, account_manager);
            self.welcome(id);
            return;
        }

        let effects = match self.world.enter_world(&record) {
            Ok(effects) => effects,
            Err(error) => {
                warn!(character = %record.name, %error, "world placement failed");
                self.refuse_login(id, login::START_POSITION_BROKEN);
                return;
            }
        };
        let character = record.id;
        self.fan_out(&effects);
        self.bind_session(id, account, record, account_manager);
        self.welcome(id);
        if !account_manager {
            self.notify_vip_watchers(character, true);
        }
    }

    /// Authenticate and load the character named in the handshake. Refusals
    /// are written to the session here; `None` means the login already ended.
    /// The bool is true when a namelocked character is being routed into the
    /// account manager.
    fn check_credentials(
        &mut self,
        id: SessionId,
        handshake: &FirstPacket,
    ) -> Option<(AccountId, CharacterRecord, bool)> {
        let account = match self
            .directory
            .authenticate(&handshake.account, &handshake.password)
        {
            Ok(account) => account,
            Err(AuthError::UnknownAccount) => {
                self.refuse_login(id, login::INVALID_ACCOUNT);
                return None;
            }
            Err(AuthError::WrongPassword) => {
                self.refuse_login(id, login::INVALID_PASSWORD);
                return None;
            }
        };

        match self.directory.account_status(account) {
            AccountStatus::Active => {}
            AccountStatus::Deleted(ban) => {
                self.refuse_login(id, &login::ban_message(BanScope::Account, true, &ban));
                return None;
            }
            AccountStatus::Banished(ban) => {
                self.refuse_login(id, &login::ban_message(BanScope::Account, false, &ban));
                return None;
            }
        }

        let Some(record) = self.directory.character(account, &handshake.character) else {
            self.refuse_login(id, login::CHARACTER_LOAD_FAILED);
            return None;
        };
        if let Some(ban) = self.directory.character_ban(record.id) {
            self.refuse_login(id, &login::ban_message(BanScope::Character, false, &ban));
            return None;
        }
        if record.namelocked {
            if self.policy.account_manager && self.policy.namelock_manager {
                return Some((account, record, true));
            }
            self.refuse_login(id, login::NAMELOCKED);
            return None;
        }
        Some((account, record, false))
    }

    /// Push the connection bound to `existing` out and park the character
    /// for `id` to claim once the grace delay passes.
    fn replace_session(
        &mut self,
        id: SessionId,
        existing: SessionId,
        account: Option<AccountId>,
        record: CharacterRecord,
        account_manager: bool,
    ) {
        let creature = record.id.0;
        self.chat.remove_from_all(record.id);
        if let Some(old) = self.sessions.get_mut(&existing) {
            old.creature = None;
            old.sink.request_close();
            old.state = SessionState::Closing;
        }
        self.by_creature.remove(&creature);
        let timer = self
            .scheduler
            .schedule(RECONNECT_DELAY, GameTask::ReconnectDue { creature });
        self.pending_reconnects
            .insert(creature, PendingReconnect { timer, session: id });
        if let Some(session) = self.sessions.get_mut(&id) {
            session.state = SessionState::ReconnectPending;
            session.account = account;
            session.record = Some(record);
            session.account_manager = account_manager;
        }
        info!(session = %id, creature, "replacing an online character");
    }

    fn on_reconnect_due(&mut self, creature: u32) {
        let Some(pending) = self.pending_reconnects.remove(&creature) else {
            return;
        };
        let waiting = self
            .sessions
            .get(&pending.session)
            .is_some_and(|session| session.state == SessionState::ReconnectPending);
        if !waiting {
            debug!(creature, "reconnect session went away");
            return;
        }
        if self.world.creature(creature).is_none() {
            self.refuse_login(pending.session, login::ALREADY_LOGGED_IN);
            return;
        }
        let Some((account, record, manager)) = self.sessions.get(&pending.session).and_then(|s| {
            let record = s.record.clone()?;
            Some((s.account, record, s.account_manager))
        }) else {
            self.refuse_login(pending.session, login::ALREADY_LOGGED_IN);
            return;
        };
        self.bind_session(pending.session, account, record, manager);
        self.welcome(pending.session);
    }

    /// Bind a character to its session and put it on the online rosters.
    fn bind_session(
        &mut self,
        id: SessionId,
        account: Option<AccountId>,
        record: CharacterRecord,
        account_manager: bool,
    ) {
        let creature = record.id.0;
        info!(session = %id, creature, character = %record.name, "character bound");
        if let Some(session) = self.sessions.get_mut(&id) {
            session.state = SessionState::Playing;
            session.creature = Some(creature);
            session.account = account;
            session.record = Some(record);
            session.account_manager = account_manager;
            session.last_ping = Instant::now();
            session.last_pong = Instant::now();
            self.gate.note_success(session.peer.ip());
        }
        self.by_creature.insert(creature, id);
        if let Some(account) = account {
            self.online_accounts.insert(creature, account);
        }
    }

    /// Refuse a login with the classic disconnect box and close.
    pub(crate) fn refuse_login(&mut self, id: SessionId, text: &str) {
        if let Some(session) = self.sessions.get_mut(&id) {
            outbound::disconnect(&mut session.writer, text);
            session.flush(&mut self.pool);
            session.sink.request_close();
            session.state = SessionState::Closing;
        }
    }

    /// Close without a word. Used while shutting down.
    fn drop_quietly(&mut self, id: SessionId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.sink.request_close();
            session.state = SessionState::Closing;
        }
    }

    // --- in-game commands ---

    fn on_command(&mut self, id: SessionId, decoded: Decoded) {
        let (creature, manager) = {
            let Some(session) = self.sessions.get(&id) else {
                return;
            };
            if !session.playing() {
                debug!(session = %id, "frame before login finished, dropped");
                return;
            }
            let Some(creature) = session.creature else {
                return;
            };
            (creature, session.account_manager)
        };

        // The account manager only ever talks and leaves.
        if manager && !manager_allowed(&decoded) {
            self.snap_back(id, creature);
            return;
        }

        // A creature gone from the world can only log out.
        if self.world.creature(creature).is_none()
            && !matches!(decoded, Decoded::Session(SessionCommand::Logout))
        {
            debug!(session = %id, creature, "command for a removed creature dropped");
            return;
        }

        match decoded {
            Decoded::Session(command) => self.serve(id, creature, command),
            Decoded::Player(command) => self.forward(id, creature, command),
        }
    }

    /// Hand a world-touching command to the simulation, after the session
    /// layer's own screening.
    fn forward(&mut self, id: SessionId, creature: u32, command: PlayerCommand) {
        let command = match command {
            PlayerCommand::Say {
                class,
                channel,
                receiver,
                text,
            } => match self.route_say(id, creature, class, channel, receiver, text) {
                Some(say) => say,
                None => return,
            },
            PlayerCommand::SetOutfit(requested) => {
                let Some(next) = self.screen_outfit(creature, requested) else {
                    return;
                };
                PlayerCommand::SetOutfit(next)
            }
            PlayerCommand::ToggleMount(_) if !self.policy.outfit.allow_mounts => return,
            other => other,
        };
        let effects = self.world.handle_command(creature, command);
        self.fan_out(&effects);
    }

    /// Clamp a requested outfit to what the feature switches allow. `None`
    /// drops the request outright.
    fn screen_outfit(&self, creature: u32, requested: Outfit) -> Option<Outfit> {
        if !self.policy.outfit.allow_change {
            return None;
        }
        let current = self.world.creature(creature)?.outfit;
        let mut next = requested;
        if !self.policy.outfit.allow_colors {
            next.head = current.head;
            next.body = current.body;
            next.legs = current.legs;
            next.feet = current.feet;
        }
        if !self.policy.outfit.allow_addons {
            next.addons = current.addons;
        }
        if !self.policy.outfit.allow_mounts {
            next.mount = current.mount;
        }
        Some(next)
    }

    /// Serve a command that never reaches the simulation.
    fn serve(&mut self, id: SessionId, creature: u32, command: SessionCommand) {
        match command {
            SessionCommand::Logout => self.logout(id, creature),
            SessionCommand::Pong => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.last_pong = Instant::now();
                }
            }
            SessionCommand::RequestChannels => {
                let channels = self.chat.channels_for(CharacterId(creature));
                if let Some(session) = self.sessions.get_mut(&id) {
                    outbound::channel_list(&mut session.writer, &channels);
                }
            }
            SessionCommand::OpenChannel { channel } => {
                let opened = self.chat.open_channel(channel, CharacterId(creature));
                match opened {
                    Some((name, members, invitees)) => {
                        if let Some(session) = self.sessions.get_mut(&id) {
                            outbound::channel_open(
                                &mut session.writer,
                                channel,
                                &name,
                                &members,
                                &invitees,
                            );
                        }
                    }
                    None => debug!(session = %id, channel, "unknown channel requested"),
                }
            }
            SessionCommand::CloseChannel { channel } => {
                // Dissolving a conversation channel tells the remaining
                // members it closed.
                for member in self.chat.leave(CharacterId(creature), channel) {
                    if let Some(&sid) = self.by_creature.get(&member.0) {
                        if let Some(session) = self.sessions.get_mut(&sid) {
                            outbound::channel_close(&mut session.writer, channel);
                        }
                    }
                }
            }
            SessionCommand::OpenPrivate { receiver } => {
                let found = self.directory.find_character(&receiver);
                if let Some(session) = self.sessions.get_mut(&id) {
                    match found {
                        Some(entry) => {
                            outbound::channel_private(&mut session.writer, &entry.name);
                        }
                        None => outbound::text_message(
                            &mut session.writer,
                            MessageClass::StatusSmall,
                            NO_SUCH_PLAYER,
                            None,
                            None,
                        ),
                    }
                }
            }
            SessionCommand::CreateOwnChannel => self.create_own_channel(id, creature),
            SessionCommand::ChannelInvite { name } => self.channel_invite(id, creature, &name),
            SessionCommand::ChannelExclude { name } => self.channel_exclude(id, creature, &name),
            SessionCommand::RefreshTile { position } => self.refresh_tile(id, creature, position),
            SessionCommand::RequestOutfitWindow => self.outfit_window(id, creature),
            SessionCommand::AddVip { name } => self.add_vip(id, creature, &name),
            SessionCommand::RemoveVip { character } => {
                if let Some(account) = self.sessions.get(&id).and_then(|s| s.account) {
                    self.directory.vip_erase(account, CharacterId(character));
                }
            }
            SessionCommand::BugReport { text } => {
                let allowed = self
                    .sessions
                    .get(&id)
                    .and_then(|s| s.record.as_ref())
                    .is_some_and(|r| r.privileges.can_report_bugs);
                if allowed {
                    info!(creature, report = %text, "bug report filed");
                }
            }
            SessionCommand::DebugReport {
                assertion,
                date,
                description,
                comment,
            } => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    // One report per session; clients resend in a loop.
                    if !session.debug_report_taken {
                        session.debug_report_taken = true;
                        warn!(
                            session = %id,
                            %assertion,
                            %date,
                            %description,
                            %comment,
                            "client assertion report"
                        );
                    }
                }
            }
            SessionCommand::RequestQuestLog => {
                let quests = self.world.quest_log(creature);
                if let Some(session) = self.sessions.get_mut(&id) {
                    outbound::quest_log(&mut session.writer, &quests);
                }
            }
            SessionCommand::RequestQuestInfo { quest } => {
                let missions = self.world.quest_missions(creature, quest);
                if let Some(missions) = missions {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        outbound::quest_info(&mut session.writer, quest, &missions);
                    }
                }
            }
            SessionCommand::ViolationReport => {
                debug!(session = %id, "violation report ignored");
            }
        }
    }

    fn logout(&mut self, id: SessionId, creature: u32) {
        let forced = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .is_some_and(|r| r.privileges.can_logout_anytime);
        if self.world.creature(creature).is_some() {
            match self.world.leave_world(creature, forced) {
                Ok(effects) => self.fan_out(&effects),
                Err(denied) => {
                    self.tell(id, MessageClass::StatusSmall, &denied.0);
                    return;
                }
            }
        }
        self.unbind(id, creature);
        self.notify_vip_watchers(CharacterId(creature), false);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.flush(&mut self.pool);
            session.sink.request_close();
            session.state = SessionState::Closing;
        }
        info!(session = %id, creature, "logged out");
    }

    /// Take a character off the online rosters and detach it from its
    /// session record.
    fn unbind(&mut self, id: SessionId, creature: u32) {
        self.chat.remove_from_all(CharacterId(creature));
        if self.by_creature.get(&creature) == Some(&id) {
            self.by_creature.remove(&creature);
        }
        self.online_accounts.remove(&creature);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.creature = None;
        }
    }

    /// Snap the client's walk prediction back to where the creature faces.
    fn snap_back(&mut self, id: SessionId, creature: u32) {
        let direction = self
            .world
            .creature(creature)
            .map(|view| view.direction)
            .unwrap_or(Direction::South);
        if let Some(session) = self.sessions.get_mut(&id) {
            outbound::cancel_walk(&mut session.writer, direction);
        }
    }

    // --- chat management ---

    fn create_own_channel(&mut self, id: SessionId, creature: u32) {
        let Some(name) = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .map(|r| r.name.clone())
        else {
            return;
        };
        if let Some(info) = self.chat.create_private(CharacterId(creature), &name) {
            if let Some(session) = self.sessions.get_mut(&id) {
                outbound::channel_create(&mut session.writer, info.id, &info.name, &name);
            }
        }
    }

    fn channel_invite(&mut self, id: SessionId, creature: u32, name: &str) {
        let Some(entry) = self.directory.find_character(name) else {
            self.tell(id, MessageClass::StatusSmall, NO_SUCH_PLAYER);
            return;
        };
        let Some(owner_name) = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .map(|r| r.name.clone())
        else {
            return;
        };
        let Some(channel) = self.chat.invite(CharacterId(creature), entry.id) else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(&id) {
            let writer = &mut session.writer;
            outbound::channel_event(writer, channel, &entry.name, channel_event::INVITE);
        }
        if let Some(&sid) = self.by_creature.get(&entry.id.0) {
            if let Some(session) = self.sessions.get_mut(&sid) {
                let text = format!("{owner_name} invites you to a private chat channel.");
                outbound::text_message(&mut session.writer, MessageClass::Info, &text, None, None);
            }
        }
    }

    fn channel_exclude(&mut self, id: SessionId, creature: u32, name: &str) {
        let Some(entry) = self.directory.find_character(name) else {
            self.tell(id, MessageClass::StatusSmall, NO_SUCH_PLAYER);
            return;
        };
        let Some(channel) = self.chat.exclude(CharacterId(creature), entry.id) else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(&id) {
            let writer = &mut session.writer;
            outbound::channel_event(writer, channel, &entry.name, channel_event::EXCLUDE);
        }
        // An ejected member sees the channel close.
        if let Some(&sid) = self.by_creature.get(&entry.id.0) {
            if let Some(session) = self.sessions.get_mut(&sid) {
                outbound::channel_close(&mut session.writer, channel);
            }
        }
    }

    // --- windows and lists ---

    fn refresh_tile(&mut self, id: SessionId, creature: u32, position: Position) {
        let world: &dyn WorldView = &*self.world;
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        let mut enc = ViewEncoder::new(world, &mut session.known, creature);
        if enc.sees(position) {
            enc.update_tile(&mut session.writer, position);
        }
    }

    fn outfit_window(&mut self, id: SessionId, creature: u32) {
        let Some(view) = self.world.creature(creature) else {
            return;
        };
        let choices = self.world.outfit_choices(creature);
        let mounts = self
            .policy
            .outfit
            .allow_mounts
            .then(|| self.world.mount_choices(creature));
        if let Some(session) = self.sessions.get_mut(&id) {
            outbound::outfit_window(&mut session.writer, &view.outfit, &choices, mounts.as_deref());
        }
    }

    fn add_vip(&mut self, id: SessionId, creature: u32, name: &str) {
        // The account manager has no list to add to.
        let Some(account) = self.sessions.get(&id).and_then(|s| s.account) else {
            return;
        };
        let Some(entry) = self.directory.find_character(name) else {
            self.tell(id, MessageClass::StatusSmall, NO_SUCH_PLAYER);
            return;
        };
        if entry.id.0 == creature {
            self.tell(id, MessageClass::StatusSmall, "You cannot add yourself.");
            return;
        }
        let premium = self
            .sessions
            .get(&id)
            .and_then(|s| s.record.as_ref())
            .is_some_and(|r| r.premium);
        let limit = if premium {
            VIP_PREMIUM_LIMIT
        } else {
            VIP_LIMIT
        };
        if self.directory.vip_list(account).len() >= limit {
            self.tell(id, MessageClass::StatusSmall, "You cannot add more buddies.");
            return;
        }
        if !self.directory.vip_store(account, entry.id) {
            self.tell(
                id,
                MessageClass::StatusSmall,
                "This player is already in your list.",
            );
            return;
        }
        let online = self.world.is_character_online(entry.id);
        if let Some(session) = self.sessions.get_mut(&id) {
            outbound::vip_entry(&mut session.writer, entry.id.0, &entry.name, online);
        }
    }

    // --- abuse escalation ---

    fn on_unknown_opcode(&mut self, id: SessionId, opcode: u8) {
        let (creature, account) = match self.sessions.get(&id) {
            Some(session) if session.playing() => (session.creature, session.account),
            _ => {
                debug!(session = %id, opcode, "unknown opcode before login");
                return;
            }
        };
        if !self.policy.escalate_unknown_opcodes {
            debug!(session = %id, opcode, "unknown opcode ignored");
            return;
        }
        let Some(account) = account else {
            debug!(session = %id, opcode, "unknown opcode from the account manager");
            return;
        };

        let warnings = self.directory.note_warning(account);
        let sanction = if warnings >= self.policy.warnings_to_deletion {
            Sanction::Deletion
        } else if warnings >= self.policy.warnings_to_final_ban {
            Sanction::FinalBanish {
                duration_secs: self.policy.final_ban_duration_secs,
            }
        } else {
            Sanction::Banish {
                duration_secs: self.policy.ban_duration_secs,
            }
        };
        self.directory
            .apply_sanction(account, sanction, UNKNOWN_OPCODE_REASON);
        warn!(session = %id, opcode, warnings, "unknown opcode, account sanctioned");

        self.tell(id, MessageClass::Info, "You have been banished.");
        if let Some(position) = creature.and_then(|c| self.world.creature_position(c)) {
            self.fan_out(&[WorldEffect::MagicEffect {
                position,
                effect: effect::GREEN_SPARKLES,
            }]);
        }
        self.scheduler
            .schedule(ESCALATION_KICK_DELAY, GameTask::KickDue { session: id });
    }

    fn on_kick_due(&mut self, id: SessionId) {
        let Some(creature) = self.sessions.get(&id).and_then(|s| s.creature) else {
            self.drop_quietly(id);
            return;
        };
        if self.world.creature(creature).is_some() {
            match self.world.leave_world(creature, true) {
                Ok(effects) => self.fan_out(&effects),
                Err(denied) => warn!(creature, %denied, "forced logout refused"),
            }
        }
        self.unbind(id, creature);
        self.notify_vip_watchers(CharacterId(creature), false);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.flush(&mut self.pool);
            session.sink.request_close();
            session.state = SessionState::Closing;
        }
        info!(session = %id, creature, "kicked");
    }

    // --- periodic upkeep ---

    fn on_think(&mut self) {
        let now = Instant::now();
        for name in self.periodic.due(now) {
            match name.as_str() {
                TICK_WORLD => {
                    let effects = self.world.think();
                    if !effects.is_empty() {
                        self.fan_out(&effects);
                    }
                }
                TICK_PING => self.ping_sessions(now),
                TICK_WAITLIST => self.waitlist.prune(now),
                _ => {}
            }
        }
        self.arm_think();
    }

    pub(crate) fn ping_sessions(&mut self, now: Instant) {
        let mut kicks = Vec::new();
        for session in self.sessions.values_mut() {
            if !session.playing() {
                continue;
            }
            if now.duration_since(session.last_pong) >= PONG_TIMEOUT {
                kicks.push(session.id);
                continue;
            }
            if now.duration_since(session.last_ping) >= PING_INTERVAL {
                session.last_ping = now;
                outbound::ping(&mut session.writer);
            }
        }
        for id in kicks {
            let Some(creature) = self.sessions.get(&id).and_then(|s| s.creature) else {
                continue;
            };
            // A fight blocks the kick; the next sweep tries again.
            match self.world.leave_world(creature, false) {
                Ok(effects) => {
                    self.fan_out(&effects);
                    self.unbind(id, creature);
                    self.notify_vip_watchers(CharacterId(creature), false);
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.sink.request_close();
                        session.state = SessionState::Closing;
                    }
                    info!(session = %id, creature, "kicked after ping silence");
                }
                Err(_) => {}
            }
        }
    }

    /// Drop a status line into one session.
    pub(crate) fn tell(&mut self, id: SessionId, class: MessageClass, text: &str) {
        if let Some(session) = self.sessions.get_mut(&id) {
            outbound::text_message(&mut session.writer, class, text, None, None);
        }
    }
}

/// Commands an account-manager session may issue.
fn manager_allowed(decoded: &Decoded) -> bool {
    matches!(
        decoded,
        Decoded::Session(SessionCommand::Logout | SessionCommand::Pong)
            | Decoded::Player(PlayerCommand::Say { .. })
    )
}

const NO_SUCH_PLAYER: &str = "A player with this name does not exist.";

/// Free VIP list capacity.
const VIP_LIMIT: usize = 100;
/// Capacity with a premium account.
const VIP_PREMIUM_LIMIT: usize = 200;
