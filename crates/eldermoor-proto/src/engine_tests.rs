//! Engine behaviour tests. Each test applies tasks to the engine directly
//! and inspects the batches its capture sinks received; timer-driven tasks
//! are applied by hand instead of waiting them out.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eldermoor_dispatch::{Scheduler, TIMED_TASK_EXPIRATION, task_channel};
use eldermoor_wire::opcode::server;
use eldermoor_wire::{MessageClass, PacketReader};
use eldermoor_world::{
    AccountId, AccountStatus, BanRecord, Direction, Outfit, PlayerCommand, Sanction, WorldRunState,
};

use crate::engine::{GameEngine, GameTask};
use crate::fixtures::{CaptureSink, FakeAccounts, FakeChat, FakeWorld, NoopGate, character_record};
use crate::inbound::{Decoded, FirstPacket, SessionCommand};
use crate::login;
use crate::policy::SessionPolicy;
use crate::session::{SessionId, SessionState};

type Outbox = Arc<Mutex<Vec<Vec<u8>>>>;

fn peer() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 49152)
}

fn engine_with(
    world: FakeWorld,
    accounts: FakeAccounts,
    chat: FakeChat,
    policy: SessionPolicy,
) -> GameEngine {
    let (tx, rx) = task_channel(TIMED_TASK_EXPIRATION);
    let scheduler = Scheduler::spawn(tx).expect("timer thread");
    GameEngine::new(
        Box::new(world),
        Box::new(accounts),
        Box::new(chat),
        policy,
        Arc::new(NoopGate),
        rx,
        scheduler,
    )
}

/// Two accounts with one character each: alice/Greta and bob/Hugo.
fn standard() -> (FakeWorld, FakeAccounts) {
    let world = FakeWorld::new();
    let mut accounts = FakeAccounts::new();
    accounts.add_account("alice", "secret", 11);
    accounts.add_character(11, character_record(1, "Greta"));
    accounts.add_account("bob", "hunter", 22);
    accounts.add_character(22, character_record(2, "Hugo"));
    (world, accounts)
}

fn handshake(account: &str, password: &str, character: &str) -> FirstPacket {
    FirstPacket {
        operating_system: 1,
        version: 860,
        key: [0; 4],
        gamemaster: false,
        account: account.to_string(),
        character: character.to_string(),
        password: password.to_string(),
    }
}

fn step(engine: &mut GameEngine, task: GameTask) {
    engine.apply(task);
    engine.flush_all();
}

fn open(engine: &mut GameEngine, id: u64) -> (Outbox, Arc<AtomicBool>) {
    let (sink, outbox) = CaptureSink::new();
    let closed = sink.close_flag();
    step(
        engine,
        GameTask::SessionOpened {
            session: SessionId(id),
            peer: peer(),
            sink: Box::new(sink),
        },
    );
    (outbox, closed)
}

fn login(
    engine: &mut GameEngine,
    id: u64,
    account: &str,
    password: &str,
    character: &str,
) -> (Outbox, Arc<AtomicBool>) {
    let handles = open(engine, id);
    step(
        engine,
        GameTask::LoginRequest {
            session: SessionId(id),
            handshake: handshake(account, password, character),
        },
    );
    handles
}

fn command(engine: &mut GameEngine, id: u64, decoded: Decoded) {
    step(
        engine,
        GameTask::Command {
            session: SessionId(id),
            decoded,
        },
    );
}

fn batches(outbox: &Outbox) -> Vec<Vec<u8>> {
    outbox.lock().unwrap().clone()
}

fn last_batch(outbox: &Outbox) -> Vec<u8> {
    batches(outbox).pop().expect("nothing was sent")
}

/// The string following a one-byte opcode at the start of the batch.
fn text_after_opcode(batch: &[u8], opcode: u8) -> String {
    assert!(!batch.is_empty(), "empty batch");
    assert_eq!(batch[0], opcode, "unexpected leading opcode");
    let mut reader = PacketReader::new(&batch[1..]);
    reader.get_string().expect("string payload")
}

fn refusal(outbox: &Outbox) -> String {
    text_after_opcode(&last_batch(outbox), server::DISCONNECT)
}

/// Class byte and text of a batch starting with a text message.
fn status(batch: &[u8]) -> (u8, String) {
    assert_eq!(batch[0], server::TEXT_MESSAGE, "not a text message");
    let mut reader = PacketReader::new(&batch[2..]);
    (batch[1], reader.get_string().expect("text payload"))
}

fn say(class: MessageClass, channel: u16, receiver: &str, text: &str) -> Decoded {
    Decoded::Player(PlayerCommand::Say {
        class,
        channel,
        receiver: receiver.to_string(),
        text: text.to_string(),
    })
}

fn past(secs: u64) -> Instant {
    Instant::now()
        .checked_sub(Duration::from_secs(secs))
        .expect("monotonic clock too young")
}

fn ban_record() -> BanRecord {
    BanRecord {
        issued: "3 Apr 2012".into(),
        expires: "10 Apr 2012".into(),
        actor: "God".into(),
        reason: "Bot abuse".into(),
        action: "banishment".into(),
        comment: "none".into(),
    }
}

// --- login ladder ---

#[test]
fn test_login_places_character_and_welcomes() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    assert!(
        placed.lock().unwrap().creatures.contains_key(&1),
        "character was not placed in the world"
    );
    let first = &batches(&outbox)[0];
    assert_eq!(first[0], server::LOGIN_SUCCESS);
    assert_eq!(&first[1..5], &1u32.to_le_bytes(), "welcome names the wrong creature");
    assert!(!closed.load(Ordering::Relaxed), "session closed after a good login");
    assert_eq!(engine.by_creature.get(&1), Some(&SessionId(1)));
}

#[test]
fn test_wrong_password_refused() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, closed) = login(&mut engine, 1, "alice", "wrong", "Greta");

    assert_eq!(refusal(&outbox), login::INVALID_PASSWORD);
    assert!(closed.load(Ordering::Relaxed), "refused session left open");
    assert!(placed.lock().unwrap().creatures.is_empty());
}

#[test]
fn test_unknown_account_refused() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = login(&mut engine, 1, "nobody", "secret", "Greta");

    assert_eq!(refusal(&outbox), login::INVALID_ACCOUNT);
}

#[test]
fn test_banished_account_quotes_the_ban() {
    let (world, mut accounts) = standard();
    accounts
        .statuses
        .insert(11, AccountStatus::Banished(ban_record()));
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    let text = refusal(&outbox);
    assert!(
        text.starts_with("Your account has been banished at:\n3 Apr 2012"),
        "unexpected ban text: {text}"
    );
    assert!(text.ends_with("10 Apr 2012."), "lift date missing: {text}");
}

#[test]
fn test_version_outside_range_refused() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = open(&mut engine, 1);
    let mut shake = handshake("alice", "secret", "Greta");
    shake.version = 854;
    step(
        &mut engine,
        GameTask::LoginRequest {
            session: SessionId(1),
            handshake: shake,
        },
    );

    assert_eq!(refusal(&outbox), "Only clients with protocol 8.60 allowed!");
}

#[test]
fn test_ip_ban_beats_credential_errors() {
    let (world, mut accounts) = standard();
    accounts.banned_ips.push(peer().ip());
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    // Even a wrong password reports the IP ban, nothing else.
    let (outbox, _) = login(&mut engine, 1, "alice", "wrong", "Greta");

    assert_eq!(refusal(&outbox), login::IP_BANISHED);
}

#[test]
fn test_closed_world_admits_only_privileged_logins() {
    let (mut world, mut accounts) = standard();
    world.run = WorldRunState::Closed;
    let mut nils = character_record(3, "Nils");
    nils.privileges.can_always_login = true;
    accounts.add_character(22, nils);
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (refused, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    assert_eq!(refusal(&refused), login::WORLD_CLOSED);

    let (admitted, _) = login(&mut engine, 2, "bob", "hunter", "Nils");
    assert_eq!(batches(&admitted)[0][0], server::LOGIN_SUCCESS);
}

#[test]
fn test_gamemaster_toggle_needs_the_privilege() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = open(&mut engine, 1);
    let mut shake = handshake("alice", "secret", "Greta");
    shake.gamemaster = true;
    step(
        &mut engine,
        GameTask::LoginRequest {
            session: SessionId(1),
            handshake: shake,
        },
    );

    assert_eq!(refusal(&outbox), login::NOT_GAMEMASTER);
}

#[test]
fn test_second_character_of_same_account_refused() {
    let (world, mut accounts) = standard();
    accounts.add_character(11, character_record(3, "Nils"));
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    let (outbox, _) = login(&mut engine, 2, "alice", "secret", "Nils");

    assert_eq!(refusal(&outbox), login::ONE_CHARACTER_ONLY);
}

#[test]
fn test_full_world_queues_with_retry_time() {
    let (world, mut accounts) = standard();
    let mut nils = character_record(3, "Nils");
    nils.privileges.can_always_login = true;
    accounts.add_character(22, nils);
    let mut policy = SessionPolicy::default();
    policy.max_players = 0;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);

    let (outbox, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    let batch = last_batch(&outbox);
    assert_eq!(batch[0], server::WAITING_LIST);
    let mut reader = PacketReader::new(&batch[1..]);
    let notice = reader.get_string().expect("notice");
    assert!(notice.contains("at 1 place"), "queue position missing: {notice}");
    assert_eq!(reader.get_u8().expect("retry"), 10, "first slot retries after ten seconds");
    assert!(closed.load(Ordering::Relaxed));

    // The player cap never applies to privileged characters.
    let (admitted, _) = login(&mut engine, 2, "bob", "hunter", "Nils");
    assert_eq!(batches(&admitted)[0][0], server::LOGIN_SUCCESS);
}

// --- duplicate logins ---

#[test]
fn test_replacing_login_swaps_the_connection() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (_, closed1) = login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "alice", "secret", "Greta");

    assert!(closed1.load(Ordering::Relaxed), "old connection not pushed out");
    assert!(batches(&out2).is_empty(), "welcome sent before the grace delay");
    assert_eq!(
        engine.sessions.get(&SessionId(2)).map(|s| s.state),
        Some(SessionState::ReconnectPending)
    );

    step(&mut engine, GameTask::ReconnectDue { creature: 1 });

    assert_eq!(batches(&out2)[0][0], server::LOGIN_SUCCESS);
    assert_eq!(engine.by_creature.get(&1), Some(&SessionId(2)));
    assert!(engine.pending_reconnects.is_empty());
}

#[test]
fn test_duplicate_login_refused_without_replace() {
    let (world, accounts) = standard();
    let mut policy = SessionPolicy::default();
    policy.replace_on_login = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);

    login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "alice", "secret", "Greta");

    assert_eq!(refusal(&out2), login::ALREADY_LOGGED_IN);
    assert_eq!(engine.by_creature.get(&1), Some(&SessionId(1)));
    assert!(engine.sessions.get(&SessionId(1)).is_some_and(|s| s.playing()));
}

#[test]
fn test_third_login_during_grace_refused() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    login(&mut engine, 2, "alice", "secret", "Greta");
    let (out3, _) = login(&mut engine, 3, "alice", "secret", "Greta");

    assert_eq!(refusal(&out3), login::ALREADY_LOGGED_IN);
    assert_eq!(engine.pending_reconnects.len(), 1, "a second timer was scheduled");
}

#[test]
fn test_reconnect_finds_the_character_gone() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, closed2) = login(&mut engine, 2, "alice", "secret", "Greta");

    // The character dies while the replacement waits.
    {
        let mut state = placed.lock().unwrap();
        state.creatures.remove(&1);
        state.positions.remove(&1);
    }
    step(&mut engine, GameTask::ReconnectDue { creature: 1 });

    assert_eq!(refusal(&out2), login::ALREADY_LOGGED_IN);
    assert!(closed2.load(Ordering::Relaxed));
}

// --- disconnects and orphans ---

#[test]
fn test_clean_disconnect_removes_the_character() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    step(&mut engine, GameTask::Disconnected { session: SessionId(1) });

    assert!(placed.lock().unwrap().creatures.is_empty(), "character lingered");
    assert!(engine.by_creature.is_empty());
    assert!(engine.online_accounts.is_empty());
}

#[test]
fn test_fight_keeps_the_character_and_relogin_reclaims_it() {
    let (mut world, accounts) = standard();
    world.no_logout = vec![1];
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    step(&mut engine, GameTask::Disconnected { session: SessionId(1) });

    assert!(
        placed.lock().unwrap().creatures.contains_key(&1),
        "fighting character left the world"
    );
    assert!(engine.by_creature.is_empty(), "orphan still bound to a session");
    assert!(
        engine.online_accounts.contains_key(&1),
        "orphan dropped off the account roster"
    );

    // A fresh login takes the orphan over without re-entering the world.
    let (out2, _) = login(&mut engine, 2, "alice", "secret", "Greta");
    assert_eq!(batches(&out2)[0][0], server::LOGIN_SUCCESS);
    assert_eq!(engine.by_creature.get(&1), Some(&SessionId(2)));
    assert_eq!(placed.lock().unwrap().creatures.len(), 1);
}

#[test]
fn test_orphan_blocks_sibling_characters() {
    let (mut world, mut accounts) = standard();
    world.no_logout = vec![1];
    accounts.add_character(11, character_record(3, "Nils"));
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    login(&mut engine, 1, "alice", "secret", "Greta");
    step(&mut engine, GameTask::Disconnected { session: SessionId(1) });

    let (outbox, _) = login(&mut engine, 2, "alice", "secret", "Nils");
    assert_eq!(refusal(&outbox), login::ONE_CHARACTER_ONLY);
}

// --- account manager ---

#[test]
fn test_empty_account_name_enters_the_manager() {
    let (world, mut accounts) = standard();
    accounts.manager = Some(character_record(9, "Account Manager"));
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = login(&mut engine, 1, "", "", "");

    assert_eq!(batches(&outbox)[0][0], server::LOGIN_SUCCESS);
    assert!(placed.lock().unwrap().creatures.contains_key(&9));
    let session = engine.sessions.get(&SessionId(1)).expect("session");
    assert!(session.account_manager);
    assert_eq!(session.account, None, "the manager has no real account");
}

#[test]
fn test_manager_refused_when_disabled() {
    let (world, mut accounts) = standard();
    accounts.manager = Some(character_record(9, "Account Manager"));
    let mut policy = SessionPolicy::default();
    policy.account_manager = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);

    let (outbox, _) = login(&mut engine, 1, "", "", "");

    assert_eq!(refusal(&outbox), login::INVALID_ACCOUNT);
}

#[test]
fn test_manager_session_may_only_talk_and_leave() {
    let (world, mut accounts) = standard();
    accounts.manager = Some(character_record(9, "Account Manager"));
    let commands = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "", "", "");

    // Anything but talking snaps the client back in place.
    command(&mut engine, 1, Decoded::Player(PlayerCommand::Walk(Direction::North)));
    assert_eq!(
        last_batch(&outbox),
        vec![server::CANCEL_WALK, Direction::South.facing_tag()]
    );
    assert!(commands.lock().unwrap().commands.is_empty());

    command(&mut engine, 1, say(MessageClass::Say, 0, "", "I want a new character"));
    let state = commands.lock().unwrap();
    assert_eq!(state.commands.len(), 1, "manager speech must reach the simulation");
    assert!(matches!(state.commands[0], (9, PlayerCommand::Say { .. })));
}

#[test]
fn test_namelocked_character_routes_to_the_manager() {
    let (world, mut accounts) = standard();
    accounts.manager = Some(character_record(9, "Account Manager"));
    let mut greta = character_record(1, "Greta");
    greta.namelocked = true;
    accounts.add_character(11, greta);
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    assert_eq!(batches(&outbox)[0][0], server::LOGIN_SUCCESS);
    let session = engine.sessions.get(&SessionId(1)).expect("session");
    assert!(session.account_manager, "namelocked login must land in the manager");
    assert_eq!(session.account, Some(AccountId(11)), "the real account is kept");
}

#[test]
fn test_namelocked_character_refused_without_the_manager() {
    let (world, mut accounts) = standard();
    let mut greta = character_record(1, "Greta");
    greta.namelocked = true;
    accounts.add_character(11, greta);
    let mut policy = SessionPolicy::default();
    policy.namelock_manager = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);

    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    assert_eq!(refusal(&outbox), login::NAMELOCKED);
}

// --- speech routing ---

#[test]
fn test_plain_say_goes_to_the_simulation() {
    let (world, accounts) = standard();
    let commands = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, say(MessageClass::Say, 0, "", "hello"));

    let state = commands.lock().unwrap();
    assert!(matches!(state.commands[0], (1, PlayerCommand::Say { .. })));
}

#[test]
fn test_channel_speech_reaches_members_only() {
    let (world, accounts) = standard();
    let commands = world.state.clone();
    let chat = FakeChat::new().with_channel(4, "Gossip");
    let mut engine = engine_with(world, accounts, chat, SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "bob", "hunter", "Hugo");

    command(&mut engine, 1, Decoded::Session(SessionCommand::OpenChannel { channel: 4 }));
    assert_eq!(last_batch(&out1)[0], server::CHANNEL_OPEN);
    command(&mut engine, 2, Decoded::Session(SessionCommand::OpenChannel { channel: 4 }));

    command(&mut engine, 1, say(MessageClass::Channel, 4, "", "hello there"));

    let heard = last_batch(&out2);
    assert_eq!(heard[0], server::CREATURE_SPEAK);
    let mut reader = PacketReader::new(&heard[1..]);
    assert!(reader.get_u32().expect("statement") > 0, "player speech is numbered");
    assert_eq!(reader.get_string().expect("name"), "Greta");
    assert_eq!(reader.get_u16().expect("level"), 8);
    assert_eq!(reader.get_u8().expect("class"), MessageClass::Channel.as_byte());
    assert_eq!(reader.get_u16().expect("channel"), 4);
    assert_eq!(reader.get_string().expect("text"), "hello there");
    // The speaker hears it too; the simulation never sees it.
    assert_eq!(last_batch(&out1)[0], server::CREATURE_SPEAK);
    assert!(commands.lock().unwrap().commands.is_empty());
}

#[test]
fn test_speech_into_an_unjoined_channel_is_dropped() {
    let (world, accounts) = standard();
    let chat = FakeChat::new().with_channel(4, "Gossip");
    let mut engine = engine_with(world, accounts, chat, SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    let sent = batches(&out1).len();

    command(&mut engine, 1, say(MessageClass::Channel, 4, "", "anyone?"));

    assert_eq!(batches(&out1).len(), sent, "dropped speech must stay silent");
}

#[test]
fn test_private_message_delivered_with_feedback() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "bob", "hunter", "Hugo");

    // Receiver lookup is case-insensitive.
    command(&mut engine, 1, say(MessageClass::PrivateTo, 0, "hugo", "psst"));

    let heard = last_batch(&out2);
    assert_eq!(heard[0], server::CREATURE_SPEAK);
    let mut reader = PacketReader::new(&heard[1..]);
    reader.get_u32().expect("statement");
    assert_eq!(reader.get_string().expect("name"), "Greta");
    reader.get_u16().expect("level");
    assert_eq!(
        reader.get_u8().expect("class"),
        MessageClass::PrivateFrom.as_byte(),
        "a plain private message arrives as PrivateFrom"
    );
    assert_eq!(reader.get_string().expect("text"), "psst");
    assert_eq!(
        status(&last_batch(&out1)),
        (MessageClass::StatusSmall.as_byte(), "Message sent to Hugo.".to_string())
    );
}

#[test]
fn test_private_message_to_offline_player_reports_it() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, say(MessageClass::PrivateTo, 0, "Hugo", "psst"));

    let (_, text) = status(&last_batch(&out1));
    assert_eq!(text, "A player with this name is not online.");
}

#[test]
fn test_broadcast_needs_the_gamemaster_privilege() {
    let (world, mut accounts) = standard();
    let mut hugo = character_record(2, "Hugo");
    hugo.privileges.gamemaster = true;
    accounts.add_character(22, hugo);
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "bob", "hunter", "Hugo");

    let sent = batches(&out2).len();
    command(&mut engine, 1, say(MessageClass::GamemasterBroadcast, 0, "", "free stuff"));
    assert_eq!(batches(&out2).len(), sent, "unprivileged broadcast leaked");

    command(&mut engine, 2, say(MessageClass::GamemasterBroadcast, 0, "", "server save"));
    let heard = last_batch(&out1);
    assert_eq!(heard[0], server::CREATURE_SPEAK);
    let mut reader = PacketReader::new(&heard[1..]);
    reader.get_u32().expect("statement");
    assert_eq!(reader.get_string().expect("name"), "Hugo");
    reader.get_u16().expect("level");
    assert_eq!(
        reader.get_u8().expect("class"),
        MessageClass::GamemasterBroadcast.as_byte()
    );
}

// --- command screening ---

#[test]
fn test_outfit_change_clamped_by_feature_switches() {
    let (world, accounts) = standard();
    let commands = world.state.clone();
    let mut policy = SessionPolicy::default();
    policy.outfit.allow_colors = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);
    login(&mut engine, 1, "alice", "secret", "Greta");

    let requested = Outfit {
        look_type: 136,
        head: 95,
        body: 12,
        legs: 40,
        feet: 7,
        ..Outfit::default()
    };
    command(&mut engine, 1, Decoded::Player(PlayerCommand::SetOutfit(requested)));

    let state = commands.lock().unwrap();
    let (_, PlayerCommand::SetOutfit(kept)) = &state.commands[0] else {
        panic!("expected a SetOutfit command, got {:?}", state.commands[0]);
    };
    assert_eq!(kept.look_type, 136, "the sprite change itself is allowed");
    assert_eq!(
        (kept.head, kept.body, kept.legs, kept.feet),
        (0, 0, 0, 0),
        "colour changes must keep the current colours"
    );
}

#[test]
fn test_outfit_change_dropped_when_disabled() {
    let (world, accounts) = standard();
    let commands = world.state.clone();
    let mut policy = SessionPolicy::default();
    policy.outfit.allow_change = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);
    login(&mut engine, 1, "alice", "secret", "Greta");

    command(
        &mut engine,
        1,
        Decoded::Player(PlayerCommand::SetOutfit(Outfit::default())),
    );

    assert!(commands.lock().unwrap().commands.is_empty());
}

#[test]
fn test_mount_toggle_dropped_without_mounts() {
    let (world, accounts) = standard();
    let commands = world.state.clone();
    let mut policy = SessionPolicy::default();
    policy.outfit.allow_mounts = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);
    login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, Decoded::Player(PlayerCommand::ToggleMount(true)));

    assert!(commands.lock().unwrap().commands.is_empty());
}

#[test]
fn test_removed_creature_may_only_log_out() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let commands = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (_, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    // The character dies but the session survives.
    {
        let mut state = placed.lock().unwrap();
        state.creatures.remove(&1);
        state.positions.remove(&1);
    }
    command(&mut engine, 1, Decoded::Player(PlayerCommand::Walk(Direction::North)));
    assert!(commands.lock().unwrap().commands.is_empty(), "dead creature acted");

    command(&mut engine, 1, Decoded::Session(SessionCommand::Logout));
    assert!(closed.load(Ordering::Relaxed));
    assert!(engine.by_creature.is_empty());
}

// --- logout ---

#[test]
fn test_logout_closes_the_session() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (_, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, Decoded::Session(SessionCommand::Logout));

    assert!(placed.lock().unwrap().creatures.is_empty());
    assert!(closed.load(Ordering::Relaxed));
    assert!(engine.online_accounts.is_empty());
}

#[test]
fn test_logout_refused_during_a_fight() {
    let (mut world, accounts) = standard();
    world.no_logout = vec![1];
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, Decoded::Session(SessionCommand::Logout));

    let (class, text) = status(&last_batch(&outbox));
    assert_eq!(class, MessageClass::StatusSmall.as_byte());
    assert_eq!(text, "You may not logout during or immediately after a fight!");
    assert!(!closed.load(Ordering::Relaxed), "denied logout closed the session");
    assert!(placed.lock().unwrap().creatures.contains_key(&1));
}

// --- abuse escalation ---

#[test]
fn test_unknown_opcode_banishes_and_kicks() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let sanctions = accounts.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    step(&mut engine, GameTask::UnknownOpcode { session: SessionId(1), opcode: 0x99 });

    {
        let state = sanctions.lock().unwrap();
        assert_eq!(state.warnings.get(&11), Some(&1));
        assert_eq!(
            state.sanctions[0],
            (
                11,
                Sanction::Banish { duration_secs: 7 * 24 * 60 * 60 },
                "Sending unknown packets to the server.".to_string()
            )
        );
    }
    let (class, text) = status(&last_batch(&outbox));
    assert_eq!(class, MessageClass::Info.as_byte());
    assert_eq!(text, "You have been banished.");
    assert!(!closed.load(Ordering::Relaxed), "the farewell precedes the kick");

    step(&mut engine, GameTask::KickDue { session: SessionId(1) });

    assert!(placed.lock().unwrap().creatures.is_empty());
    assert!(closed.load(Ordering::Relaxed));
}

#[test]
fn test_repeat_offenders_climb_the_sanction_ladder() {
    for (prior, expect_final, expect_deletion) in [(3u32, true, false), (4, false, true)] {
        let (world, accounts) = standard();
        let sanctions = accounts.state.clone();
        sanctions.lock().unwrap().warnings.insert(11, prior);
        let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
        login(&mut engine, 1, "alice", "secret", "Greta");

        step(&mut engine, GameTask::UnknownOpcode { session: SessionId(1), opcode: 0x99 });

        let state = sanctions.lock().unwrap();
        assert_eq!(
            matches!(state.sanctions[0].1, Sanction::FinalBanish { .. }),
            expect_final,
            "wrong sanction after {prior} prior warnings"
        );
        assert_eq!(
            matches!(state.sanctions[0].1, Sanction::Deletion),
            expect_deletion,
            "wrong sanction after {prior} prior warnings"
        );
    }
}

#[test]
fn test_unknown_opcode_ignored_when_escalation_is_off() {
    let (world, accounts) = standard();
    let sanctions = accounts.state.clone();
    let mut policy = SessionPolicy::default();
    policy.escalate_unknown_opcodes = false;
    let mut engine = engine_with(world, accounts, FakeChat::new(), policy);
    login(&mut engine, 1, "alice", "secret", "Greta");

    step(&mut engine, GameTask::UnknownOpcode { session: SessionId(1), opcode: 0x99 });

    assert!(sanctions.lock().unwrap().sanctions.is_empty());
    assert!(engine.sessions.get(&SessionId(1)).is_some_and(|s| s.playing()));
}

// --- keep-alive ---

#[test]
fn test_quiet_connection_gets_pinged() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    engine
        .sessions
        .get_mut(&SessionId(1))
        .expect("session")
        .last_ping = past(6);
    engine.ping_sessions(Instant::now());
    engine.flush_all();

    assert_eq!(last_batch(&outbox), vec![server::PING]);
}

#[test]
fn test_silent_connection_is_kicked() {
    let (world, accounts) = standard();
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (_, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    engine
        .sessions
        .get_mut(&SessionId(1))
        .expect("session")
        .last_pong = past(61);
    engine.ping_sessions(Instant::now());
    engine.flush_all();

    assert!(placed.lock().unwrap().creatures.is_empty());
    assert!(closed.load(Ordering::Relaxed));
    assert!(engine.by_creature.is_empty());
}

#[test]
fn test_ping_kick_waits_out_a_fight() {
    let (mut world, accounts) = standard();
    world.no_logout = vec![1];
    let placed = world.state.clone();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (_, closed) = login(&mut engine, 1, "alice", "secret", "Greta");

    engine
        .sessions
        .get_mut(&SessionId(1))
        .expect("session")
        .last_pong = past(61);
    engine.ping_sessions(Instant::now());
    engine.flush_all();

    assert!(placed.lock().unwrap().creatures.contains_key(&1));
    assert!(!closed.load(Ordering::Relaxed), "kick must wait for the fight to end");
}

// --- vip lists ---

#[test]
fn test_vip_add_validations() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Greta".into() }));
    assert_eq!(status(&last_batch(&outbox)).1, "You cannot add yourself.");

    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Hugo".into() }));
    let batch = last_batch(&outbox);
    assert_eq!(batch[0], server::VIP_ENTRY);
    assert_eq!(&batch[1..5], &2u32.to_le_bytes());
    let mut reader = PacketReader::new(&batch[5..]);
    assert_eq!(reader.get_string().expect("name"), "Hugo");
    assert_eq!(reader.get_u8().expect("online"), 0, "Hugo is offline");

    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Hugo".into() }));
    assert_eq!(status(&last_batch(&outbox)).1, "This player is already in your list.");

    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Nobody".into() }));
    assert_eq!(status(&last_batch(&outbox)).1, "A player with this name does not exist.");
}

#[test]
fn test_vip_list_capacity_depends_on_premium() {
    let (world, accounts) = standard();
    let vips = accounts.state.clone();
    {
        let mut state = vips.lock().unwrap();
        for filler in 1000..1100 {
            state.vip.push((11, filler));
        }
    }
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Hugo".into() }));
    assert_eq!(status(&last_batch(&outbox)).1, "You cannot add more buddies.");

    // A premium account holds twice as many entries.
    let (world, mut accounts) = standard();
    let mut greta = character_record(1, "Greta");
    greta.premium = true;
    accounts.add_character(11, greta);
    {
        let mut state = accounts.state.lock().unwrap();
        for filler in 1000..1100 {
            state.vip.push((11, filler));
        }
    }
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    command(&mut engine, 1, Decoded::Session(SessionCommand::AddVip { name: "Hugo".into() }));
    assert_eq!(last_batch(&outbox)[0], server::VIP_ENTRY);
}

#[test]
fn test_vip_watchers_see_logins_and_logouts() {
    let (world, accounts) = standard();
    // Hugo watches Greta.
    accounts.state.lock().unwrap().vip.push((22, 1));
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (out_hugo, _) = login(&mut engine, 1, "bob", "hunter", "Hugo");

    login(&mut engine, 2, "alice", "secret", "Greta");
    let mut online = vec![server::VIP_ONLINE];
    online.extend_from_slice(&1u32.to_le_bytes());
    assert!(
        last_batch(&out_hugo).ends_with(&online),
        "watcher missed the login"
    );

    command(&mut engine, 2, Decoded::Session(SessionCommand::Logout));
    let mut offline = vec![server::VIP_OFFLINE];
    offline.extend_from_slice(&1u32.to_le_bytes());
    assert!(
        last_batch(&out_hugo).ends_with(&offline),
        "watcher missed the logout"
    );
}

// --- conversation channels ---

#[test]
fn test_own_channel_creation_and_invite() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (out1, _) = login(&mut engine, 1, "alice", "secret", "Greta");
    let (out2, _) = login(&mut engine, 2, "bob", "hunter", "Hugo");

    command(&mut engine, 1, Decoded::Session(SessionCommand::CreateOwnChannel));
    let created = last_batch(&out1);
    assert_eq!(created[0], server::CHANNEL_CREATE);
    let channel = u16::from_le_bytes([created[1], created[2]]);
    let mut reader = PacketReader::new(&created[3..]);
    assert_eq!(reader.get_string().expect("name"), "Greta's Channel");

    command(
        &mut engine,
        1,
        Decoded::Session(SessionCommand::ChannelInvite { name: "hugo".into() }),
    );
    let event = last_batch(&out1);
    assert_eq!(event[0], server::CHANNEL_EVENT);
    assert_eq!(u16::from_le_bytes([event[1], event[2]]), channel);
    let (class, text) = status(&last_batch(&out2));
    assert_eq!(class, MessageClass::Info.as_byte());
    assert_eq!(text, "Greta invites you to a private chat channel.");
}

#[test]
fn test_private_chat_window_uses_the_stored_name() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());
    let (outbox, _) = login(&mut engine, 1, "alice", "secret", "Greta");

    command(
        &mut engine,
        1,
        Decoded::Session(SessionCommand::OpenPrivate { receiver: "hugo".into() }),
    );
    assert_eq!(
        text_after_opcode(&last_batch(&outbox), server::CHANNEL_PRIVATE),
        "Hugo",
        "the window carries the canonical spelling"
    );

    command(
        &mut engine,
        1,
        Decoded::Session(SessionCommand::OpenPrivate { receiver: "Nobody".into() }),
    );
    assert_eq!(status(&last_batch(&outbox)).1, "A player with this name does not exist.");
}

// --- loop control ---

#[test]
fn test_shutdown_stops_the_loop() {
    let (world, accounts) = standard();
    let mut engine = engine_with(world, accounts, FakeChat::new(), SessionPolicy::default());

    assert!(engine.apply(GameTask::Think), "upkeep must keep the loop running");
    assert!(!engine.apply(GameTask::Shutdown));
}
