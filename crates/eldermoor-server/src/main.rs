//! Eldermoor game server binary.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags. Boots the game engine on its own thread, then runs the TCP
//! listener on a tokio runtime, with the bundled in-memory demo world so
//! the server is playable out of the box.

mod connection;
mod demo;
mod gate;
mod logging;
mod platform;
mod server;

use std::sync::Arc;

use clap::Parser;
use eldermoor_config::{CliArgs, Config};
use eldermoor_dispatch::{Scheduler, TIMED_TASK_EXPIRATION, task_channel};
use eldermoor_proto::{GameEngine, GameTask, SessionPolicy};
use tracing::{error, info};

use crate::gate::AttemptGate;
use crate::server::GameServer;

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .expect("Failed to resolve config directory")
            .join("eldermoor")
    });

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    logging::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let addr = platform::resolve_bind_address(&config.server.bind_address, config.server.port)
        .expect("Failed to resolve bind address");
    info!(
        max_players = config.server.max_players,
        replace_on_login = config.login.replace_on_login,
        "eldermoor server starting"
    );

    let policy = SessionPolicy::from_config(&config);
    let max_oversized_frames = policy.max_oversized_frames;
    let gate = Arc::new(AttemptGate::from_config(&config));

    // The queue feeds the single game thread; the timer thread and every
    // connection task push into it.
    let (tasks, queue) = task_channel(TIMED_TASK_EXPIRATION);
    let scheduler = Scheduler::spawn(tasks.clone()).expect("Failed to start timer thread");

    let mut engine = GameEngine::new(
        Box::new(demo::DemoWorld::new()),
        Box::new(demo::DemoDirectory::new()),
        Box::new(demo::DemoChat::new()),
        policy,
        gate.clone(),
        queue,
        scheduler,
    );
    let game_thread = std::thread::Builder::new()
        .name("game".into())
        .spawn(move || engine.run())
        .expect("Failed to start game thread");

    demo::announce_accounts();

    let server = GameServer::new(gate, tasks.clone(), max_oversized_frames);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to start tokio runtime");
    if let Err(e) = runtime.block_on(server.run(addr)) {
        error!("game listener failed: {e}");
    }

    // The timer thread holds a queue sender, so the engine never sees the
    // queue close on its own; tell it to stop before joining.
    let _ = tasks.push(GameTask::Shutdown);
    let _ = game_thread.join();
}
