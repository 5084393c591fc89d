//! Command-line argument parsing for the Eldermoor server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Eldermoor server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "eldermoor", about = "Eldermoor game server")]
pub struct CliArgs {
    /// Bind address for the game listener.
    #[arg(long)]
    pub bind: Option<String>,

    /// Game port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Player cap.
    #[arg(long)]
    pub max_players: Option<u32>,

    /// Kick the old session when a character logs in twice.
    #[arg(long)]
    pub replace_on_login: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(cap) = args.max_players {
            self.server.max_players = cap;
        }
        if let Some(replace) = args.replace_on_login {
            self.login.replace_on_login = replace;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
