//! Login refusal texts, formatted exactly as the classic client expects
//! them, line breaks included.

use eldermoor_world::BanRecord;

pub const INVALID_ACCOUNT: &str = "Invalid account name.";
pub const INVALID_PASSWORD: &str = "Invalid password.";
pub const WORLD_STARTING: &str = "Gameworld is just starting up, please wait.";
pub const WORLD_MAINTENANCE: &str =
    "Gameworld is under maintenance, please re-connect in a while.";
pub const WORLD_CLOSED: &str = "Gameworld is currently closed, please come back later.";
pub const IP_BANISHED: &str = "Your IP is banished!";
pub const CHARACTER_LOAD_FAILED: &str = "Your character could not be loaded.";
pub const NAMELOCKED: &str = "Your character has been namelocked.";
pub const NOT_GAMEMASTER: &str =
    "You are not a gamemaster! Turn off the gamemaster mode in your IP changer.";
pub const ONE_CHARACTER_ONLY: &str =
    "You may only login with one character\nof your account at the same time.";
pub const ALREADY_LOGGED_IN: &str = "You are already logged in.";
pub const START_POSITION_BROKEN: &str =
    "Temple position is wrong. Contact with the administration.";

/// Version gate text; `version_text` is the human-readable accepted range
/// from configuration.
pub fn version_refusal(version_text: &str) -> String {
    format!("Only clients with protocol {version_text} allowed!")
}

/// What a ban record applies to, for the message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanScope {
    Account,
    Character,
}

impl BanScope {
    fn noun(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Character => "character",
        }
    }
}

/// Multi-line ban notice. A deletion has no lift date; a banishment quotes
/// one.
pub fn ban_message(scope: BanScope, deleted: bool, record: &BanRecord) -> String {
    let noun = scope.noun();
    let verb = if deleted { "deleted" } else { "banished" };
    let tail = if deleted {
        format!("{noun} won't be undeleted")
    } else {
        format!("banishment will be lifted at:\n{}", record.expires)
    };
    format!(
        "Your {noun} has been {verb} at:\n{issued} by: {actor},\nfor the following reason:\n\
         {reason}.\nThe action taken was:\n{action}.\nThe comment given was:\n{comment}.\n\
         Your {tail}.",
        issued = record.issued,
        actor = record.actor,
        reason = record.reason,
        action = record.action,
        comment = record.comment,
    )
}
