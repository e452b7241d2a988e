//! Wire protocol and shared constants for the treasure-hunt server.
//!
//! Every message is a single JSON object tagged by a `type` field and
//! terminated by one `\n` byte. This crate only defines the types; framing
//! and socket handling live in the server crate.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_GRID_SIZE: i32 = 10;
pub const DEFAULT_SPECIAL_CELLS: usize = 30;
pub const DEFAULT_MAX_PLAYERS: usize = 4;
pub const DEFAULT_PORT: u16 = 4000;

/// Wire identity for a client id. Ids are assigned by the server at connect
/// time and never reused for the lifetime of the process.
pub fn player_name(id: u32) -> String {
    format!("P{}", id)
}

/// One-shot bonus/penalty attached to a subset of non-treasure cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialEffect {
    ExtraTurn,
    LoseTurn,
}

/// Proximity feedback for a guess. Column/row matches take priority over
/// the plain Manhattan distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Treasure,
    SameColumn,
    SameRow,
    Distance(u32),
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Treasure => write!(f, "treasure found"),
            Hint::SameColumn => write!(f, "same column"),
            Hint::SameRow => write!(f, "same row"),
            Hint::Distance(d) => write!(f, "{} away", d),
        }
    }
}

/// All message kinds, client->server and server->client, in one closed
/// enumeration decoded once at the connection boundary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Packet {
    // client -> server
    Guess {
        x: i32,
        y: i32,
    },
    Ready,

    // server -> client
    Welcome {
        id: String,
        grid: i32,
    },
    PlayerJoined {
        players: Vec<String>,
    },
    PlayerStatus {
        player: String,
        ready: bool,
    },
    AllReady,
    YourTurn {
        player: String,
    },
    Feedback {
        player: String,
        x: i32,
        y: i32,
        hint: String,
        effect: Option<SpecialEffect>,
        win: bool,
    },
    GameOver {
        winner: String,
    },
    Rejected {
        reason: String,
    },
}
