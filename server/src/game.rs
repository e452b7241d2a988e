use log::info;
use rand::Rng;
use shared::{Hint, SpecialEffect};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One roster slot. Slots are appended in join order and never removed;
/// a disconnect only clears `connected` so the turn rotation can pass over
/// the player without renumbering anyone.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub id: u32,
    pub skips_pending: u32,
    pub connected: bool,
}

/// Outcome of one accepted guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub hint: Hint,
    pub effect: Option<SpecialEffect>,
    pub win: bool,
    /// `None` exactly when `win` is true.
    pub next_player: Option<u32>,
}

/// Rule violations. None of these mutate state; the server relays the
/// rendered message back to the offending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessError {
    UnknownPlayer,
    NotYourTurn,
    OutOfBounds,
    CellAlreadyResolved,
}

impl fmt::Display for GuessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuessError::UnknownPlayer => write!(f, "unknown player"),
            GuessError::NotYourTurn => write!(f, "not your turn"),
            GuessError::OutOfBounds => write!(f, "guess is outside the grid"),
            GuessError::CellAlreadyResolved => write!(f, "cell already guessed"),
        }
    }
}

impl std::error::Error for GuessError {}

/// Authoritative game state: treasure location, one-shot special cells,
/// resolved-cell history and the turn rotation. Pure state machine, no I/O.
#[derive(Debug, Clone)]
pub struct GameState {
    size: i32,
    special_count: usize,
    treasure: (i32, i32),
    specials: HashMap<(i32, i32), SpecialEffect>,
    resolved: HashSet<(i32, i32)>,
    players: Vec<PlayerSlot>,
    turn_index: usize,
}

impl GameState {
    /// New state with a freshly rolled treasure and special-cell layout.
    pub fn new(size: i32, special_count: usize) -> Self {
        let mut state = Self {
            size: size.max(1),
            special_count,
            treasure: (0, 0),
            specials: HashMap::new(),
            resolved: HashSet::new(),
            players: Vec::new(),
            turn_index: 0,
        };
        state.reset();
        state
    }

    /// New state with a fixed layout instead of a random roll. `reset` on a
    /// state built this way re-rolls randomly like any other.
    pub fn with_layout(
        size: i32,
        treasure: (i32, i32),
        specials: HashMap<(i32, i32), SpecialEffect>,
    ) -> Self {
        debug_assert!(!specials.contains_key(&treasure));
        Self {
            size,
            special_count: specials.len(),
            treasure,
            specials,
            resolved: HashSet::new(),
            players: Vec::new(),
            turn_index: 0,
        }
    }

    /// Start a new round: re-roll treasure and specials, clear guess history
    /// and pending skips, rewind the turn cursor. The roster and its join
    /// order are preserved.
    pub fn reset(&mut self) {
        let mut rng = rand::thread_rng();
        self.treasure = (rng.gen_range(0..self.size), rng.gen_range(0..self.size));
        self.specials.clear();
        // the treasure cell is excluded, so at most size^2 - 1 specials fit
        let want = self
            .special_count
            .min((self.size * self.size - 1).max(0) as usize);
        while self.specials.len() < want {
            let cell = (rng.gen_range(0..self.size), rng.gen_range(0..self.size));
            if cell == self.treasure {
                continue;
            }
            let effect = if rng.gen_bool(0.5) {
                SpecialEffect::ExtraTurn
            } else {
                SpecialEffect::LoseTurn
            };
            self.specials.insert(cell, effect);
        }
        self.resolved.clear();
        self.turn_index = 0;
        for slot in &mut self.players {
            slot.skips_pending = 0;
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Append a player to the rotation. Must happen before any guess from
    /// that id is resolved.
    pub fn add_player(&mut self, id: u32) {
        info!("player {} joined the rotation", id);
        self.players.push(PlayerSlot {
            id,
            skips_pending: 0,
            connected: true,
        });
    }

    /// Id of the player holding the floor, `None` on an empty roster.
    pub fn current_player(&self) -> Option<u32> {
        self.players.get(self.turn_index).map(|slot| slot.id)
    }

    /// Flip a roster slot's liveness. Disconnected players keep their slot
    /// but are passed over by `advance_turn`.
    pub fn mark_connected(&mut self, id: u32, connected: bool) {
        if let Some(slot) = self.players.iter_mut().find(|slot| slot.id == id) {
            slot.connected = connected;
        }
    }

    pub fn is_connected(&self, id: u32) -> bool {
        self.players
            .iter()
            .any(|slot| slot.id == id && slot.connected)
    }

    /// Resolve one guess. Rejections leave the state untouched.
    pub fn guess(&mut self, id: u32, x: i32, y: i32) -> Result<Resolution, GuessError> {
        if !self.players.iter().any(|slot| slot.id == id) {
            return Err(GuessError::UnknownPlayer);
        }
        if self.current_player() != Some(id) {
            return Err(GuessError::NotYourTurn);
        }
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return Err(GuessError::OutOfBounds);
        }
        if self.resolved.contains(&(x, y)) {
            return Err(GuessError::CellAlreadyResolved);
        }

        let win = (x, y) == self.treasure;
        let hint = if win {
            Hint::Treasure
        } else {
            let dx = (x - self.treasure.0).abs();
            let dy = (y - self.treasure.1).abs();
            if dx == 0 {
                Hint::SameColumn
            } else if dy == 0 {
                Hint::SameRow
            } else {
                Hint::Distance((dx + dy) as u32)
            }
        };

        // pop semantics: a triggered effect never fires again
        let effect = self.specials.remove(&(x, y));
        if effect == Some(SpecialEffect::LoseTurn) {
            if let Some(slot) = self.players.iter_mut().find(|slot| slot.id == id) {
                slot.skips_pending += 1;
            }
        }

        if !win {
            self.resolved.insert((x, y));
        }
        if !win && effect != Some(SpecialEffect::ExtraTurn) {
            self.advance_turn();
        }

        Ok(Resolution {
            hint,
            effect,
            win,
            next_player: if win { None } else { self.current_player() },
        })
    }

    /// Cyclically step the turn cursor to the next eligible player.
    ///
    /// Disconnected slots are passed over without consuming anything. A slot
    /// with pending skips has exactly one skip consumed and is passed over.
    /// Both searches are bounded by the roster size: when every reachable
    /// slot consumed a skip this pass, the next connected slot takes the
    /// turn regardless, so a single-player roster can never deadlock.
    pub fn advance_turn(&mut self) {
        let n = self.players.len();
        if n == 0 {
            return;
        }
        for _ in 0..n {
            self.turn_index = (self.turn_index + 1) % n;
            let slot = &mut self.players[self.turn_index];
            if !slot.connected {
                continue;
            }
            if slot.skips_pending > 0 {
                slot.skips_pending -= 1;
                continue;
            }
            return;
        }
        for _ in 0..n {
            self.turn_index = (self.turn_index + 1) % n;
            if self.players[self.turn_index].connected {
                return;
            }
        }
    }
}
