//! TCP network layer: accept loop, per-connection session tasks and the
//! lobby/round lifecycle.
//!
//! Every connected client gets one task reading newline-delimited JSON
//! frames and one task writing them. All command handling converges on a
//! single `Mutex<Shared>`: the guard spans validation, state mutation and
//! derivation of the outgoing packets, so two concurrent guesses can never
//! interleave against a stale turn cursor. The actual socket writes happen
//! in the writer tasks, outside the lock.

use crate::client_manager::ClientManager;
use crate::game::GameState;
use log::{debug, info, warn};
use shared::{player_name, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// Round lifecycle. `RoundOver` accepts READY exactly like `Lobby`; the
/// distinction only marks that a winner was announced this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Playing,
    RoundOver,
}

/// Everything behind the single mutual-exclusion domain.
#[derive(Debug)]
struct Shared {
    game: GameState,
    clients: ClientManager,
    phase: Phase,
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub grid_size: i32,
    pub special_cells: usize,
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grid_size: shared::DEFAULT_GRID_SIZE,
            special_cells: shared::DEFAULT_SPECIAL_CELLS,
            max_clients: shared::DEFAULT_MAX_PLAYERS,
        }
    }
}

/// Accepts connections and owns the shared game/registry state.
pub struct Server {
    listener: TcpListener,
    shared: Arc<Mutex<Shared>>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        let game = GameState::new(config.grid_size, config.special_cells);
        Ok(Self::from_parts(listener, game, config.max_clients))
    }

    /// Assemble a server from a pre-bound listener and a prepared game
    /// state. Lets tests pin both the port and the board layout.
    pub fn from_parts(listener: TcpListener, game: GameState, max_clients: usize) -> Self {
        Self {
            listener,
            shared: Arc::new(Mutex::new(Shared {
                game,
                clients: ClientManager::new(max_clients),
                phase: Phase::Lobby,
            })),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails, spawning one session
    /// task per client. A listener error is fatal to the server.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                handle_connection(stream, addr, shared).await;
            });
        }
    }
}

/// Writer half of one session: drains the outbound queue and frames each
/// packet as one JSON line. A failed write ends the task; the closed
/// channel then gets the session pruned on the next delivery attempt.
async fn write_outbound(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Packet>) {
    while let Some(packet) = rx.recv().await {
        let mut line = match serde_json::to_string(&packet) {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to encode outbound packet: {}", err);
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = write_half.write_all(line.as_bytes()).await {
            debug!("outbound write failed: {}", err);
            break;
        }
    }
}

/// Reader half of one session: register, greet, then decode and dispatch
/// frames until the peer goes away.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<Mutex<Shared>>) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_outbound(write_half, rx));

    let client_id = {
        let mut state = shared.lock().await;
        let Some(id) = state.clients.register(tx.clone()) else {
            warn!("rejecting connection from {}: server full", addr);
            let _ = tx.send(Packet::Rejected {
                reason: "server full".to_string(),
            });
            return;
        };
        state.game.add_player(id);
        let grid = state.game.size();
        state.clients.send_to(
            id,
            Packet::Welcome {
                id: player_name(id),
                grid,
            },
        );
        let roster = state.clients.roster();
        state.clients.broadcast(&Packet::PlayerJoined { players: roster });
        // a mid-round joiner still needs to know whose turn it is
        if state.phase == Phase::Playing {
            if let Some(current) = state.game.current_player() {
                state.clients.send_to(
                    id,
                    Packet::YourTurn {
                        player: player_name(current),
                    },
                );
            }
        }
        id
    };
    info!("{} connected from {}", player_name(client_id), addr);

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Packet>(&line) {
                    Ok(packet) => handle_packet(client_id, packet, &shared).await,
                    Err(err) => warn!(
                        "{}: dropping undecodable frame: {}",
                        player_name(client_id),
                        err
                    ),
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!("{}: read failed: {}", player_name(client_id), err);
                break;
            }
        }
    }

    handle_disconnect(client_id, &shared).await;
}

/// Dispatch one decoded command under the shared lock.
async fn handle_packet(client_id: u32, packet: Packet, shared: &Mutex<Shared>) {
    let mut state = shared.lock().await;
    match packet {
        Packet::Ready => match state.phase {
            Phase::Lobby | Phase::RoundOver => {
                if state.clients.set_ready(client_id, true) {
                    state.clients.broadcast(&Packet::PlayerStatus {
                        player: player_name(client_id),
                        ready: true,
                    });
                    if state.clients.all_ready() {
                        start_round(&mut state);
                    }
                }
            }
            Phase::Playing => {
                state.clients.send_to(
                    client_id,
                    Packet::Rejected {
                        reason: "round already in progress".to_string(),
                    },
                );
            }
        },
        Packet::Guess { x, y } => match state.phase {
            Phase::Playing => match state.game.guess(client_id, x, y) {
                Ok(resolution) => {
                    state.clients.broadcast(&Packet::Feedback {
                        player: player_name(client_id),
                        x,
                        y,
                        hint: resolution.hint.to_string(),
                        effect: resolution.effect,
                        win: resolution.win,
                    });
                    if let Some(next) = resolution.next_player {
                        state.clients.broadcast(&Packet::YourTurn {
                            player: player_name(next),
                        });
                    } else {
                        info!("{} found the treasure", player_name(client_id));
                        state.clients.broadcast(&Packet::GameOver {
                            winner: player_name(client_id),
                        });
                        state.clients.clear_ready();
                        state.phase = Phase::RoundOver;
                    }
                }
                Err(err) => {
                    debug!("{}: guess rejected: {}", player_name(client_id), err);
                    state.clients.send_to(
                        client_id,
                        Packet::Rejected {
                            reason: err.to_string(),
                        },
                    );
                }
            },
            Phase::Lobby | Phase::RoundOver => {
                state.clients.send_to(
                    client_id,
                    Packet::Rejected {
                        reason: "no round in progress".to_string(),
                    },
                );
            }
        },
        other => {
            warn!(
                "{}: unexpected inbound packet: {:?}",
                player_name(client_id),
                other
            );
        }
    }
}

/// Start a round: fresh board, cleared ready flags, turn announcement.
fn start_round(state: &mut Shared) {
    state.game.reset();
    state.clients.clear_ready();
    state.phase = Phase::Playing;
    info!("round started with {} players", state.game.player_count());
    // the first roster slot may belong to a player who already left
    if let Some(current) = state.game.current_player() {
        if !state.game.is_connected(current) {
            state.game.advance_turn();
        }
    }
    state.clients.broadcast(&Packet::AllReady);
    if let Some(current) = state.game.current_player() {
        state.clients.broadcast(&Packet::YourTurn {
            player: player_name(current),
        });
    }
}

/// Session teardown: prune the registry, keep the roster slot but mark it
/// disconnected, and hand the turn on if the leaver was holding the floor.
async fn handle_disconnect(client_id: u32, shared: &Mutex<Shared>) {
    let mut state = shared.lock().await;
    state.clients.remove(client_id);
    state.game.mark_connected(client_id, false);
    info!("{} disconnected", player_name(client_id));

    match state.phase {
        Phase::Playing => {
            if state.game.current_player() == Some(client_id) {
                state.game.advance_turn();
                if let Some(next) = state.game.current_player() {
                    state.clients.broadcast(&Packet::YourTurn {
                        player: player_name(next),
                    });
                }
            }
        }
        Phase::Lobby | Phase::RoundOver => {
            let roster = state.clients.roster();
            state.clients.broadcast(&Packet::PlayerJoined { players: roster });
            // the leaver may have been the last holdout
            if state.clients.all_ready() {
                start_round(&mut state);
            }
        }
    }
}
