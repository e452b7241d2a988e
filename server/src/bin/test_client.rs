//! Headless scripted client for smoke-testing the server by hand.
//!
//! Connects, signals ready, then scans the board left-to-right top-to-bottom
//! whenever it holds the turn, printing every event it receives. Run one
//! instance per player slot against a local server.

use shared::Packet;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const SERVER_ADDR: &str = "127.0.0.1:4000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(SERVER_ADDR).await?;
    println!("connected to {}", SERVER_ADDR);
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let mut my_id = String::new();
    let mut grid = shared::DEFAULT_GRID_SIZE;
    let mut next_cell = 0;

    send(&mut write_half, &Packet::Ready).await?;
    println!("ready sent, waiting for the round to start");

    while let Some(line) = lines.next_line().await? {
        let packet: Packet = match serde_json::from_str(&line) {
            Ok(packet) => packet,
            Err(err) => {
                println!("undecodable frame ({}): {}", err, line);
                continue;
            }
        };

        match packet {
            Packet::Welcome { id, grid: size } => {
                println!("welcome: playing as {} on a {}x{} board", id, size, size);
                my_id = id;
                grid = size;
            }
            Packet::PlayerJoined { players } => {
                println!("roster: {:?}", players);
            }
            Packet::PlayerStatus { player, ready } => {
                println!("{} is {}", player, if ready { "ready" } else { "not ready" });
            }
            Packet::AllReady => {
                println!("all players ready, round starting");
                next_cell = 0;
            }
            Packet::YourTurn { player } => {
                if player == my_id {
                    let (x, y) = (next_cell % grid, next_cell / grid);
                    next_cell += 1;
                    println!("my turn: guessing ({}, {})", x, y);
                    send(&mut write_half, &Packet::Guess { x, y }).await?;
                } else {
                    println!("waiting for {}", player);
                }
            }
            Packet::Feedback {
                player,
                x,
                y,
                hint,
                effect,
                win,
            } => {
                println!(
                    "{} guessed ({}, {}): {}{}{}",
                    player,
                    x,
                    y,
                    hint,
                    effect
                        .map(|e| format!(" [effect: {:?}]", e))
                        .unwrap_or_default(),
                    if win { " -- WIN" } else { "" }
                );
            }
            Packet::GameOver { winner } => {
                println!("game over, winner: {}", winner);
                break;
            }
            Packet::Rejected { reason } => {
                println!("rejected: {}", reason);
            }
            other => {
                println!("unexpected packet: {:?}", other);
            }
        }
    }

    println!("test client finished");
    Ok(())
}

async fn send(
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut line = serde_json::to_string(packet)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}
