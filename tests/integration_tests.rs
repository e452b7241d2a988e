//! Integration tests driving the treasure-hunt server over real TCP
//! sockets: connection handshake, ready/lobby flow, guess resolution
//! broadcasting and failure handling.

use server::game::GameState;
use server::network::Server;
use shared::{Packet, SpecialEffect};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

/// One scripted player connection.
struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, packet: &Packet) {
        let mut line = serde_json::to_string(packet).expect("encode failed");
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("write failed");
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer
            .write_all(raw.as_bytes())
            .await
            .expect("write failed");
    }

    async fn recv(&mut self) -> Packet {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a packet")
            .expect("read failed")
            .expect("connection closed");
        serde_json::from_str(&line).expect("undecodable packet")
    }

    /// Skip packets until one matches the predicate.
    async fn recv_until(&mut self, pred: impl Fn(&Packet) -> bool) -> Packet {
        for _ in 0..32 {
            let packet = self.recv().await;
            if pred(&packet) {
                return packet;
            }
        }
        panic!("expected packet never arrived");
    }

    /// True once the server closes this connection.
    async fn closed(&mut self) -> bool {
        matches!(
            timeout(Duration::from_secs(5), self.lines.next_line()).await,
            Ok(Ok(None))
        )
    }
}

/// Boot a server with a pinned board layout on an ephemeral port.
async fn spawn_server(game: GameState, max_clients: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let server = Server::from_parts(listener, game, max_clients);
    let addr = server.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

fn board(treasure: (i32, i32), specials: HashMap<(i32, i32), SpecialEffect>) -> GameState {
    GameState::with_layout(10, treasure, specials)
}

/// Connect two clients, ready both, and consume everything up to and
/// including the opening YOUR_TURN for P1.
async fn start_two_player_round(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut c1 = TestClient::connect(addr).await;
    assert!(matches!(c1.recv().await, Packet::Welcome { .. }));
    let mut c2 = TestClient::connect(addr).await;
    assert!(matches!(c2.recv().await, Packet::Welcome { .. }));

    c1.send(&Packet::Ready).await;
    c2.send(&Packet::Ready).await;
    for client in [&mut c1, &mut c2] {
        client
            .recv_until(|p| matches!(p, Packet::AllReady))
            .await;
        assert_eq!(
            client.recv().await,
            Packet::YourTurn {
                player: "P1".to_string()
            }
        );
    }
    (c1, c2)
}

#[tokio::test]
async fn welcome_and_roster_broadcasts_on_connect() {
    let addr = spawn_server(board((3, 3), HashMap::new()), 4).await;

    let mut c1 = TestClient::connect(addr).await;
    assert_eq!(
        c1.recv().await,
        Packet::Welcome {
            id: "P1".to_string(),
            grid: 10
        }
    );
    assert_eq!(
        c1.recv().await,
        Packet::PlayerJoined {
            players: vec!["P1".to_string()]
        }
    );

    let mut c2 = TestClient::connect(addr).await;
    assert_eq!(
        c2.recv().await,
        Packet::Welcome {
            id: "P2".to_string(),
            grid: 10
        }
    );

    // the first client sees the updated roster
    assert_eq!(
        c1.recv().await,
        Packet::PlayerJoined {
            players: vec!["P1".to_string(), "P2".to_string()]
        }
    );
}

#[tokio::test]
async fn full_round_column_hint_then_win() {
    let addr = spawn_server(board((3, 3), HashMap::new()), 4).await;
    let (mut c1, mut c2) = start_two_player_round(addr).await;

    c1.send(&Packet::Guess { x: 3, y: 5 }).await;
    for client in [&mut c1, &mut c2] {
        assert_eq!(
            client.recv().await,
            Packet::Feedback {
                player: "P1".to_string(),
                x: 3,
                y: 5,
                hint: "same column".to_string(),
                effect: None,
                win: false,
            }
        );
        assert_eq!(
            client.recv().await,
            Packet::YourTurn {
                player: "P2".to_string()
            }
        );
    }

    c2.send(&Packet::Guess { x: 3, y: 3 }).await;
    for client in [&mut c1, &mut c2] {
        assert_eq!(
            client.recv().await,
            Packet::Feedback {
                player: "P2".to_string(),
                x: 3,
                y: 3,
                hint: "treasure found".to_string(),
                effect: None,
                win: true,
            }
        );
        // the winner is announced with no further turn handoff
        assert_eq!(
            client.recv().await,
            Packet::GameOver {
                winner: "P2".to_string()
            }
        );
    }

    // re-readying both players starts the next round on a fresh board
    c1.send(&Packet::Ready).await;
    c2.send(&Packet::Ready).await;
    for client in [&mut c1, &mut c2] {
        client
            .recv_until(|p| matches!(p, Packet::AllReady))
            .await;
        assert_eq!(
            client.recv().await,
            Packet::YourTurn {
                player: "P1".to_string()
            }
        );
    }
}

#[tokio::test]
async fn lose_turn_effect_skips_one_full_turn_on_the_wire() {
    let mut specials = HashMap::new();
    specials.insert((1, 1), SpecialEffect::LoseTurn);
    let addr = spawn_server(board((9, 9), specials), 4).await;
    let (mut c1, mut c2) = start_two_player_round(addr).await;

    c1.send(&Packet::Guess { x: 1, y: 1 }).await;
    let feedback = c2.recv().await;
    assert_eq!(
        feedback,
        Packet::Feedback {
            player: "P1".to_string(),
            x: 1,
            y: 1,
            hint: "16 away".to_string(),
            effect: Some(SpecialEffect::LoseTurn),
            win: false,
        }
    );
    assert_eq!(
        c2.recv().await,
        Packet::YourTurn {
            player: "P2".to_string()
        }
    );

    // P1's pending skip means the turn comes straight back to P2
    c2.send(&Packet::Guess { x: 0, y: 0 }).await;
    c2.recv_until(|p| matches!(p, Packet::Feedback { .. })).await;
    assert_eq!(
        c2.recv().await,
        Packet::YourTurn {
            player: "P2".to_string()
        }
    );

    // the skip is consumed, P1 is back in the rotation
    c2.send(&Packet::Guess { x: 0, y: 1 }).await;
    c2.recv_until(|p| matches!(p, Packet::Feedback { .. })).await;
    assert_eq!(
        c2.recv().await,
        Packet::YourTurn {
            player: "P1".to_string()
        }
    );
}

#[tokio::test]
async fn turn_violation_is_rejected_without_broadcast() {
    let addr = spawn_server(board((9, 9), HashMap::new()), 4).await;
    let (mut c1, mut c2) = start_two_player_round(addr).await;

    c2.send(&Packet::Guess { x: 0, y: 0 }).await;
    assert_eq!(
        c2.recv().await,
        Packet::Rejected {
            reason: "not your turn".to_string()
        }
    );

    // nothing reached the other client: its next packet is the feedback
    // for the legitimate guess below
    c1.send(&Packet::Guess { x: 0, y: 0 }).await;
    assert!(matches!(
        c1.recv().await,
        Packet::Feedback { player, .. } if player == "P1"
    ));
}

#[tokio::test]
async fn malformed_frames_are_dropped_and_the_connection_survives() {
    let addr = spawn_server(board((3, 3), HashMap::new()), 4).await;

    let mut c1 = TestClient::connect(addr).await;
    assert!(matches!(c1.recv().await, Packet::Welcome { .. }));

    c1.send_raw("this is not json\n").await;
    c1.send_raw("{\"type\":\"NO_SUCH_KIND\"}\n").await;

    // the connection is still up and commands still work
    c1.send(&Packet::Ready).await;
    let status = c1
        .recv_until(|p| matches!(p, Packet::PlayerStatus { .. }))
        .await;
    assert_eq!(
        status,
        Packet::PlayerStatus {
            player: "P1".to_string(),
            ready: true
        }
    );
}

#[tokio::test]
async fn connection_beyond_capacity_is_rejected_and_closed() {
    let addr = spawn_server(board((3, 3), HashMap::new()), 1).await;

    let mut c1 = TestClient::connect(addr).await;
    assert!(matches!(c1.recv().await, Packet::Welcome { .. }));

    let mut c2 = TestClient::connect(addr).await;
    assert_eq!(
        c2.recv().await,
        Packet::Rejected {
            reason: "server full".to_string()
        }
    );
    assert!(c2.closed().await);
}

#[tokio::test]
async fn disconnect_of_current_player_hands_the_turn_on() {
    let addr = spawn_server(board((9, 9), HashMap::new()), 4).await;
    let (c1, mut c2) = start_two_player_round(addr).await;

    // P1 holds the floor and vanishes
    drop(c1);

    assert_eq!(
        c2.recv().await,
        Packet::YourTurn {
            player: "P2".to_string()
        }
    );
}
