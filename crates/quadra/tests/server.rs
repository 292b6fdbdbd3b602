//! Integration tests for the Quadra server: handshake, lobby flow,
//! in-game actions and reconnection, all over real TCP.

use std::sync::Arc;
use std::time::Duration;

use quadra::QuadraServerBuilder;
use quadra_game::testkit::{GridBuilder, GridRules};
use quadra_protocol::{
    Action, Codec, HealthTier, JsonCodec, Message, MessageKind, PlayerId,
    Position, TokenId,
};
use quadra_transport::{connect, TcpConnection};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(QuadraServerBuilder::new()).await
}

async fn start_server_with(builder: QuadraServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build(GridBuilder, GridRules::new())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn send(conn: &Arc<TcpConnection>, msg: &Message) {
    let payload = JsonCodec.encode(msg).expect("encode");
    conn.send(&payload).await.expect("send");
}

async fn recv(conn: &Arc<TcpConnection>) -> Message {
    let payload = tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("recv timed out")
        .expect("recv failed")
        .expect("stream ended");
    JsonCodec.decode(&payload).expect("decode")
}

/// Reads until a message of the given kind arrives, skipping others.
async fn recv_kind(conn: &Arc<TcpConnection>, kind: MessageKind) -> Message {
    for _ in 0..32 {
        let msg = recv(conn).await;
        if msg.kind == kind {
            return msg;
        }
    }
    panic!("no {kind} message arrived");
}

/// Connects and completes the Connect handshake.
async fn connect_player(addr: &str) -> (Arc<TcpConnection>, PlayerId) {
    let conn = connect(addr).await.expect("should connect");
    send(&conn, &Message::new(MessageKind::Connect)).await;
    let ack = recv(&conn).await;
    assert_eq!(ack.kind, MessageKind::ConnectAck);
    let player_id = ack.player_id.clone().expect("assigned identity");
    (conn, player_id)
}

/// Two players through create, join, ready and start, drained up to
/// and including their FullState and initial TurnChange.
async fn started_pair(
    addr: &str,
) -> (
    (Arc<TcpConnection>, PlayerId),
    (Arc<TcpConnection>, PlayerId),
    u64,
) {
    let (c1, p1) = connect_player(addr).await;
    let (c2, p2) = connect_player(addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("alice"))
            .with("game_name", json!("table")),
    )
    .await;
    let joined = recv_kind(&c1, MessageKind::PlayerJoined).await;
    let game_id = joined.get_u64("game_id").expect("game_id");

    send(
        &c2,
        &Message::new(MessageKind::JoinGame)
            .with("game_id", json!(game_id))
            .with("player_name", json!("bob")),
    )
    .await;
    recv_kind(&c2, MessageKind::PlayerJoined).await;

    send(&c1, &Message::new(MessageKind::Ready)).await;
    send(&c2, &Message::new(MessageKind::Ready)).await;
    // The host must see both Ready broadcasts before starting, or the
    // start request can race ahead of bob's ready flag.
    recv_kind(&c1, MessageKind::Ready).await;
    recv_kind(&c1, MessageKind::Ready).await;

    send(&c1, &Message::new(MessageKind::StartGame)).await;
    for conn in [&c1, &c2] {
        recv_kind(conn, MessageKind::FullState).await;
        recv_kind(conn, MessageKind::TurnChange).await;
    }

    ((c1, p1), (c2, p2), game_id)
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_connect_assigns_identity() {
    let addr = start_server().await;
    let (_conn, player_id) = connect_player(&addr).await;

    assert_eq!(player_id.as_str().len(), 32);
    assert!(player_id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_first_message_other_than_connect_is_rejected() {
    let addr = start_server().await;
    let conn = connect(&addr).await.expect("should connect");

    send(&conn, &Message::new(MessageKind::Heartbeat)).await;

    let err = recv(&conn).await;
    assert_eq!(err.kind, MessageKind::Error);
    assert!(err.get_str("message").unwrap().contains("Connect or Reconnect"));

    // The server hangs up after the rejection.
    let end = tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("close timed out");
    assert!(matches!(end, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_silent_connection_is_dropped_after_deadline() {
    let addr = start_server_with(
        QuadraServerBuilder::new().handshake_timeout(Duration::from_millis(100)),
    )
    .await;
    let conn = connect(&addr).await.expect("should connect");

    let end = tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("close timed out");
    assert!(matches!(end, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_heartbeat_ack_echoes_client_timestamp() {
    let addr = start_server().await;
    let (conn, _) = connect_player(&addr).await;

    let heartbeat = Message::new(MessageKind::Heartbeat);
    let sent_at = heartbeat.timestamp;
    send(&conn, &heartbeat).await;

    let ack = recv(&conn).await;
    assert_eq!(ack.kind, MessageKind::HeartbeatAck);
    assert_eq!(ack.get_u64("client_timestamp"), Some(sent_at));
}

#[tokio::test]
async fn test_malformed_message_gets_error_but_keeps_connection() {
    let addr = start_server().await;
    let (conn, _) = connect_player(&addr).await;

    conn.send("this is not json").await.expect("send");
    let err = recv(&conn).await;
    assert_eq!(err.kind, MessageKind::Error);

    // Still connected and serviced.
    send(&conn, &Message::new(MessageKind::Heartbeat)).await;
    assert_eq!(recv(&conn).await.kind, MessageKind::HeartbeatAck);
}

// =========================================================================
// Lobby flow
// =========================================================================

#[tokio::test]
async fn test_list_games_shows_waiting_lobby() {
    let addr = start_server().await;
    let (c1, _) = connect_player(&addr).await;
    let (c2, _) = connect_player(&addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("alice"))
            .with("game_name", json!("table")),
    )
    .await;
    recv_kind(&c1, MessageKind::PlayerJoined).await;

    send(&c2, &Message::new(MessageKind::ListGames)).await;
    let list = recv_kind(&c2, MessageKind::GameList).await;

    let games = list.get("games").unwrap().as_array().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["name"], "table");
    assert_eq!(games[0]["players"], 1);
    assert_eq!(games[0]["max_players"], 4);
}

#[tokio::test]
async fn test_invalid_player_name_is_rejected() {
    let addr = start_server().await;
    let (c1, _) = connect_player(&addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("   "))
            .with("game_name", json!("table")),
    )
    .await;
    let err = recv(&c1).await;
    assert_eq!(err.kind, MessageKind::Error);
}

#[tokio::test]
async fn test_full_match_start_flow() {
    let addr = start_server().await;
    let (c1, p1) = connect_player(&addr).await;
    let (c2, _p2) = connect_player(&addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("alice"))
            .with("game_name", json!("table")),
    )
    .await;
    let joined = recv_kind(&c1, MessageKind::PlayerJoined).await;
    assert_eq!(joined.get_bool("host"), Some(true));
    let game_id = joined.get_u64("game_id").expect("game_id");

    send(
        &c2,
        &Message::new(MessageKind::JoinGame)
            .with("game_id", json!(game_id))
            .with("player_name", json!("bob")),
    )
    .await;
    let joined2 = recv_kind(&c2, MessageKind::PlayerJoined).await;
    assert_eq!(joined2.get_u64("seat"), Some(1));

    send(&c1, &Message::new(MessageKind::Ready)).await;
    send(&c2, &Message::new(MessageKind::Ready)).await;
    recv_kind(&c1, MessageKind::Ready).await;
    recv_kind(&c1, MessageKind::Ready).await;

    send(&c1, &Message::new(MessageKind::StartGame)).await;

    let started = recv_kind(&c1, MessageKind::StartGame).await;
    assert_eq!(started.get_u64("game_id"), Some(game_id));
    assert_eq!(started.get("players").unwrap().as_array().unwrap().len(), 2);

    let full1 = recv_kind(&c1, MessageKind::FullState).await;
    assert_eq!(full1.get_u64("seat_id"), Some(0));
    assert!(full1.get("state").unwrap().is_object());

    let full2 = recv_kind(&c2, MessageKind::FullState).await;
    assert_eq!(full2.get_u64("seat_id"), Some(1));

    // The opening turn belongs to the host's seat.
    let turn = recv_kind(&c1, MessageKind::TurnChange).await;
    assert_eq!(turn.get_u64("seat_id"), Some(0));
    assert_eq!(turn.get_u64("turn_number"), Some(1));
    assert_eq!(turn.player_id.as_ref(), Some(&p1));
}

#[tokio::test]
async fn test_non_host_cannot_start() {
    let addr = start_server().await;
    let (c1, _) = connect_player(&addr).await;
    let (c2, _) = connect_player(&addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("alice"))
            .with("game_name", json!("table")),
    )
    .await;
    let joined = recv_kind(&c1, MessageKind::PlayerJoined).await;
    let game_id = joined.get_u64("game_id").unwrap();

    send(
        &c2,
        &Message::new(MessageKind::JoinGame)
            .with("game_id", json!(game_id))
            .with("player_name", json!("bob")),
    )
    .await;
    recv_kind(&c2, MessageKind::PlayerJoined).await;

    send(&c2, &Message::new(MessageKind::StartGame)).await;
    let err = recv_kind(&c2, MessageKind::Error).await;
    assert!(err.get_str("message").unwrap().contains("host"));
}

#[tokio::test]
async fn test_chat_is_relayed_to_the_lobby() {
    let addr = start_server().await;
    let ((c1, _p1), (c2, p2), _game_id) = started_pair(&addr).await;

    send(
        &c2,
        &Message::new(MessageKind::Chat).with("text", json!("good luck")),
    )
    .await;

    for conn in [&c1, &c2] {
        let chat = recv_kind(conn, MessageKind::Chat).await;
        assert_eq!(chat.player_id.as_ref(), Some(&p2));
        assert_eq!(chat.get_str("name"), Some("bob"));
        assert_eq!(chat.get_str("text"), Some("good luck"));
    }
}

// =========================================================================
// In-game actions
// =========================================================================

#[tokio::test]
async fn test_action_out_of_turn_is_rejected() {
    let addr = start_server().await;
    let ((_c1, _p1), (c2, _p2), _game_id) = started_pair(&addr).await;

    // Seat 0 (alice) has the opening turn; bob may not act.
    send(&c2, &Action::EndTurn.to_message()).await;

    let rejected = recv_kind(&c2, MessageKind::InvalidAction).await;
    assert_eq!(rejected.get_str("action"), Some("end_turn"));
    assert!(rejected.get_str("reason").unwrap().contains("not your turn"));
}

#[tokio::test]
async fn test_move_of_unknown_token_is_rejected() {
    let addr = start_server().await;
    let ((c1, _p1), _pair2, _game_id) = started_pair(&addr).await;

    let action = Action::Move {
        token_id: TokenId(99),
        destination: Position::new(1, 1),
    };
    send(&c1, &action.to_message()).await;

    let rejected = recv_kind(&c1, MessageKind::InvalidAction).await;
    assert_eq!(rejected.get_str("action"), Some("move"));
    assert!(rejected.get_str("reason").unwrap().contains("does not exist"));
}

#[tokio::test]
async fn test_deploy_is_broadcast_to_all_players() {
    let addr = start_server().await;
    let ((c1, _p1), (c2, _p2), _game_id) = started_pair(&addr).await;

    let action = Action::Deploy {
        tier: HealthTier::Ten,
        destination: Position::new(0, 0),
    };
    send(&c1, &action.to_message()).await;

    for conn in [&c1, &c2] {
        let deployed = recv_kind(conn, MessageKind::TokenDeployed).await;
        assert_eq!(deployed.get_u64("seat_id"), Some(0));
        assert_eq!(deployed.get_u64("tier"), Some(10));
        assert_eq!(
            deployed.get("position").unwrap(),
            &json!(Position::new(0, 0))
        );
    }
}

#[tokio::test]
async fn test_end_turn_broadcasts_turn_change() {
    let addr = start_server().await;
    let ((c1, _p1), (c2, p2), _game_id) = started_pair(&addr).await;

    send(&c1, &Action::EndTurn.to_message()).await;

    for conn in [&c1, &c2] {
        let turn = recv_kind(conn, MessageKind::TurnChange).await;
        assert_eq!(turn.get_u64("seat_id"), Some(1));
        assert_eq!(turn.get_u64("turn_number"), Some(2));
        assert_eq!(turn.player_id.as_ref(), Some(&p2));
    }
}

#[tokio::test]
async fn test_game_stays_live_while_a_peer_stops_reading() {
    let addr = start_server().await;
    let ((c1, _p1), (c2, _p2), _game_id) = started_pair(&addr).await;

    // Bob never reads again; his copies of every broadcast queue up
    // unread. Alice's view of the game must keep moving regardless,
    // so no handler may sit on the session lock while sending to him.
    for round in 0..8u64 {
        send(&c1, &Action::EndTurn.to_message()).await;
        let turn = recv_kind(&c1, MessageKind::TurnChange).await;
        assert_eq!(turn.get_u64("seat_id"), Some(1));
        assert_eq!(turn.get_u64("turn_number"), Some(2 * round + 2));

        send(&c2, &Action::EndTurn.to_message()).await;
        let turn = recv_kind(&c1, MessageKind::TurnChange).await;
        assert_eq!(turn.get_u64("seat_id"), Some(0));
        assert_eq!(turn.get_u64("turn_number"), Some(2 * round + 3));
    }
}

// =========================================================================
// Disconnect and reconnect
// =========================================================================

#[tokio::test]
async fn test_reconnect_with_unknown_identity_fails() {
    let addr = start_server().await;
    let conn = connect(&addr).await.expect("should connect");

    send(
        &conn,
        &Message::new(MessageKind::Reconnect).with_player(PlayerId("deadbeef".into())),
    )
    .await;

    let failed = recv(&conn).await;
    assert_eq!(failed.kind, MessageKind::ReconnectFailed);

    let end = tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("close timed out");
    assert!(matches!(end, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_abrupt_drop_and_reconnect_resumes_the_game() {
    let addr = start_server().await;
    let ((c1, _p1), (c2, p2), game_id) = started_pair(&addr).await;

    // Bob's connection dies mid-game without a Disconnect message.
    c2.close().await;

    let notice = recv_kind(&c1, MessageKind::PlayerDisconnected).await;
    assert_eq!(notice.player_id.as_ref(), Some(&p2));
    assert_eq!(notice.get_str("name"), Some("bob"));
    assert_eq!(notice.get_bool("can_reconnect"), Some(true));

    // Within the grace window, bob comes back on a new connection.
    let c2b = connect(&addr).await.expect("should connect");
    send(
        &c2b,
        &Message::new(MessageKind::Reconnect)
            .with_player(p2.clone())
            .with("game_id", json!(game_id)),
    )
    .await;

    let ack = recv(&c2b).await;
    assert_eq!(ack.kind, MessageKind::ReconnectAck);
    assert_eq!(ack.get_u64("game_id"), Some(game_id));

    let full = recv(&c2b).await;
    assert_eq!(full.kind, MessageKind::FullState);
    assert_eq!(full.get_u64("seat_id"), Some(1));
    assert!(full.get("state").unwrap().is_object());

    let rejoined = recv_kind(&c1, MessageKind::PlayerReconnected).await;
    assert_eq!(rejoined.player_id.as_ref(), Some(&p2));

    // The rebound connection is live: bob's out-of-turn action is
    // rejected on it, proving he is routed to the same game.
    send(&c2b, &Action::EndTurn.to_message()).await;
    let rejected = recv_kind(&c2b, MessageKind::InvalidAction).await;
    assert!(rejected.get_str("reason").unwrap().contains("not your turn"));
}

#[tokio::test]
async fn test_reconnect_with_wrong_game_id_fails() {
    let addr = start_server().await;
    let ((_c1, _p1), (c2, p2), game_id) = started_pair(&addr).await;

    c2.close().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let c2b = connect(&addr).await.expect("should connect");
    send(
        &c2b,
        &Message::new(MessageKind::Reconnect)
            .with_player(p2.clone())
            .with("game_id", json!(game_id + 1000)),
    )
    .await;

    let failed = recv(&c2b).await;
    assert_eq!(failed.kind, MessageKind::ReconnectFailed);

    // The record survives a mismatch, so a correct retry still works.
    let c2c = connect(&addr).await.expect("should connect");
    send(
        &c2c,
        &Message::new(MessageKind::Reconnect)
            .with_player(p2.clone())
            .with("game_id", json!(game_id)),
    )
    .await;
    assert_eq!(recv(&c2c).await.kind, MessageKind::ReconnectAck);
}

#[tokio::test]
async fn test_clean_disconnect_removes_player_for_good() {
    let addr = start_server().await;
    let (c1, _p1) = connect_player(&addr).await;
    let (c2, p2) = connect_player(&addr).await;

    send(
        &c1,
        &Message::new(MessageKind::CreateGame)
            .with("player_name", json!("alice"))
            .with("game_name", json!("table")),
    )
    .await;
    let joined = recv_kind(&c1, MessageKind::PlayerJoined).await;
    let game_id = joined.get_u64("game_id").unwrap();

    send(
        &c2,
        &Message::new(MessageKind::JoinGame)
            .with("game_id", json!(game_id))
            .with("player_name", json!("bob")),
    )
    .await;
    recv_kind(&c2, MessageKind::PlayerJoined).await;

    send(&c2, &Message::new(MessageKind::Disconnect)).await;

    let left = recv_kind(&c1, MessageKind::PlayerLeft).await;
    assert_eq!(left.player_id.as_ref(), Some(&p2));
    assert_eq!(left.get_str("name"), Some("bob"));

    // A clean leave opens no grace window.
    let c2b = connect(&addr).await.expect("should connect");
    send(
        &c2b,
        &Message::new(MessageKind::Reconnect).with_player(p2.clone()),
    )
    .await;
    assert_eq!(recv(&c2b).await.kind, MessageKind::ReconnectFailed);
}
