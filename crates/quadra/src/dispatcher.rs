//! Per-connection handler: handshake, message routing, broadcasts.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. First message within the handshake deadline: Connect (assign a
//!      fresh identity) or Reconnect (claim a grace-window record)
//!   2. Loop: receive envelopes → dispatch lobby, game and system
//!      messages
//!   3. On stream end: open a grace window if the player was seated
//!      somewhere, otherwise remove them for good

use std::sync::Arc;

use quadra_game::{ActionOutcome, GameBuilder, GameState, Ruleset};
use quadra_protocol::{
    Action, ClientKind, Codec, LobbyId, Message, MessageKind, PlayerId,
    ProtocolError,
};
use quadra_session::SessionError;
use quadra_transport::TcpConnection;
use serde_json::json;
use tokio::time::timeout;

use crate::server::{PlayerHandle, ServerState};
use crate::QuadraError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<B, R>(
    conn: Arc<TcpConnection>,
    state: Arc<ServerState<B, R>>,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
    R: Ruleset<B::State>,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let player_id = match perform_handshake(&conn, &state).await {
        Ok(id) => id,
        Err(e) => {
            conn.close().await;
            return Err(e);
        }
    };

    let mut clean_exit = false;
    loop {
        let payload = match conn.recv().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let msg: Message = match state.codec.decode(&payload) {
            Ok(msg) => msg,
            Err(e) => {
                // A malformed envelope is the client's problem, not a
                // reason to drop the connection.
                if send_error(&conn, &state, &format!("malformed message: {e}"))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        match dispatch_message(&conn, &state, &player_id, msg).await {
            Ok(false) => {}
            Ok(true) => {
                clean_exit = true;
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "dispatch error, closing");
                break;
            }
        }
    }

    state.pool.lock().await.remove(conn_id);
    conn.close().await;

    if clean_exit {
        remove_player(&state, &player_id).await;
    } else {
        record_disconnect(&state, &player_id).await;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Waits for the first message and resolves it to a player identity.
///
/// Only Connect and Reconnect are legal openers; anything else, or
/// silence past the deadline, ends the connection.
async fn perform_handshake<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
) -> Result<PlayerId, QuadraError>
where
    B: GameBuilder,
{
    let payload = match timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(payload))) => payload,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let msg: Message = state.codec.decode(&payload)?;
    match msg.kind {
        MessageKind::Connect => handle_connect(conn, state, &msg).await,
        MessageKind::Reconnect => handle_reconnect(conn, state, &msg).await,
        other => {
            send_error(
                conn,
                state,
                &format!("first message must be Connect or Reconnect, got {other}"),
            )
            .await?;
            Err(ProtocolError::InvalidMessage(
                "first message must be Connect or Reconnect".into(),
            )
            .into())
        }
    }
}

/// Assigns a fresh identity to a new connection.
async fn handle_connect<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    msg: &Message,
) -> Result<PlayerId, QuadraError>
where
    B: GameBuilder,
{
    let kind = msg
        .get("client_kind")
        .and_then(|v| serde_json::from_value::<ClientKind>(v.clone()).ok())
        .unwrap_or(ClientKind::Human);

    let player_id = PlayerId::generate();
    state.players.lock().await.insert(
        player_id.clone(),
        PlayerHandle {
            conn_id: conn.id(),
            kind,
        },
    );
    state.pool.lock().await.insert(Arc::clone(conn));

    let ack = Message::new(MessageKind::ConnectAck)
        .with_player(player_id.clone())
        .with("player_id", json!(player_id.as_str()));
    send_message(conn, state, &ack).await?;

    tracing::info!(%player_id, conn_id = %conn.id(), ?kind, "player connected");
    Ok(player_id)
}

/// Rebinds a grace-window identity to a new connection and resyncs it.
async fn handle_reconnect<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    msg: &Message,
) -> Result<PlayerId, QuadraError>
where
    B: GameBuilder,
{
    let Some(player_id) = msg.player_id.clone() else {
        send_reconnect_failed(conn, state, "reconnect requires a player_id").await?;
        return Err(ProtocolError::InvalidMessage("reconnect without player_id".into()).into());
    };
    let game_id = msg.get_u64("game_id").map(LobbyId);

    let claim = state.disconnects.lock().await.claim(&player_id, game_id);
    let record = match claim {
        Ok(record) => record,
        Err(e @ SessionError::GraceExpired(_)) => {
            // The window is gone; the player's slots go with it.
            remove_player(state, &player_id).await;
            send_reconnect_failed(conn, state, &e.to_string()).await?;
            return Err(e.into());
        }
        Err(e) => {
            send_reconnect_failed(conn, state, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    {
        let mut players = state.players.lock().await;
        let handle = players.entry(player_id.clone()).or_insert(PlayerHandle {
            conn_id: conn.id(),
            kind: ClientKind::Human,
        });
        handle.conn_id = conn.id();
    }
    state.pool.lock().await.insert(Arc::clone(conn));

    let ack = Message::new(MessageKind::ReconnectAck)
        .with_player(player_id.clone())
        .with("game_id", json!(record.lobby_id.0));
    send_message(conn, state, &ack).await?;

    if record.in_game {
        let session = state
            .games
            .lock()
            .await
            .session_for(&player_id)
            .map(|(_, session)| session);
        if let Some(session) = session {
            // Read under the session lock, send after releasing it — a
            // stalled peer must never hold up the game's action lock.
            let (snapshot, seat) = {
                let session = session.lock().await;
                (session.snapshot(), session.seat_of(&player_id).map(|s| s.0))
            };
            let full = Message::new(MessageKind::FullState)
                .with("game_id", json!(record.lobby_id.0))
                .with("state", snapshot)
                .with("seat_id", json!(seat));
            send_message(conn, state, &full).await?;
        }
    }

    let name = display_name(state, &player_id).await;
    let notice = Message::new(MessageKind::PlayerReconnected)
        .with_player(player_id.clone())
        .with("name", json!(name));
    broadcast_lobby(state, record.lobby_id, &notice, Some(&player_id)).await;

    tracing::info!(%player_id, lobby_id = %record.lobby_id, "player reconnected");
    Ok(player_id)
}

// ---------------------------------------------------------------------------
// Message dispatch
// ---------------------------------------------------------------------------

/// Routes one decoded message. Returns `true` if the connection should
/// close.
async fn dispatch_message<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: Message,
) -> Result<bool, QuadraError>
where
    B: GameBuilder,
    R: Ruleset<B::State>,
{
    match msg.kind {
        MessageKind::Heartbeat => {
            let ack = Message::new(MessageKind::HeartbeatAck)
                .with("client_timestamp", json!(msg.timestamp));
            send_message(conn, state, &ack).await?;
        }

        MessageKind::Disconnect => {
            tracing::info!(%player_id, "client requested disconnect");
            return Ok(true);
        }

        MessageKind::CreateGame => handle_create(conn, state, player_id, &msg).await?,
        MessageKind::JoinGame => handle_join(conn, state, player_id, &msg).await?,
        MessageKind::LeaveGame => handle_leave(conn, state, player_id).await?,
        MessageKind::ListGames => handle_list(conn, state).await?,
        MessageKind::Ready => handle_ready(conn, state, player_id, &msg).await?,
        MessageKind::StartGame => handle_start(conn, state, player_id).await?,
        MessageKind::Chat => handle_chat(conn, state, player_id, &msg).await?,

        kind if kind.is_action() => handle_action(conn, state, player_id, &msg).await?,

        other => {
            send_error(conn, state, &format!("unexpected message kind: {other}")).await?;
        }
    }
    Ok(false)
}

async fn handle_create<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let Some(player_name) = msg.get_str("player_name") else {
        return send_error(conn, state, "player_name is required").await;
    };
    let game_name = msg.get_str("game_name").unwrap_or("game");
    let kind = client_kind(state, player_id).await;

    let mut config = state.config.lobby;
    if let Some(max) = msg.get_u64("max_players") {
        config.max_players = max as usize;
    }

    let result = state.lobbies.lock().await.create(
        player_id.clone(),
        player_name,
        game_name,
        kind,
        config,
    );
    match result {
        Ok(lobby_id) => {
            let joined = Message::new(MessageKind::PlayerJoined)
                .with_player(player_id.clone())
                .with("game_id", json!(lobby_id.0))
                .with("name", json!(player_name))
                .with("seat", json!(0))
                .with("host", json!(true));
            send_message(conn, state, &joined).await?;
        }
        Err(e) => send_error(conn, state, &e.to_string()).await?,
    }
    Ok(())
}

async fn handle_join<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let Some(game_id) = msg.get_u64("game_id") else {
        return send_error(conn, state, "game_id is required").await;
    };
    let Some(player_name) = msg.get_str("player_name") else {
        return send_error(conn, state, "player_name is required").await;
    };
    let lobby_id = LobbyId(game_id);
    let kind = client_kind(state, player_id).await;

    let result = state
        .lobbies
        .lock()
        .await
        .join(lobby_id, player_id.clone(), player_name, kind);
    match result {
        Ok(seat) => {
            let joined = Message::new(MessageKind::PlayerJoined)
                .with_player(player_id.clone())
                .with("game_id", json!(lobby_id.0))
                .with("name", json!(player_name))
                .with("seat", json!(seat))
                .with("host", json!(false));
            broadcast_lobby(state, lobby_id, &joined, None).await;
        }
        Err(e) => send_error(conn, state, &e.to_string()).await?,
    }
    Ok(())
}

async fn handle_leave<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let result = state.lobbies.lock().await.leave(player_id);
    match result {
        Ok(outcome) => {
            state.games.lock().await.remove_player(player_id);

            let mut left = Message::new(MessageKind::PlayerLeft)
                .with_player(player_id.clone())
                .with("game_id", json!(outcome.lobby_id.0))
                .with("name", json!(outcome.player.name));
            if let Some(host) = &outcome.new_host {
                left = left.with("new_host", json!(host.as_str()));
            }
            // The leaver is no longer on the roster; confirm directly.
            send_message(conn, state, &left).await?;
            if !outcome.lobby_deleted {
                broadcast_lobby(state, outcome.lobby_id, &left, None).await;
            }
        }
        Err(e) => send_error(conn, state, &e.to_string()).await?,
    }
    Ok(())
}

async fn handle_list<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let games: Vec<serde_json::Value> = state
        .lobbies
        .lock()
        .await
        .list()
        .into_iter()
        .map(|lobby| {
            json!({
                "game_id": lobby.id().0,
                "name": lobby.name(),
                "players": lobby.len(),
                "max_players": lobby.config().max_players,
            })
        })
        .collect();

    let list = Message::new(MessageKind::GameList).with("games", json!(games));
    send_message(conn, state, &list).await
}

async fn handle_ready<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let ready = msg.get_bool("ready").unwrap_or(true);
    let result = state.lobbies.lock().await.set_ready(player_id, ready);
    match result {
        Ok(lobby_id) => {
            let notice = Message::new(MessageKind::Ready)
                .with_player(player_id.clone())
                .with("ready", json!(ready));
            broadcast_lobby(state, lobby_id, &notice, None).await;
        }
        Err(e) => send_error(conn, state, &e.to_string()).await?,
    }
    Ok(())
}

async fn handle_start<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let lobby_info = {
        let lobbies = state.lobbies.lock().await;
        lobbies
            .get_for_player(player_id)
            .map(|l| (l.id(), l.host().clone(), l.len(), l.config().min_players))
    };
    let Some((lobby_id, host, roster_len, min_players)) = lobby_info else {
        return send_error(conn, state, "you are not in a game lobby").await;
    };
    if host != *player_id {
        return send_error(conn, state, "only the host can start the game").await;
    }

    if let Err(e) = state.lobbies.lock().await.start(lobby_id) {
        if roster_len < min_players && state.bots.lock().await.is_enabled() {
            let missing = min_players - roster_len;
            let launched = state.bots.lock().await.spawn_for_lobby(
                lobby_id,
                missing,
                &state.local_addr,
            );
            return send_error(
                conn,
                state,
                &format!("waiting for players: launched {launched} bot(s), start again once they are ready"),
            )
            .await;
        }
        return send_error(conn, state, &e.to_string()).await;
    }

    let Some(lobby) = state.lobbies.lock().await.get(lobby_id).cloned() else {
        return send_error(conn, state, "lobby vanished during start").await;
    };
    let session = match state.games.lock().await.create_game(&lobby) {
        Ok(session) => session,
        Err(e) => return send_error(conn, state, &e.to_string()).await,
    };
    if let Err(e) = state.lobbies.lock().await.mark_in_progress(lobby_id) {
        tracing::warn!(%lobby_id, error = %e, "failed to mark lobby in progress");
    }

    let roster: Vec<serde_json::Value> = lobby
        .members()
        .iter()
        .map(|m| {
            json!({
                "player_id": m.player_id.as_str(),
                "name": m.name,
                "seat": m.seat,
            })
        })
        .collect();
    let started = Message::new(MessageKind::StartGame)
        .with("game_id", json!(lobby_id.0))
        .with("players", json!(roster));
    broadcast_lobby(state, lobby_id, &started, None).await;

    // Build every resync message under the session lock; send only
    // after it is released, so no peer's backpressure can stall the
    // game's action lock.
    let (full_states, turn) = {
        let session = session.lock().await;
        let snapshot = session.snapshot();
        let full_states: Vec<(PlayerId, Message)> = lobby
            .members()
            .iter()
            .map(|member| {
                let full = Message::new(MessageKind::FullState)
                    .with("game_id", json!(lobby_id.0))
                    .with("state", snapshot.clone())
                    .with(
                        "seat_id",
                        json!(session.seat_of(&member.player_id).map(|s| s.0)),
                    );
                (member.player_id.clone(), full)
            })
            .collect();

        let current = session.state().current_turn();
        let mut turn = Message::new(MessageKind::TurnChange)
            .with("seat_id", json!(current.0))
            .with("turn_number", json!(session.state().turn_number()));
        if let Some(player) = session.player_at(current) {
            turn = turn.with_player(player.clone());
        }
        (full_states, turn)
    };

    for (member, full) in &full_states {
        send_to_player(state, member, full).await;
    }
    broadcast_lobby(state, lobby_id, &turn, None).await;

    tracing::info!(%lobby_id, players = lobby.len(), "game started");
    Ok(())
}

async fn handle_chat<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let Some(lobby_id) = state.lobbies.lock().await.lobby_of(player_id) else {
        return send_error(conn, state, "you are not in a game").await;
    };
    let text = msg.get_str("text").unwrap_or("");
    let name = display_name(state, player_id).await;

    let relay = Message::new(MessageKind::Chat)
        .with_player(player_id.clone())
        .with("name", json!(name))
        .with("text", json!(text));
    broadcast_lobby(state, lobby_id, &relay, None).await;
    Ok(())
}

/// Runs one in-game action through the player's session and broadcasts
/// what happened.
async fn handle_action<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
    R: Ruleset<B::State>,
{
    let action = match Action::from_message(msg) {
        Ok(action) => action,
        Err(e) => {
            return send_invalid_action(conn, state, &msg.kind.to_string(), &e.to_string())
                .await;
        }
    };

    let Some((game_id, session)) = state.games.lock().await.session_for(player_id) else {
        return send_invalid_action(conn, state, action.name(), "you are not in a running game")
            .await;
    };

    // One lock scope per action: execute, then read everything the
    // broadcasts need before releasing.
    let (result, members, turn_player, finish) = {
        let mut session = session.lock().await;
        let result = session.execute(&state.rules, player_id, &action);
        let members = session.players().to_vec();
        let turn_player = match &result.outcome {
            Some(ActionOutcome::TurnEnded { next_seat, .. }) => {
                session.player_at(*next_seat).cloned()
            }
            _ => None,
        };
        let finish = if session.is_over() {
            session
                .winner()
                .cloned()
                .map(|winner| (winner, session.state().winner()))
        } else {
            None
        };
        (result, members, turn_player, finish)
    };

    if !result.success {
        return send_invalid_action(conn, state, action.name(), &result.message).await;
    }

    for event in outcome_events(player_id, &result.outcome, turn_player) {
        send_to_players(state, &members, None, &event).await;
    }

    if let Some((winner, winner_seat)) = finish {
        let name = display_name(state, &winner).await;
        let won = Message::new(MessageKind::GameWon)
            .with_player(winner.clone())
            .with("game_id", json!(game_id.0))
            .with("seat_id", json!(winner_seat.map(|s| s.0)))
            .with("name", json!(name));
        send_to_players(state, &members, None, &won).await;
        end_game(state, game_id).await;
    }
    Ok(())
}

/// Builds the broadcast messages one successful action produces.
fn outcome_events(
    player_id: &PlayerId,
    outcome: &Option<ActionOutcome>,
    turn_player: Option<PlayerId>,
) -> Vec<Message> {
    let mut events = Vec::new();
    match outcome {
        Some(ActionOutcome::Moved {
            token_id,
            from,
            to,
            mystery,
        }) => {
            events.push(
                Message::new(MessageKind::TokenMoved)
                    .with_player(player_id.clone())
                    .with("token_id", json!(token_id))
                    .with("from", json!(from))
                    .with("to", json!(to)),
            );
            if let Some(effect) = mystery {
                let mut event = Message::new(MessageKind::MysteryEvent)
                    .with_player(player_id.clone())
                    .with("token_id", json!(token_id));
                if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(effect) {
                    for (key, value) in fields {
                        event = event.with(&key, value);
                    }
                }
                events.push(event);
            }
        }

        Some(ActionOutcome::Attacked {
            attacker_id,
            defender_id,
            combat,
        }) => {
            events.push(
                Message::new(MessageKind::CombatResult)
                    .with_player(player_id.clone())
                    .with("attacker_id", json!(attacker_id))
                    .with("defender_id", json!(defender_id))
                    .with("damage", json!(combat.damage))
                    .with("defender_health", json!(combat.defender_health))
                    .with("killed", json!(combat.killed)),
            );
        }

        Some(ActionOutcome::Deployed {
            token_id,
            seat,
            tier,
            position,
        }) => {
            events.push(
                Message::new(MessageKind::TokenDeployed)
                    .with_player(player_id.clone())
                    .with("token_id", json!(token_id))
                    .with("seat_id", json!(seat.0))
                    .with("tier", json!(tier))
                    .with("position", json!(position)),
            );
        }

        Some(ActionOutcome::TurnEnded {
            next_seat,
            turn_number,
        }) => {
            let mut turn = Message::new(MessageKind::TurnChange)
                .with("seat_id", json!(next_seat.0))
                .with("turn_number", json!(turn_number));
            if let Some(player) = turn_player {
                turn = turn.with_player(player);
            }
            events.push(turn);
        }

        None => {}
    }
    events
}

// ---------------------------------------------------------------------------
// Departure paths
// ---------------------------------------------------------------------------

/// Removes a player for good: lobby seat, game routing, identity.
/// Used for clean disconnects and expired grace windows.
pub(crate) async fn remove_player<B, R>(state: &Arc<ServerState<B, R>>, player_id: &PlayerId)
where
    B: GameBuilder,
{
    let left = state.lobbies.lock().await.leave(player_id);
    state.games.lock().await.remove_player(player_id);
    state.players.lock().await.remove(player_id);

    if let Ok(outcome) = left {
        if !outcome.lobby_deleted {
            let mut notice = Message::new(MessageKind::PlayerLeft)
                .with_player(player_id.clone())
                .with("game_id", json!(outcome.lobby_id.0))
                .with("name", json!(outcome.player.name));
            if let Some(host) = &outcome.new_host {
                notice = notice.with("new_host", json!(host.as_str()));
            }
            broadcast_lobby(state, outcome.lobby_id, &notice, None).await;
        }
        tracing::info!(%player_id, lobby_id = %outcome.lobby_id, "player removed");
    }
}

/// Handles an abrupt stream end: players seated in a lobby or game get
/// a grace window; everyone else is removed immediately.
async fn record_disconnect<B, R>(state: &Arc<ServerState<B, R>>, player_id: &PlayerId)
where
    B: GameBuilder,
{
    let Some(lobby_id) = state.lobbies.lock().await.lobby_of(player_id) else {
        state.players.lock().await.remove(player_id);
        return;
    };
    let in_game = state.games.lock().await.game_of(player_id).is_some();
    let name = display_name(state, player_id).await;

    state
        .disconnects
        .lock()
        .await
        .record(player_id.clone(), lobby_id, in_game);

    // The identity handle stays alive for the grace window; only the
    // connection binding inside it is now stale.
    let notice = Message::new(MessageKind::PlayerDisconnected)
        .with_player(player_id.clone())
        .with("name", json!(name))
        .with("can_reconnect", json!(true));
    broadcast_lobby(state, lobby_id, &notice, Some(player_id)).await;
}

/// Sweeps expired grace windows; called on a timer by the server.
pub(crate) async fn purge_expired<B, R>(state: &Arc<ServerState<B, R>>)
where
    B: GameBuilder,
{
    let expired = state.disconnects.lock().await.expire_stale();
    for record in expired {
        remove_player(state, &record.player_id).await;
    }
}

/// Tears down a finished game: session, lobby, bots.
async fn end_game<B, R>(state: &Arc<ServerState<B, R>>, game_id: LobbyId)
where
    B: GameBuilder,
{
    state.games.lock().await.end_game(game_id);
    {
        let mut lobbies = state.lobbies.lock().await;
        if let Err(e) = lobbies.finish(game_id) {
            tracing::debug!(%game_id, error = %e, "finish lobby failed");
        }
        lobbies.remove(game_id);
    }
    state.bots.lock().await.cleanup_for_lobby(game_id).await;
}

// ---------------------------------------------------------------------------
// Send helpers
// ---------------------------------------------------------------------------

async fn send_message<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    msg: &Message,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let payload = state.codec.encode(msg)?;
    conn.send(&payload).await?;
    Ok(())
}

/// Sends an `Error` message to one connection.
async fn send_error<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    text: &str,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let msg = Message::new(MessageKind::Error).with("message", json!(text));
    send_message(conn, state, &msg).await
}

/// Sends an `InvalidAction` rejection to the acting player only.
async fn send_invalid_action<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    action: &str,
    reason: &str,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let msg = Message::new(MessageKind::InvalidAction)
        .with("action", json!(action))
        .with("reason", json!(reason));
    send_message(conn, state, &msg).await
}

async fn send_reconnect_failed<B, R>(
    conn: &Arc<TcpConnection>,
    state: &Arc<ServerState<B, R>>,
    reason: &str,
) -> Result<(), QuadraError>
where
    B: GameBuilder,
{
    let msg = Message::new(MessageKind::ReconnectFailed).with("reason", json!(reason));
    send_message(conn, state, &msg).await
}

/// Sends a message to one player by identity, if they have a live
/// connection.
async fn send_to_player<B, R>(
    state: &Arc<ServerState<B, R>>,
    player_id: &PlayerId,
    msg: &Message,
) where
    B: GameBuilder,
{
    send_to_players(state, std::slice::from_ref(player_id), None, msg).await;
}

/// Sends a message to every listed player, in list order. Send
/// failures are logged and skipped so one dead connection cannot stall
/// a broadcast.
async fn send_to_players<B, R>(
    state: &Arc<ServerState<B, R>>,
    players: &[PlayerId],
    exclude: Option<&PlayerId>,
    msg: &Message,
) where
    B: GameBuilder,
{
    let payload = match state.codec.encode(msg) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode broadcast");
            return;
        }
    };

    // Resolve identities to live connections under the locks, send
    // after releasing them.
    let conns: Vec<_> = {
        let handles = state.players.lock().await;
        let pool = state.pool.lock().await;
        players
            .iter()
            .filter(|p| exclude != Some(*p))
            .filter_map(|p| handles.get(p).and_then(|h| pool.get(h.conn_id)))
            .collect()
    };
    for conn in conns {
        if let Err(e) = conn.send(&payload).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "broadcast send failed");
        }
    }
}

/// Sends a message to every lobby member, in roster order.
async fn broadcast_lobby<B, R>(
    state: &Arc<ServerState<B, R>>,
    lobby_id: LobbyId,
    msg: &Message,
    exclude: Option<&PlayerId>,
) where
    B: GameBuilder,
{
    let members = match state.lobbies.lock().await.get(lobby_id) {
        Some(lobby) => lobby.player_ids(),
        None => return,
    };
    send_to_players(state, &members, exclude, msg).await;
}

/// The lobby roster name for a player, falling back to the identity.
async fn display_name<B, R>(state: &Arc<ServerState<B, R>>, player_id: &PlayerId) -> String
where
    B: GameBuilder,
{
    state
        .lobbies
        .lock()
        .await
        .get_for_player(player_id)
        .and_then(|lobby| lobby.member(player_id))
        .map(|member| member.name.clone())
        .unwrap_or_else(|| player_id.to_string())
}

/// The declared client kind for a connected player.
async fn client_kind<B, R>(state: &Arc<ServerState<B, R>>, player_id: &PlayerId) -> ClientKind
where
    B: GameBuilder,
{
    state
        .players
        .lock()
        .await
        .get(player_id)
        .map(|h| h.kind)
        .unwrap_or(ClientKind::Human)
}
