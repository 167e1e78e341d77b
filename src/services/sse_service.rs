use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        lobby::{LobbyState, NoticeEvent, SessionHandshake},
        sse::ServerEvent,
    },
    error::ServiceError,
    services::lobby_view::{LEFT_MESSAGE, LOBBY_GONE_MESSAGE, LobbyEvent, LobbyView},
    state::{Identity, SharedState},
};

/// Open a lobby view for `viewer` and register it under a fresh session id.
pub async fn open_lobby_stream(
    state: SharedState,
    lobby_id: String,
    viewer: Option<Identity>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let controller = Arc::new(state.lobby_controller().await?);
    let capacity = state.config().view_event_capacity();
    let (view, receiver) = LobbyView::open(controller, lobby_id, viewer, capacity).await?;

    let handshake = SessionHandshake {
        session_id: view.session_id(),
        lobby_id: view.lobby_id().to_string(),
        degraded: state.is_degraded(),
    };
    info!(
        session_id = %handshake.session_id,
        lobby_id = %handshake.lobby_id,
        authenticated = view.viewer().is_some(),
        "new lobby SSE connection"
    );
    state.register_view(view);

    Ok(to_sse_stream(state, handshake, receiver))
}

/// Removes the view from the registry once its stream is dropped, which
/// cancels the underlying subscription.
struct ViewGuard {
    state: SharedState,
    session_id: Uuid,
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        self.state.remove_view(self.session_id);
        info!(session_id = %self.session_id, "lobby SSE stream disconnected");
    }
}

/// Convert a view's event receiver into an SSE response. The stream ends after
/// the first terminal event or when the client disconnects.
fn to_sse_stream(
    state: SharedState,
    handshake: SessionHandshake,
    mut receiver: broadcast::Receiver<LobbyEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = handshake.session_id;
    let guard = ViewGuard {
        state: state.clone(),
        session_id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;

        match ServerEvent::json(Some("session".to_string()), &handshake) {
            Ok(payload) => yield Ok(into_sse_event(payload)),
            Err(err) => warn!(%session_id, error = %err, "failed to encode session handshake"),
        }

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    // Intermediate states are dropped; resend the newest one.
                    debug!(%session_id, skipped, "lobby stream lagged");
                    match state.view(session_id).and_then(|view| view.latest()) {
                        Some(snapshot) => LobbyEvent::Snapshot(snapshot),
                        None => continue,
                    }
                }
                Err(RecvError::Closed) => break,
            };

            let terminal = event.is_terminal();
            match to_server_event(&event) {
                Ok(payload) => yield Ok(into_sse_event(payload)),
                Err(err) => warn!(%session_id, error = %err, "failed to encode lobby event"),
            }
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Map a view event onto its named SSE payload.
fn to_server_event(event: &LobbyEvent) -> serde_json::Result<ServerEvent> {
    match event {
        LobbyEvent::Snapshot(snapshot) => {
            ServerEvent::json(Some("lobby".to_string()), &LobbyState::from(snapshot))
        }
        LobbyEvent::Notice(message) => {
            ServerEvent::json(Some("notice".to_string()), &NoticeEvent::new(message.as_str()))
        }
        LobbyEvent::Ended => ServerEvent::json(
            Some("lobby_ended".to_string()),
            &NoticeEvent::new(LOBBY_GONE_MESSAGE),
        ),
        LobbyEvent::Failed(message) => {
            ServerEvent::json(Some("error".to_string()), &NoticeEvent::new(message.as_str()))
        }
        LobbyEvent::Left => {
            ServerEvent::json(Some("left".to_string()), &NoticeEvent::new(LEFT_MESSAGE))
        }
    }
}

fn into_sse_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{dao::models::Players, state::LobbySnapshot};

    fn data(event: &ServerEvent) -> Value {
        serde_json::from_str(&event.data).unwrap()
    }

    #[test]
    fn terminal_events_carry_user_messages() {
        let ended = to_server_event(&LobbyEvent::Ended).unwrap();
        assert_eq!(ended.event.as_deref(), Some("lobby_ended"));
        assert_eq!(data(&ended), json!({"message": "Lobby not found or deleted."}));

        let left = to_server_event(&LobbyEvent::Left).unwrap();
        assert_eq!(left.event.as_deref(), Some("left"));
        assert_eq!(data(&left), json!({"message": "Left lobby."}));

        let failed =
            to_server_event(&LobbyEvent::Failed("Error listening to lobby: boom".into())).unwrap();
        assert_eq!(failed.event.as_deref(), Some("error"));
        assert_eq!(
            data(&failed),
            json!({"message": "Error listening to lobby: boom"})
        );
    }

    #[test]
    fn snapshots_are_sent_as_lobby_events() {
        let snapshot = LobbySnapshot {
            id: "l1".into(),
            bet_title: "Unknown Bet".into(),
            join_code: "N/A".into(),
            host_uid: None,
            host_username: None,
            players: Players::new(),
            created_at: None,
        };

        let event = to_server_event(&LobbyEvent::Snapshot(snapshot)).unwrap();
        assert_eq!(event.event.as_deref(), Some("lobby"));
        assert_eq!(
            data(&event),
            json!({
                "lobbyId": "l1",
                "betTitle": "Unknown Bet",
                "joinCode": "N/A",
                "players": [],
            })
        );
    }

    #[test]
    fn notices_keep_their_text() {
        let event =
            to_server_event(&LobbyEvent::Notice("Joined lobby: Darts".into())).unwrap();
        assert_eq!(event.event.as_deref(), Some("notice"));
        assert_eq!(data(&event), json!({"message": "Joined lobby: Darts"}));
    }
}
