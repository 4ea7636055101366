//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::errors::SessionError;
use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "code_loom", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "code_loom", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "code_loom", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "code_loom", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "code_loom", "WebSocket disconnected");
}

fn session_reply(r: Result<crate::protocol::SessionView, SessionError>) -> ServerWsMessage {
  match r {
    Ok(session) => ServerWsMessage::Session { session },
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::CreateSession { name, participants } => {
      session_reply(logic::create_session(state, &name, &participants).await)
    }

    ClientWsMessage::GetSession { session_id } => session_reply(logic::get_session(state, &session_id).await),

    ClientWsMessage::SelectNext { session_id } => {
      let r = logic::select_next(state, &session_id).await;
      info!(target: "session", id = %session_id, ok = r.is_ok(), "WS select_next served");
      session_reply(r)
    }

    ClientWsMessage::UpdateSubmission { session_id, code } => {
      session_reply(logic::update_submission(state, &session_id, code).await)
    }

    ClientWsMessage::ResetSubmission { session_id } => {
      session_reply(logic::reset_submission(state, &session_id).await)
    }

    ClientWsMessage::Submit { session_id } => {
      let r = logic::submit(state, &session_id).await;
      info!(target: "session", id = %session_id, ok = r.is_ok(), "WS submit evaluated");
      session_reply(r)
    }

    ClientWsMessage::Acknowledge { session_id } => match logic::acknowledge(state, &session_id).await {
      Ok(out) => ServerWsMessage::Acknowledged { session: out.session, completed: out.completed },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::GetSummary { session_id } => match logic::summary(state, &session_id).await {
      Ok(summary) => ServerWsMessage::Summary { summary },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::EndSession { session_id } => match logic::end_session(state, &session_id).await {
      Ok(()) => ServerWsMessage::Ended { session_id },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
  }
}
