//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Gateway calls happen with the session lock released: the begin step runs
//! under the lock, the lock is dropped while the request is outstanding, and the
//! complete step re-locks. Meanwhile the controller sits in `fetching` or
//! `evaluating`, where every mutating operation is refused.
//!
//! The gateway call and the complete step run in a spawned task, so a caller
//! that goes away mid-request (closed socket, dropped HTTP connection) cannot
//! leave the session stuck in `fetching` or `evaluating`.

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::controller::Controller;
use crate::domain::CompletedSession;
use crate::errors::SessionError;
use crate::gateway::Gateway;
use crate::protocol::{to_view, AcknowledgeOut, SessionView};
use crate::state::AppState;

type Result<T> = std::result::Result<T, SessionError>;

#[instrument(level = "info", skip(state, participants), fields(roster_len = participants.len()))]
pub async fn create_session(state: &AppState, name: &str, participants: &[String]) -> Result<SessionView> {
  let controller = Controller::register(name, participants)?;
  let handle = state.insert_session(controller).await;
  let c = handle.lock().await;
  Ok(to_view(&c))
}

#[instrument(level = "debug", skip(state))]
pub async fn get_session(state: &AppState, session_id: &str) -> Result<SessionView> {
  let handle = state.session(session_id).await?;
  let c = handle.lock().await;
  Ok(to_view(&c))
}

#[instrument(level = "info", skip(state))]
pub async fn select_next(state: &AppState, session_id: &str) -> Result<SessionView> {
  let handle = state.session(session_id).await?;
  {
    let mut c = handle.lock().await;
    let mut rng = rand::thread_rng();
    c.select_next(&mut rng)?;
  }

  let gateway = state.gateway.clone();
  let task = tokio::spawn(async move {
    let challenge = gateway.fetch_challenge().await;
    let mut c = handle.lock().await;
    c.challenge_loaded(challenge)?;
    Ok(to_view(&c))
  });
  join_turn_task(task).await
}

#[instrument(level = "debug", skip(state, code), fields(code_len = code.len()))]
pub async fn update_submission(state: &AppState, session_id: &str, code: String) -> Result<SessionView> {
  let handle = state.session(session_id).await?;
  let mut c = handle.lock().await;
  c.update_submission(code)?;
  Ok(to_view(&c))
}

#[instrument(level = "info", skip(state))]
pub async fn reset_submission(state: &AppState, session_id: &str) -> Result<SessionView> {
  let handle = state.session(session_id).await?;
  let mut c = handle.lock().await;
  c.reset_submission()?;
  Ok(to_view(&c))
}

#[instrument(level = "info", skip(state))]
pub async fn submit(state: &AppState, session_id: &str) -> Result<SessionView> {
  let handle = state.session(session_id).await?;
  let (challenge, code) = handle.lock().await.begin_submit()?;

  let gateway = state.gateway.clone();
  let id = session_id.to_string();
  let task = tokio::spawn(async move {
    let result = gateway.evaluate(&challenge, &code).await;
    let mut c = handle.lock().await;
    let recorded = c.evaluation_received(result)?;
    info!(target: "session", session_id = %id, score = recorded.score, correct = recorded.is_correct, "Turn scored");
    Ok(to_view(&c))
  });
  join_turn_task(task).await
}

/// Await a detached turn task. Dropping the caller leaves the task running.
async fn join_turn_task(task: JoinHandle<Result<SessionView>>) -> Result<SessionView> {
  task.await.unwrap_or_else(|e| {
    error!(target: "session", error = %e, "Turn task failed");
    Err(SessionError::TaskFailed(e.to_string()))
  })
}

#[instrument(level = "info", skip(state))]
pub async fn acknowledge(state: &AppState, session_id: &str) -> Result<AcknowledgeOut> {
  let handle = state.session(session_id).await?;
  let mut c = handle.lock().await;
  let completed = c.acknowledge()?;
  Ok(AcknowledgeOut { session: to_view(&c), completed })
}

#[instrument(level = "debug", skip(state))]
pub async fn summary(state: &AppState, session_id: &str) -> Result<CompletedSession> {
  let handle = state.session(session_id).await?;
  let c = handle.lock().await;
  c.completion().cloned().ok_or(SessionError::NotFinished)
}

/// Drop a session from the registry (the setup screen's "new session").
#[instrument(level = "info", skip(state))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<()> {
  let removed = state.remove_session(session_id).await?;
  let c = removed.lock().await;
  info!(target: "session", %session_id, phase = %c.phase(), "Session ended");
  Ok(())
}

pub fn clock_now(state: &AppState) -> String {
  state.now().to_rfc3339()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::controller::Phase;
  use std::time::Duration;

  use crate::config::Prompts;
  use crate::gateway::{AiGateway, LlmClient};
  use crate::openai::OpenAI;
  use crate::seeds::fallback_challenge;

  fn roster(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[tokio::test]
  async fn full_session_through_shared_state() {
    let state = AppState::with_gateway(AiGateway::offline());
    let view = create_session(&state, "Loom", &roster(&["Asha", "Ravi"])).await.unwrap();
    let id = view.id.clone();
    assert_eq!(view.phase, Phase::Idle);

    for round in 0..2 {
      let v = select_next(&state, &id).await.unwrap();
      assert_eq!(v.phase, Phase::Active);
      assert_eq!(v.turn.as_ref().unwrap().submission, fallback_challenge().buggy_code);

      update_submission(&state, &id, "edited".into()).await.unwrap();
      let v = reset_submission(&state, &id).await.unwrap();
      assert_eq!(v.turn.unwrap().submission, fallback_challenge().buggy_code);

      let v = submit(&state, &id).await.unwrap();
      assert_eq!(v.phase, Phase::Scored);

      let ack = acknowledge(&state, &id).await.unwrap();
      assert_eq!(ack.completed.is_some(), round == 1);
    }

    let done = summary(&state, &id).await.unwrap();
    assert_eq!(done.session.participants.len(), 2);
    assert_eq!(done.total_score, 0);
    assert_eq!(get_session(&state, &id).await.unwrap().phase, Phase::Finished);
  }

  #[tokio::test]
  async fn unknown_and_unfinished_sessions_are_reported() {
    let state = AppState::with_gateway(AiGateway::offline());
    assert_eq!(
      get_session(&state, "nope").await.unwrap_err(),
      SessionError::UnknownSession("nope".into())
    );

    let view = create_session(&state, "Loom", &roster(&["Asha"])).await.unwrap();
    assert_eq!(summary(&state, &view.id).await.unwrap_err(), SessionError::NotFinished);
    assert!(matches!(submit(&state, &view.id).await, Err(SessionError::InvalidPhase { .. })));
  }

  #[tokio::test]
  async fn registration_errors_create_nothing() {
    let state = AppState::with_gateway(AiGateway::offline());
    assert_eq!(create_session(&state, " ", &roster(&["Asha"])).await.unwrap_err(), SessionError::EmptyTeamName);
    assert_eq!(create_session(&state, "T", &roster(&["  "])).await.unwrap_err(), SessionError::EmptyRoster);
    assert!(state.sessions.read().await.is_empty());
  }

  /// A gateway pointed at a server that accepts connections but never answers.
  async fn stalled_gateway() -> AiGateway {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });
    let client = reqwest::Client::builder().timeout(Duration::from_millis(300)).build().unwrap();
    let llm = OpenAI { client, api_key: "k".into(), base_url: format!("http://{addr}"), model: "m".into() };
    AiGateway::new(Some(LlmClient::OpenAi(llm)), Prompts::default(), vec![])
  }

  async fn wait_for_phase(state: &AppState, id: &str, phase: Phase) -> SessionView {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
      let v = get_session(state, id).await.unwrap();
      if v.phase == phase || tokio::time::Instant::now() > deadline {
        return v;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
  }

  #[tokio::test]
  async fn abandoned_requests_still_complete_the_turn() {
    let state = AppState::with_gateway(stalled_gateway().await);
    let id = create_session(&state, "Loom", &roster(&["Asha"])).await.unwrap().id;

    let dropped = tokio::time::timeout(Duration::from_millis(50), select_next(&state, &id)).await;
    assert!(dropped.is_err());
    assert_eq!(get_session(&state, &id).await.unwrap().phase, Phase::Fetching);

    let v = wait_for_phase(&state, &id, Phase::Active).await;
    assert_eq!(v.phase, Phase::Active);
    assert_eq!(v.turn.unwrap().submission, fallback_challenge().buggy_code);

    let dropped = tokio::time::timeout(Duration::from_millis(50), submit(&state, &id)).await;
    assert!(dropped.is_err());
    assert_eq!(get_session(&state, &id).await.unwrap().phase, Phase::Evaluating);

    let v = wait_for_phase(&state, &id, Phase::Scored).await;
    assert_eq!(v.phase, Phase::Scored);
    assert_eq!(v.turn.unwrap().result.unwrap().score, 0);
    assert!(acknowledge(&state, &id).await.unwrap().completed.is_some());
  }

  #[tokio::test]
  async fn end_session_removes_only_that_session() {
    let state = AppState::with_gateway(AiGateway::offline());
    let a = create_session(&state, "A", &roster(&["Asha"])).await.unwrap().id;
    let b = create_session(&state, "B", &roster(&["Ravi"])).await.unwrap().id;
    select_next(&state, &a).await.unwrap();

    end_session(&state, &a).await.unwrap();
    assert_eq!(state.sessions.read().await.len(), 1);
    assert_eq!(get_session(&state, &a).await.unwrap_err(), SessionError::UnknownSession(a.clone()));
    assert_eq!(end_session(&state, &a).await.unwrap_err(), SessionError::UnknownSession(a));
    assert_eq!(get_session(&state, &b).await.unwrap().phase, Phase::Idle);
  }
}
