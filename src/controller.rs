//! Roster/session controller: the turn state machine.
//!
//! A `Controller` owns one `Session` and at most one `Turn`. The phase is derived
//! from those two values, so the "zero or one Active participant" rule and the
//! "finished iff everyone is Completed" rule cannot drift out of sync with a
//! separately stored state tag.
//!
//! Gateway calls are split into a begin step and a complete step
//! (`select_next` / `challenge_loaded`, `begin_submit` / `evaluation_received`)
//! so a caller holding the controller behind a lock can release it while the
//! request is outstanding. The test-only `select_next_with` and `submit_with`
//! chain both steps against an owned controller.

use std::fmt;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
  Challenge, CompletedSession, EvaluationResult, Participant, ParticipantStatus, Session, Turn,
};
use crate::errors::SessionError;
#[cfg(test)]
use crate::gateway::Gateway;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  /// No turn in progress; at least one participant is pending.
  Idle,
  /// A participant was drawn; the challenge has not arrived yet.
  Fetching,
  /// Challenge loaded, edits accepted.
  Active,
  /// Submission sent to the evaluator.
  Evaluating,
  /// Result recorded, waiting for acknowledgment.
  Scored,
  /// Roster exhausted.
  Finished,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Phase::Idle => "idle",
      Phase::Fetching => "fetching",
      Phase::Active => "active",
      Phase::Evaluating => "evaluating",
      Phase::Scored => "scored",
      Phase::Finished => "finished",
    };
    f.write_str(s)
  }
}

#[derive(Clone, Debug)]
pub struct Controller {
  session: Session,
  turn: Option<Turn>,
  completion: Option<CompletedSession>,
}

impl Controller {
  /// Create a session from the setup form. Names are trimmed and blank ones dropped.
  #[instrument(level = "info", skip(names), fields(team = %team_name.trim()))]
  pub fn register<I, S>(team_name: &str, names: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let team = team_name.trim();
    if team.is_empty() {
      return Err(SessionError::EmptyTeamName);
    }

    let participants: Vec<Participant> = names
      .into_iter()
      .filter_map(|n| {
        let name = n.as_ref().trim();
        (!name.is_empty()).then(|| Participant {
          id: Uuid::new_v4().to_string(),
          name: name.to_string(),
          score: 0,
          status: ParticipantStatus::Pending,
        })
      })
      .collect();
    if participants.is_empty() {
      return Err(SessionError::EmptyRoster);
    }

    let session = Session {
      id: Uuid::new_v4().to_string(),
      name: team.to_string(),
      participants,
      created_at: Utc::now(),
    };
    info!(target: "session", id = %session.id, roster = session.participants.len(), "Session registered");
    Ok(Self { session, turn: None, completion: None })
  }

  pub fn phase(&self) -> Phase {
    match &self.turn {
      None if self.pending_count() == 0 => Phase::Finished,
      None => Phase::Idle,
      Some(t) if t.result.is_some() => Phase::Scored,
      Some(t) if t.evaluating => Phase::Evaluating,
      Some(t) if t.challenge.is_some() => Phase::Active,
      Some(_) => Phase::Fetching,
    }
  }

  pub fn session(&self) -> &Session { &self.session }
  pub fn turn(&self) -> Option<&Turn> { self.turn.as_ref() }
  pub fn completion(&self) -> Option<&CompletedSession> { self.completion.as_ref() }

  pub fn pending_count(&self) -> usize { self.session.count(ParticipantStatus::Pending) }
  pub fn completed_count(&self) -> usize { self.session.count(ParticipantStatus::Completed) }
  pub fn total_score(&self) -> u32 { self.session.total_score() }

  pub fn current_participant(&self) -> Option<&Participant> {
    let id = &self.turn.as_ref()?.participant_id;
    self.session.participants.iter().find(|p| &p.id == id)
  }

  fn expect_phase(&self, op: &'static str, expected: Phase) -> Result<()> {
    let phase = self.phase();
    if phase == expected {
      Ok(())
    } else {
      warn!(target: "session", id = %self.session.id, op, %phase, "Operation refused in current phase");
      Err(SessionError::InvalidPhase { op, phase })
    }
  }

  fn turn_mut(&mut self, op: &'static str, expected: Phase) -> Result<&mut Turn> {
    self.expect_phase(op, expected)?;
    let phase = self.phase();
    self.turn.as_mut().ok_or(SessionError::InvalidPhase { op, phase })
  }

  /// Draw a pending participant uniformly at random and open a turn for them.
  #[instrument(level = "info", skip(self, rng), fields(session = %self.session.id))]
  pub fn select_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Participant> {
    self.expect_phase("select_next", Phase::Idle)?;

    let pending: Vec<usize> = self
      .session
      .participants
      .iter()
      .enumerate()
      .filter(|(_, p)| p.status == ParticipantStatus::Pending)
      .map(|(i, _)| i)
      .collect();
    let idx = *pending
      .choose(rng)
      .ok_or(SessionError::InvalidPhase { op: "select_next", phase: Phase::Finished })?;

    let chosen = &mut self.session.participants[idx];
    chosen.status = ParticipantStatus::Active;
    self.turn = Some(Turn {
      participant_id: chosen.id.clone(),
      challenge: None,
      submission: String::new(),
      evaluating: false,
      result: None,
    });
    info!(target: "session", participant = %chosen.name, remaining = pending.len() - 1, "Participant drawn");
    Ok(chosen.clone())
  }

  /// Attach the fetched challenge and seed the editor with its buggy code.
  #[instrument(level = "debug", skip(self, challenge), fields(session = %self.session.id, source = ?challenge.source))]
  pub fn challenge_loaded(&mut self, challenge: Challenge) -> Result<&Turn> {
    let turn = self.turn_mut("challenge_loaded", Phase::Fetching)?;
    turn.submission = challenge.buggy_code.clone();
    turn.challenge = Some(challenge);
    Ok(&*turn)
  }

  /// `select_next` + gateway fetch + `challenge_loaded`.
  #[cfg(test)]
  pub async fn select_next_with<G, R>(&mut self, gateway: &G, rng: &mut R) -> Result<Participant>
  where
    G: Gateway + ?Sized,
    R: Rng + ?Sized,
  {
    let chosen = self.select_next(rng)?;
    let challenge = gateway.fetch_challenge().await;
    self.challenge_loaded(challenge)?;
    Ok(chosen)
  }

  pub fn update_submission(&mut self, text: impl Into<String>) -> Result<()> {
    let turn = self.turn_mut("update_submission", Phase::Active)?;
    turn.submission = text.into();
    Ok(())
  }

  /// Discard edits and restore the original buggy snippet.
  pub fn reset_submission(&mut self) -> Result<&str> {
    let turn = self.turn_mut("reset_submission", Phase::Active)?;
    if let Some(ch) = &turn.challenge {
      turn.submission = ch.buggy_code.clone();
    }
    Ok(&turn.submission)
  }

  /// Mark the turn as evaluating and hand back what the evaluator needs.
  #[instrument(level = "info", skip(self), fields(session = %self.session.id))]
  pub fn begin_submit(&mut self) -> Result<(Challenge, String)> {
    let phase = self.phase();
    let turn = self.turn_mut("submit", Phase::Active)?;
    let challenge = turn
      .challenge
      .clone()
      .ok_or(SessionError::InvalidPhase { op: "submit", phase })?;
    turn.evaluating = true;
    debug!(target: "session", code_len = turn.submission.len(), "Submission sent for evaluation");
    Ok((challenge, turn.submission.clone()))
  }

  /// Record the evaluator's verdict; the participant becomes Completed.
  #[instrument(level = "info", skip(self, result), fields(session = %self.session.id, score = result.score))]
  pub fn evaluation_received(&mut self, result: EvaluationResult) -> Result<EvaluationResult> {
    self.expect_phase("evaluation_received", Phase::Evaluating)?;
    let result = result.clamped();

    let Some(turn) = self.turn.as_mut() else {
      return Err(SessionError::InvalidPhase { op: "evaluation_received", phase: Phase::Idle });
    };
    turn.evaluating = false;
    turn.result = Some(result.clone());

    if let Some(p) = self.session.participants.iter_mut().find(|p| p.id == turn.participant_id) {
      p.score = result.score;
      p.status = ParticipantStatus::Completed;
      info!(target: "session", participant = %p.name, score = p.score, correct = result.is_correct, "Participant scored");
    }
    Ok(result)
  }

  /// `begin_submit` + gateway evaluation + `evaluation_received`.
  #[cfg(test)]
  pub async fn submit_with<G>(&mut self, gateway: &G) -> Result<EvaluationResult>
  where
    G: Gateway + ?Sized,
  {
    let (challenge, code) = self.begin_submit()?;
    let result = gateway.evaluate(&challenge, &code).await;
    self.evaluation_received(result)
  }

  /// Close the scored turn. Returns the final session exactly once, on the
  /// acknowledgment that exhausts the roster.
  #[instrument(level = "info", skip(self), fields(session = %self.session.id))]
  pub fn acknowledge(&mut self) -> Result<Option<CompletedSession>> {
    self.expect_phase("acknowledge", Phase::Scored)?;
    self.turn = None;

    if self.phase() != Phase::Finished || self.completion.is_some() {
      return Ok(None);
    }
    let done = CompletedSession::new(self.session.clone(), Utc::now());
    info!(target: "session", total = done.total_score, max = done.max_possible, "Session finished");
    self.completion = Some(done.clone());
    Ok(Some(done))
  }
}
