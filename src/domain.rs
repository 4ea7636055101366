//! Domain models: participants, sessions, challenges and evaluation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest score a single evaluation can award.
pub const MAX_SCORE: u8 = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
  #[default]
  Pending,
  Active,
  Completed,
}

/// One student being evaluated in a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
  pub id: String,
  pub name: String,
  pub score: u8,
  pub status: ParticipantStatus,
}

/// Team name plus the roster in registration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub id: String,
  pub name: String,
  pub participants: Vec<Participant>,
  pub created_at: DateTime<Utc>,
}

impl Session {
  pub fn total_score(&self) -> u32 {
    self.participants.iter().map(|p| u32::from(p.score)).sum()
  }

  pub fn max_possible(&self) -> u32 {
    self.participants.len() as u32 * u32::from(MAX_SCORE)
  }

  pub fn count(&self, status: ParticipantStatus) -> usize {
    self.participants.iter().filter(|p| p.status == status).count()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  /// Case-insensitive parse of the labels the generator is asked to emit.
  pub fn parse(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().as_str() {
      "easy" => Some(Self::Easy),
      "medium" => Some(Self::Medium),
      "hard" => Some(Self::Hard),
      _ => None,
    }
  }
}

/// Where did we get the challenge from?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeSource {
  Generated, // validated LLM output
  Fallback,  // built-in snippet served when generation fails
}

/// A buggy snippet with the output it should produce once fixed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  pub buggy_code: String,
  pub description: String,
  pub expected_output: String,
  pub difficulty: Difficulty,
  #[serde(default)]
  pub topic: String,
  pub source: ChallengeSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
  pub is_correct: bool,
  pub score: u8,
  pub feedback: String,
}

impl EvaluationResult {
  /// Same result with the score forced into `0..=MAX_SCORE`.
  pub fn clamped(mut self) -> Self {
    self.score = self.score.min(MAX_SCORE);
    self
  }
}

/// The single in-flight turn: one Active participant and their challenge.
///
/// `challenge` is `None` while the challenge fetch is outstanding.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
  pub participant_id: String,
  pub challenge: Option<Challenge>,
  pub submission: String,
  pub evaluating: bool,
  pub result: Option<EvaluationResult>,
}

/// A leaderboard row.
#[derive(Clone, Debug, Serialize)]
pub struct Standing {
  pub rank: usize,
  pub id: String,
  pub name: String,
  pub score: u8,
}

/// Final session handed to the summary view once the roster is exhausted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
  pub session: Session,
  pub completed_at: DateTime<Utc>,
  pub total_score: u32,
  pub max_possible: u32,
  pub leaderboard: Vec<Standing>,
}

impl CompletedSession {
  pub fn new(session: Session, completed_at: DateTime<Utc>) -> Self {
    let mut ranked: Vec<&Participant> = session.participants.iter().collect();
    // stable sort keeps registration order on ties
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    let leaderboard = ranked
      .into_iter()
      .enumerate()
      .map(|(i, p)| Standing { rank: i + 1, id: p.id.clone(), name: p.name.clone(), score: p.score })
      .collect();

    Self {
      total_score: session.total_score(),
      max_possible: session.max_possible(),
      leaderboard,
      session,
      completed_at,
    }
  }
}
