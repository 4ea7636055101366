//! Challenge/evaluation gateway.
//!
//! `Gateway` is the boundary the controller talks to. Its operations never fail:
//! transport errors, HTTP errors and malformed model output are logged here and
//! replaced with the built-in fallbacks from `seeds`, so a session never stalls
//! because the AI service is down.

use std::future::Future;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Challenge, ChallengeSource, Difficulty, EvaluationResult, MAX_SCORE};
use crate::errors::{GatewayError, GatewayResult};
use crate::gemini::Gemini;
use crate::openai::OpenAI;
use crate::seeds::{fallback_challenge, fallback_evaluation, syllabus_topics};
use crate::util::{fill_template, strip_code_fence, trunc_for_log};

pub trait Gateway: Send + Sync {
  /// A fresh challenge; the fallback challenge on any internal failure.
  fn fetch_challenge(&self) -> impl Future<Output = Challenge> + Send;

  /// Score `submission` against `challenge`; a zero-score "manual review" result on any internal failure.
  fn evaluate(&self, challenge: &Challenge, submission: &str) -> impl Future<Output = EvaluationResult> + Send;
}

/// The configured LLM backend.
#[derive(Clone)]
pub enum LlmClient {
  OpenAi(OpenAI),
  Gemini(Gemini),
}

impl LlmClient {
  /// LLM_PROVIDER picks explicitly ("gemini" | "openai"); otherwise the first provider with a key wins.
  pub fn from_env() -> Option<Self> {
    match std::env::var("LLM_PROVIDER").ok().as_deref().map(str::trim) {
      Some("openai") => OpenAI::from_env().map(Self::OpenAi),
      Some("gemini") => Gemini::from_env().map(Self::Gemini),
      _ => Gemini::from_env()
        .map(Self::Gemini)
        .or_else(|| OpenAI::from_env().map(Self::OpenAi)),
    }
  }

  pub fn provider(&self) -> &'static str {
    match self {
      Self::OpenAi(_) => "openai",
      Self::Gemini(_) => "gemini",
    }
  }

  pub fn model(&self) -> &str {
    match self {
      Self::OpenAi(c) => &c.model,
      Self::Gemini(c) => &c.model,
    }
  }

  async fn complete_json(&self, system: &str, user: &str, temperature: f32) -> GatewayResult<String> {
    match self {
      Self::OpenAi(c) => c.chat_json(system, user, temperature).await,
      Self::Gemini(c) => c.generate_json(system, user, temperature).await,
    }
  }
}

/// Production gateway: LLM when configured, fallbacks otherwise.
#[derive(Clone)]
pub struct AiGateway {
  llm: Option<LlmClient>,
  prompts: Prompts,
  topics: Vec<String>,
}

impl AiGateway {
  pub fn new(llm: Option<LlmClient>, prompts: Prompts, topics: Vec<String>) -> Self {
    let topics = if topics.is_empty() { syllabus_topics() } else { topics };
    Self { llm, prompts, topics }
  }

  /// No LLM: every fetch yields the fallback challenge, every evaluation the fallback result.
  pub fn offline() -> Self {
    Self::new(None, Prompts::default(), syllabus_topics())
  }

  fn pick_topic(&self) -> String {
    self.topics.choose(&mut rand::thread_rng()).cloned().unwrap_or_default()
  }

  #[instrument(level = "info", skip(self))]
  async fn try_generate(&self, topic: &str) -> GatewayResult<Challenge> {
    let llm = self.llm.as_ref().ok_or(GatewayError::Disabled)?;
    let user = fill_template(&self.prompts.challenge_user_template, &[("topic", topic)]);
    let raw = llm
      .complete_json(&self.prompts.challenge_system, &user, self.prompts.challenge_temperature)
      .await?;
    parse_challenge(&raw, topic)
  }

  #[instrument(level = "info", skip(self, challenge, submission), fields(code_len = submission.len()))]
  async fn try_evaluate(&self, challenge: &Challenge, submission: &str) -> GatewayResult<EvaluationResult> {
    let llm = self.llm.as_ref().ok_or(GatewayError::Disabled)?;
    let user = fill_template(
      &self.prompts.evaluation_user_template,
      &[
        ("description", challenge.description.as_str()),
        ("expected_output", challenge.expected_output.as_str()),
        ("submission", submission),
      ],
    );
    let raw = llm
      .complete_json(&self.prompts.evaluation_system, &user, self.prompts.evaluation_temperature)
      .await?;
    parse_evaluation(&raw)
  }
}

impl Gateway for AiGateway {
  async fn fetch_challenge(&self) -> Challenge {
    let topic = self.pick_topic();
    match self.try_generate(&topic).await {
      Ok(c) => {
        info!(target: "challenge", difficulty = ?c.difficulty, code_len = c.buggy_code.len(), "Challenge generated");
        c
      }
      Err(e) => {
        error!(target: "challenge", %topic, error = %e, "Challenge generation failed; serving fallback");
        fallback_challenge()
      }
    }
  }

  async fn evaluate(&self, challenge: &Challenge, submission: &str) -> EvaluationResult {
    match self.try_evaluate(challenge, submission).await {
      Ok(r) => {
        info!(target: "challenge", score = r.score, correct = r.is_correct, "Submission evaluated");
        r
      }
      Err(e) => {
        error!(target: "challenge", error = %e, "Evaluation failed; returning manual-review result");
        fallback_evaluation()
      }
    }
  }
}

// --- Untrusted payload validation ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChallenge {
  buggy_code: Option<String>,
  expected_output: Option<String>,
  description: Option<String>,
  difficulty: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
  is_correct: Option<bool>,
  score: Option<f64>,
  feedback: Option<String>,
}

fn required(field: &str, value: Option<String>) -> GatewayResult<String> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v),
    _ => Err(GatewayError::Invalid(format!("missing or blank '{field}'"))),
  }
}

/// Validate a generated challenge payload.
pub fn parse_challenge(raw: &str, topic: &str) -> GatewayResult<Challenge> {
  let body: RawChallenge = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
    GatewayError::Invalid(format!("{e}; payload: {}", trunc_for_log(raw, 120)))
  })?;

  let label = required("difficulty", body.difficulty)?;
  let difficulty = Difficulty::parse(&label)
    .ok_or_else(|| GatewayError::Invalid(format!("unknown difficulty '{label}'")))?;

  Ok(Challenge {
    buggy_code: required("buggyCode", body.buggy_code)?,
    description: required("description", body.description)?.trim().to_string(),
    expected_output: required("expectedOutput", body.expected_output)?,
    difficulty,
    topic: topic.to_string(),
    source: ChallengeSource::Generated,
  })
}

/// Validate an evaluation payload; the score must be an integer in `0..=15`.
pub fn parse_evaluation(raw: &str) -> GatewayResult<EvaluationResult> {
  let body: RawEvaluation = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
    GatewayError::Invalid(format!("{e}; payload: {}", trunc_for_log(raw, 120)))
  })?;

  let is_correct = body.is_correct.ok_or_else(|| GatewayError::Invalid("missing 'isCorrect'".into()))?;
  let score = body.score.ok_or_else(|| GatewayError::Invalid("missing 'score'".into()))?;
  if !score.is_finite() || score.fract() != 0.0 || score < 0.0 || score > f64::from(MAX_SCORE) {
    return Err(GatewayError::Invalid(format!("score {score} outside 0..={MAX_SCORE}")));
  }
  let feedback = body.feedback.ok_or_else(|| GatewayError::Invalid("missing 'feedback'".into()))?;

  Ok(EvaluationResult { is_correct, score: score as u8, feedback })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::FALLBACK_FEEDBACK;

  #[test]
  fn parses_valid_challenge() {
    let raw = r#"{"buggyCode":"int main() {\n    return 0\n}","expectedOutput":"","description":" Return. ","difficulty":"medium"}"#;
    let err = parse_challenge(raw, "t").unwrap_err();
    assert!(err.to_string().contains("expectedOutput"));

    let raw = r#"{"buggyCode":"int main() {\n    printf(\"hi\")\n}","expectedOutput":"hi","description":" Print hi. ","difficulty":"medium"}"#;
    let c = parse_challenge(raw, "I/O").unwrap();
    assert_eq!(c.difficulty, Difficulty::Medium);
    assert_eq!(c.description, "Print hi.");
    assert_eq!(c.topic, "I/O");
    assert_eq!(c.source, ChallengeSource::Generated);
    assert!(c.buggy_code.contains('\n'));
  }

  #[test]
  fn rejects_malformed_challenges() {
    assert!(parse_challenge("not json", "t").is_err());
    assert!(parse_challenge(r#"{"buggyCode":"x","expectedOutput":"1","description":"d"}"#, "t").is_err());
    assert!(parse_challenge(r#"{"buggyCode":"x","expectedOutput":"1","description":"d","difficulty":"Insane"}"#, "t").is_err());
    assert!(parse_challenge(r#"{"buggyCode":"  ","expectedOutput":"1","description":"d","difficulty":"Easy"}"#, "t").is_err());
  }

  #[test]
  fn parses_fenced_evaluation() {
    let r = parse_evaluation("```json\n{\"isCorrect\":true,\"score\":15,\"feedback\":\"All fixed.\"}\n```").unwrap();
    assert!(r.is_correct);
    assert_eq!(r.score, 15);
    assert_eq!(r.feedback, "All fixed.");

    let r = parse_evaluation(r#"{"isCorrect":false,"score":10.0,"feedback":""}"#).unwrap();
    assert_eq!(r.score, 10);
  }

  #[test]
  fn rejects_out_of_range_or_missing_scores() {
    assert!(parse_evaluation(r#"{"isCorrect":true,"score":16,"feedback":"f"}"#).is_err());
    assert!(parse_evaluation(r#"{"isCorrect":true,"score":-1,"feedback":"f"}"#).is_err());
    assert!(parse_evaluation(r#"{"isCorrect":true,"score":7.5,"feedback":"f"}"#).is_err());
    assert!(parse_evaluation(r#"{"isCorrect":true,"feedback":"f"}"#).is_err());
    assert!(parse_evaluation(r#"{"isCorrect":"yes","score":3,"feedback":"f"}"#).is_err());
    assert!(parse_evaluation(r#"{"score":3,"feedback":"f"}"#).is_err());
  }

  #[tokio::test]
  async fn offline_gateway_serves_fallbacks() {
    let gw = AiGateway::offline();
    let c = gw.fetch_challenge().await;
    assert_eq!(c, fallback_challenge());
    assert!(c.buggy_code.contains("int i\n"));
    assert_eq!(c.expected_output, "1 2 3 4 5");

    let r = gw.evaluate(&c, &c.buggy_code).await;
    assert!(!r.is_correct);
    assert_eq!(r.score, 0);
    assert_eq!(r.feedback, FALLBACK_FEEDBACK);
  }

  #[test]
  fn empty_topic_list_falls_back_to_syllabus() {
    let gw = AiGateway::new(None, Prompts::default(), vec![]);
    assert!(!gw.pick_topic().is_empty());
  }
}
