//! Loading quiz configuration (prompts + optional syllabus topics) from TOML.
//!
//! Example `QUIZ_CONFIG_PATH` file:
//!
//! ```toml
//! topics = ["Pointers: basics.", "Structures."]
//!
//! [prompts]
//! challenge_temperature = 0.7
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::seeds::syllabus_topics;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub topics: Vec<String>,
}

impl QuizConfig {
  /// Topics from config, or the built-in syllabus when none are given.
  pub fn topics_or_default(&self) -> Vec<String> {
    let topics: Vec<String> = self
      .topics
      .iter()
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty())
      .collect();
    if topics.is_empty() { syllabus_topics() } else { topics }
  }
}

/// Prompts used by the gateway. Placeholders in `{braces}` are filled per call.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Challenge generation; placeholders: {topic}
  pub challenge_system: String,
  pub challenge_user_template: String,
  pub challenge_temperature: f32,
  // Evaluation; placeholders: {description}, {expected_output}, {submission}
  pub evaluation_system: String,
  pub evaluation_user_template: String,
  pub evaluation_temperature: f32,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      challenge_system: "You are a C Programming Instructor setting a first-year engineering exam. Respond ONLY with strict JSON.".into(),
      challenge_user_template: r#"Generate a C programming "find the bug" challenge for first-year students.

TOPIC: {topic}
DIFFICULTY: Easy to Medium.

RULES:
1. CODE STRUCTURE: standard C indentation (4 spaces) and a line break after every statement or block. It must look like a real .c source file.
2. ERRORS: include TWO to THREE distinct subtle logical or syntax errors.
3. NO HINTS: no comments pointing out the errors.
4. CONTENT: only first-year syllabus features.

Return JSON with fields:
  "buggyCode": the full snippet with newlines,
  "expectedOutput": the exact output once every error is fixed,
  "description": what the program is intended to do,
  "difficulty": "Easy" or "Medium"."#.into(),
      challenge_temperature: 0.8,
      evaluation_system: "You are a strict C programming examiner. Output JSON only.".into(),
      evaluation_user_template: r#"Evaluate this C code for a first-year exam.
Goal: {description}
Expected Output: {expected_output}

Student Submission:
{submission}

Task: determine whether the student fixed all the errors so the program produces the exact expected output.
Score out of 15. Award points based on how many of the 2-3 errors were found and fixed.

Return JSON: {"isCorrect": boolean, "score": integer 0-15, "feedback": string}"#.into(),
      evaluation_temperature: 0.1,
    }
  }
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_quiz_config_from_env() -> Option<QuizConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<QuizConfig>(&s) {
      Ok(cfg) => {
        info!(target: "code_loom", %path, topics = cfg.topics.len(), "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "code_loom", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "code_loom", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
