//! Built-in content: syllabus topics and the fallbacks served when the LLM is
//! unavailable or returns something unusable.

use crate::domain::{Challenge, ChallengeSource, Difficulty, EvaluationResult};

/// First-year C syllabus; one topic is drawn per generated challenge.
pub fn syllabus_topics() -> Vec<String> {
  [
    "Introduction to 'C': Constants, variables and data types, Operators and expressions.",
    "Managing input/output operations: printf and scanf usage.",
    "Decision making and branching: if, if-else, switch case.",
    "Decision making and looping: while, do-while, for loops.",
    "Unconditional control statements: break and continue.",
    "Basics of functions: definition, declaration, and calling.",
    "Function parameter passing: call by value.",
    "Introduction to Recursion.",
    "One-dimensional arrays: declaration and initialization.",
    "Two-dimensional arrays: basic usage.",
    "Character arrays and basic String operations.",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

/// Served whenever challenge generation fails, so a turn can always start.
/// Bugs: missing semicolon after `int i`, and assignment instead of comparison in the `if`.
pub fn fallback_challenge() -> Challenge {
  Challenge {
    buggy_code: "#include <stdio.h>\n\nint main() {\n    int i\n    for (i = 1; i <= 5; i++) {\n        if (i = 3)\n            printf(\"%d \", i);\n    }\n    return 0;\n}".into(),
    description: "A loop intended to print numbers from 1 to 5.".into(),
    expected_output: "1 2 3 4 5".into(),
    difficulty: Difficulty::Easy,
    topic: "Decision making and looping: while, do-while, for loops.".into(),
    source: ChallengeSource::Fallback,
  }
}

pub const FALLBACK_FEEDBACK: &str = "Automated evaluation failed; manual review by faculty is required.";

/// Served whenever evaluation fails: zero points, flagged for a human.
pub fn fallback_evaluation() -> EvaluationResult {
  EvaluationResult { is_correct: false, score: 0, feedback: FALLBACK_FEEDBACK.into() }
}
