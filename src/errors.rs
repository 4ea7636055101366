//! Error types. `SessionError` is what callers of the controller see;
//! `GatewayError` never leaves the gateway (it is logged and replaced by a fallback).

use thiserror::Error;

use crate::controller::Phase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
  #[error("Team name must not be empty")]
  EmptyTeamName,

  #[error("Roster must contain at least one non-blank name")]
  EmptyRoster,

  #[error("Operation '{op}' is not allowed while the session is {phase}")]
  InvalidPhase { op: &'static str, phase: Phase },

  #[error("Unknown session: {0}")]
  UnknownSession(String),

  #[error("Session is not finished yet")]
  NotFinished,

  #[error("Turn task failed: {0}")]
  TaskFailed(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
  #[error("No LLM configured")]
  Disabled,

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("API request failed with status {status}: {body}")]
  ApiError { status: u16, body: String },

  #[error("Unexpected response structure: {0}")]
  UnexpectedResponse(String),

  #[error("Received empty text response from model")]
  EmptyResponse,

  #[error("Invalid model payload: {0}")]
  Invalid(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
