//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controller::{Controller, Phase};
use crate::domain::{CompletedSession, Participant, Turn};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateSession {
        name: String,
        participants: Vec<String>,
    },
    GetSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SelectNext {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    UpdateSubmission {
        #[serde(rename = "sessionId")]
        session_id: String,
        code: String,
    },
    ResetSubmission {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Submit {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Acknowledge {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    GetSummary {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    EndSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionView,
    },
    Acknowledged {
        session: SessionView,
        completed: Option<CompletedSession>,
    },
    Summary {
        summary: CompletedSession,
    },
    Ended {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Error {
        message: String,
    },
}

/// Snapshot of one session, used by both WS and HTTP.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub name: String,
    pub phase: Phase,
    pub participants: Vec<Participant>,
    pub current_participant: Option<Participant>,
    pub turn: Option<Turn>,
    pub pending_count: usize,
    pub completed_count: usize,
    pub total_score: u32,
    pub max_possible: u32,
    pub created_at: DateTime<Utc>,
}

pub fn to_view(c: &Controller) -> SessionView {
    let s = c.session();
    SessionView {
        id: s.id.clone(),
        name: s.name.clone(),
        phase: c.phase(),
        participants: s.participants.clone(),
        current_participant: c.current_participant().cloned(),
        turn: c.turn().cloned(),
        pending_count: c.pending_count(),
        completed_count: c.completed_count(),
        total_score: c.total_score(),
        max_possible: s.max_possible(),
        created_at: s.created_at,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CreateSessionIn {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Deserialize)]
pub struct SubmissionIn {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct AcknowledgeOut {
    pub session: SessionView,
    pub completed: Option<CompletedSession>,
}

#[derive(Serialize)]
pub struct ClockOut {
    pub now: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
