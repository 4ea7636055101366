//! Application state: live sessions, the gateway, and the display clock.
//!
//! Each session's `Controller` sits behind its own mutex inside a registry map,
//! so sessions never contend with each other. Handlers must not hold a
//! controller lock across a gateway call (see `logic`).

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Local};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, instrument};

use crate::clock::spawn_clock;
use crate::config::{load_quiz_config_from_env, QuizConfig};
use crate::controller::Controller;
use crate::errors::SessionError;
use crate::gateway::{AiGateway, LlmClient};

pub type SessionHandle = Arc<Mutex<Controller>>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    pub gateway: AiGateway,
    pub clock: watch::Receiver<DateTime<Local>>,
}

impl AppState {
    /// Build state from env: load config, init the LLM client, start the clock.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_quiz_config_from_env().unwrap_or_default();
        let topics = cfg.topics_or_default();
        info!(target: "code_loom", topics = topics.len(), "Syllabus loaded");

        let llm = LlmClient::from_env();
        if let Some(c) = &llm {
            info!(target: "code_loom", provider = c.provider(), model = %c.model(), "LLM enabled.");
        } else {
            info!(target: "code_loom", "LLM disabled (no GEMINI_API_KEY / OPENAI_API_KEY). Serving fallbacks.");
        }

        let QuizConfig { prompts, .. } = cfg;
        Self::with_gateway(AiGateway::new(llm, prompts, topics))
    }

    pub fn with_gateway(gateway: AiGateway) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gateway,
            clock: spawn_clock(Duration::from_secs(1)),
        }
    }

    #[instrument(level = "debug", skip(self, controller), fields(id = %controller.session().id))]
    pub async fn insert_session(&self, controller: Controller) -> SessionHandle {
        let id = controller.session().id.clone();
        let handle = Arc::new(Mutex::new(controller));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn session(&self, id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    /// Remove a session from the registry, returning its handle.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    pub fn now(&self) -> DateTime<Local> {
        *self.clock.borrow()
    }
}
