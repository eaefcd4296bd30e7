//! Conversation domain types.
//!
//! These are the value objects that flow through the engine:
//! caller builds a [`GenerationRequest`] → engine produces a
//! [`GenerationResponse`] → the history store keeps it as a [`StoredTurn`].

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Session id used when a response is normalized without one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Generate a fresh message id (`msg_<millis>_<suffix>`).
pub fn new_message_id() -> String {
    prefixed_id("msg")
}

/// Generate a fresh session id (`session_<millis>_<suffix>`).
pub fn new_session_id() -> String {
    prefixed_id("session")
}

fn prefixed_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}",
        Utc::now().timestamp_millis(),
        &suffix[..9]
    )
}

/// One historical exchange, as the prompt builder sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// A full history row, as written to and read from the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTurn {
    pub id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl StoredTurn {
    /// Build the history row for a normalized response.
    pub fn from_response(
        response: &GenerationResponse,
        user_id: Option<String>,
        context: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: response.message_id.clone(),
            session_id: response.session_id.clone(),
            user_id,
            message: response.message.clone(),
            response: response.response.clone(),
            timestamp: response.timestamp,
            model: Some(response.model.clone()),
            context,
        }
    }

    /// The prompt-facing view of this row.
    pub fn turn(&self) -> ConversationTurn {
        ConversationTurn {
            message: self.message.clone(),
            response: self.response.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Recent messages, oldest first. Empty when listed without history.
    #[serde(default)]
    pub messages: Vec<StoredTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for creating a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    /// Explicit id; one is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Time window for history analytics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsRange {
    Day,
    #[default]
    Week,
    Month,
    /// No lower bound.
    All,
}

impl StatsRange {
    /// Start of the window ending at `now`, or `None` for [`StatsRange::All`].
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => Some(now - Duration::days(1)),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now.checked_sub_months(Months::new(1)).unwrap_or(now)),
            Self::All => None,
        }
    }
}

impl std::str::FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(format!("unknown range '{other}' (expected day, week, month or all)")),
        }
    }
}

/// A message and how often it was asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCount {
    pub message: String,
    pub count: u64,
}

/// Messages stored on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// How many questions [`HistoryStats::top_questions`] holds at most.
pub const TOP_QUESTIONS_LIMIT: usize = 10;

/// Aggregate analytics over one [`StatsRange`] window.
///
/// Messages and active users count rows timestamped inside the window;
/// sessions count those created inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_messages: u64,
    pub total_sessions: u64,
    pub active_users: u64,
    /// Most frequent messages, most asked first (ties by message text).
    #[serde(default)]
    pub top_questions: Vec<QuestionCount>,
    /// Per-day message counts, oldest day first.
    #[serde(default)]
    pub messages_over_time: Vec<DailyCount>,
}

/// A caller's question, constructed per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// The question. Required and non-empty.
    pub message: String,

    /// Session to continue; the engine generates one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Model override; the backend default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Caller-supplied context, stored alongside the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GenerationRequest {
    /// A request with only a message set.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Reject requests the engine cannot answer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }
}

/// The uniform answer record, success or fallback.
///
/// `message` always echoes the request's message so callers can correlate
/// history rows. When `success` is false, `response` holds a non-empty
/// fallback text and `error` describes the backend failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub message: String,
    pub response: String,
    pub session_id: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
