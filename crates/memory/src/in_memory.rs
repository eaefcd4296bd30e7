//! In-memory history store, useful for testing and ephemeral sessions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use folio_core::error::MemoryError;
use folio_core::history::HistoryStore;
use folio_core::message::{
    new_session_id, DailyCount, HistoryStats, NewSession, QuestionCount, Session, StatsRange,
    StoredTurn, TOP_QUESTIONS_LIMIT,
};
use tokio::sync::RwLock;

use crate::SESSION_MESSAGE_LIMIT;

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    messages: Vec<StoredTurn>,
}

/// A history store that keeps sessions and turns in process memory.
/// Everything is lost when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    state: Arc<RwLock<State>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest(state: &State, session_id: &str, limit: usize) -> Vec<StoredTurn> {
    let mut rows: Vec<StoredTurn> = state
        .messages
        .iter()
        .filter(|m| m.session_id == session_id)
        .cloned()
        .collect();
    // Stable sort keeps insertion order for equal timestamps.
    rows.sort_by_key(|m| m.timestamp);
    let skip = rows.len().saturating_sub(limit);
    rows.split_off(skip)
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn session_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredTurn>, MemoryError> {
        Ok(newest(&*self.state.read().await, session_id, limit))
    }

    async fn append_turn(&self, turn: StoredTurn) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        if state.messages.iter().any(|m| m.id == turn.id) {
            return Err(MemoryError::Storage(format!(
                "message {} already exists",
                turn.id
            )));
        }

        state
            .sessions
            .entry(turn.session_id.clone())
            .or_insert_with(|| Session {
                id: turn.session_id.clone(),
                user_id: turn.user_id.clone(),
                created_at: turn.timestamp,
                last_activity: turn.timestamp,
                messages: Vec::new(),
                metadata: None,
            });
        state.messages.push(turn);
        Ok(())
    }

    async fn touch_session(&self, session_id: &str) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| MemoryError::SessionNotFound(session_id.to_string()))?;
        session.last_activity = Utc::now();
        Ok(())
    }

    async fn create_session(&self, new: NewSession) -> Result<Session, MemoryError> {
        let id = new.id.unwrap_or_else(new_session_id);
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&id) {
            return Err(MemoryError::Storage(format!("session {id} already exists")));
        }

        let now = Utc::now();
        let session = Session {
            id: id.clone(),
            user_id: new.user_id,
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
            metadata: new.metadata,
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, MemoryError> {
        let state = self.state.read().await;
        Ok(state.sessions.get(session_id).map(|s| {
            let mut session = s.clone();
            session.messages = newest(&state, session_id, SESSION_MESSAGE_LIMIT);
            session
        }))
    }

    async fn stats(&self, range: StatsRange) -> Result<HistoryStats, MemoryError> {
        let since = range.since(Utc::now());
        let in_window = |ts: &DateTime<Utc>| since.is_none_or(|start| *ts >= start);

        let state = self.state.read().await;
        let messages: Vec<&StoredTurn> = state
            .messages
            .iter()
            .filter(|m| in_window(&m.timestamp))
            .collect();

        let users: HashSet<&str> = messages
            .iter()
            .filter_map(|m| m.user_id.as_deref())
            .collect();

        let mut asked: HashMap<&str, u64> = HashMap::new();
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for m in &messages {
            *asked.entry(m.message.as_str()).or_default() += 1;
            *per_day.entry(m.timestamp.date_naive()).or_default() += 1;
        }

        let mut top_questions: Vec<QuestionCount> = asked
            .into_iter()
            .map(|(message, count)| QuestionCount {
                message: message.to_string(),
                count,
            })
            .collect();
        top_questions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_questions.truncate(TOP_QUESTIONS_LIMIT);

        Ok(HistoryStats {
            total_messages: messages.len() as u64,
            total_sessions: state
                .sessions
                .values()
                .filter(|s| in_window(&s.created_at))
                .count() as u64,
            active_users: users.len() as u64,
            top_questions,
            messages_over_time: per_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use folio_core::message::new_message_id;

    fn turn(session: &str, message: &str, offset_secs: i64) -> StoredTurn {
        StoredTurn {
            id: new_message_id(),
            session_id: session.into(),
            user_id: None,
            message: message.into(),
            response: format!("answer to {message}"),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            model: Some("llama3.1".into()),
            context: None,
        }
    }

    #[tokio::test]
    async fn recent_turns_are_chronological_and_bounded() {
        let store = InMemoryHistory::new();
        for (i, q) in ["one", "two", "three", "four"].iter().enumerate() {
            store.append_turn(turn("s1", q, i as i64)).await.unwrap();
        }
        store.append_turn(turn("other", "noise", 10)).await.unwrap();

        let turns = store.recent_turns("s1", 2).await.unwrap();
        let messages: Vec<&str> = turns.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["three", "four"]);
    }

    #[tokio::test]
    async fn append_creates_session_and_touch_updates_it() {
        let store = InMemoryHistory::new();
        store.append_turn(turn("s1", "hello", -60)).await.unwrap();

        let before = store.get_session("s1").await.unwrap().unwrap();
        store.touch_session("s1").await.unwrap();
        let after = store.get_session("s1").await.unwrap().unwrap();

        assert!(after.last_activity > before.last_activity);
        assert_eq!(after.messages.len(), 1);
    }

    #[tokio::test]
    async fn touch_unknown_session_fails() {
        let store = InMemoryHistory::new();
        let err = store.touch_session("missing").await.unwrap_err();
        assert!(matches!(err, MemoryError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn create_session_generates_id_and_rejects_duplicates() {
        let store = InMemoryHistory::new();
        let session = store.create_session(NewSession::default()).await.unwrap();
        assert!(session.id.starts_with("session_"));

        let explicit = NewSession {
            id: Some("fixed".into()),
            ..NewSession::default()
        };
        store.create_session(explicit.clone()).await.unwrap();
        assert!(store.create_session(explicit).await.is_err());
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_count_distinct_users() {
        let store = InMemoryHistory::new();
        let mut a = turn("s1", "q1", 0);
        a.user_id = Some("u1".into());
        let mut b = turn("s2", "q2", 1);
        b.user_id = Some("u1".into());
        store.append_turn(a).await.unwrap();
        store.append_turn(b).await.unwrap();
        store.append_turn(turn("s2", "q3", 2)).await.unwrap();

        let stats = store.stats(StatsRange::All).await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_users, 1);
    }

    #[tokio::test]
    async fn stats_window_top_questions_and_daily_counts() {
        let store = InMemoryHistory::new();
        let old = StoredTurn {
            timestamp: Utc::now() - Duration::days(3),
            ..turn("s1", "What are your skills?", 0)
        };
        store.append_turn(old).await.unwrap();
        store.append_turn(turn("s1", "What are your skills?", 0)).await.unwrap();
        store.append_turn(turn("s2", "What are your skills?", 1)).await.unwrap();
        store.append_turn(turn("s2", "Any projects?", 2)).await.unwrap();

        let day = store.stats(StatsRange::Day).await.unwrap();
        assert_eq!(day.total_messages, 3);
        assert_eq!(
            day.top_questions[0],
            QuestionCount {
                message: "What are your skills?".into(),
                count: 2
            }
        );
        assert_eq!(day.top_questions[1].message, "Any projects?");

        let week = store.stats(StatsRange::Week).await.unwrap();
        assert_eq!(week.total_messages, 4);
        assert_eq!(week.top_questions[0].count, 3);
        let days: u64 = week.messages_over_time.iter().map(|d| d.count).sum();
        assert_eq!(days, 4);
        assert!(week.messages_over_time.len() >= 2);
        assert!(week
            .messages_over_time
            .windows(2)
            .all(|w| w[0].date < w[1].date));
    }

    #[tokio::test]
    async fn top_questions_capped() {
        let store = InMemoryHistory::new();
        for i in 0..15 {
            store.append_turn(turn("s1", &format!("question {i:02}"), i)).await.unwrap();
        }
        let stats = store.stats(StatsRange::All).await.unwrap();
        assert_eq!(stats.top_questions.len(), TOP_QUESTIONS_LIMIT);
        assert_eq!(stats.top_questions[0].message, "question 00");
    }
}
