// src/services/redis_service.rs
use crate::errors::ZenError;
use crate::models::{MoodDraft, MoodEntry};
use crate::services::history::HistoryLog;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

const ID_COUNTER_KEY: &str = "moods:next_id";
const TIMELINE_KEY: &str = "moods:by_time";

/// Durable history log. Each entry is stored as JSON under `mood:{id}`; a
/// sorted set scored by timestamp (milliseconds) orders them. Members are
/// zero-padded ids so equal scores fall back to id order. Commands go through
/// a shared connection manager that reconnects on its own.
pub struct RedisService {
    manager: ConnectionManager,
}

fn entry_key(id: u64) -> String {
    format!("mood:{}", id)
}

fn timeline_member(id: u64) -> String {
    format!("{:020}", id)
}

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self, ZenError> {
        let client = Client::open(redis_url).map_err(|e| ZenError::Persistence(e.to_string()))?;

        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ZenError::Persistence(e.to_string()))?;

        // Test connection
        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await
            .map_err(|e| ZenError::Persistence(e.to_string()))?;

        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl HistoryLog for RedisService {
    async fn append(&self, draft: MoodDraft) -> Result<u64, ZenError> {
        let mut conn = self.connection();

        let id: u64 = conn
            .incr(ID_COUNTER_KEY, 1)
            .await
            .map_err(|e| ZenError::Persistence(e.to_string()))?;

        let entry = draft.into_entry(id);
        let value =
            serde_json::to_string(&entry).map_err(|e| ZenError::Serialization(e.to_string()))?;

        conn.set::<_, _, ()>(entry_key(id), value)
            .await
            .map_err(|e| ZenError::Persistence(e.to_string()))?;

        conn.zadd::<_, _, _, ()>(
            TIMELINE_KEY,
            timeline_member(id),
            entry.timestamp.timestamp_millis(),
        )
        .await
        .map_err(|e| ZenError::Persistence(e.to_string()))?;

        Ok(id)
    }

    async fn recent(&self, n: usize) -> Result<Vec<MoodEntry>, ZenError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection();

        let members: Vec<String> = conn
            .zrevrange(TIMELINE_KEY, 0, stop_index(n))
            .await
            .map_err(|e| ZenError::Persistence(e.to_string()))?;

        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            let id: u64 = member
                .parse()
                .map_err(|_| ZenError::Persistence(format!("Corrupt timeline member: {}", member)))?;

            let value: Option<String> = conn
                .get(entry_key(id))
                .await
                .map_err(|e| ZenError::Persistence(e.to_string()))?;

            match value {
                Some(value) => entries.push(
                    serde_json::from_str(&value)
                        .map_err(|e| ZenError::Serialization(e.to_string()))?,
                ),
                None => log::warn!("Mood entry {} is indexed but missing", id),
            }
        }

        Ok(entries)
    }
}

/// Inclusive `ZREVRANGE` stop for the newest `n` members. Redis treats a
/// negative stop as counting from the end, so `n` must not wrap.
fn stop_index(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_members_sort_like_ids() {
        let mut members = vec![timeline_member(10), timeline_member(9), timeline_member(100)];
        members.sort();
        assert_eq!(
            members,
            vec![timeline_member(9), timeline_member(10), timeline_member(100)]
        );
        assert_eq!(timeline_member(42).parse::<u64>().unwrap(), 42);
        assert_eq!(entry_key(7), "mood:7");
    }

    #[test]
    fn huge_limits_never_wrap_to_negative_stops() {
        assert_eq!(stop_index(1), 0);
        assert_eq!(stop_index(20), 19);
        assert_eq!(stop_index(usize::MAX), isize::MAX - 1);
        assert!(stop_index(isize::MAX as usize + 1) >= 0);
    }
}
