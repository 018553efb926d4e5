//! Console snapshot
//!
//! Fetches everything the operator dashboard shows in one refresh and
//! normalizes the gateway's loosely shaped payloads into display rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::client::GatewayClient;
use super::protocol::{methods, ChannelsStatusRequest, CronListRequest, SessionsListRequest};
use crate::error::Result;

const MAX_JOBS: usize = 50;
const MAX_SESSIONS: usize = 100;

/// Gateway health summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayHealth {
    /// Overall status
    pub status: HealthStatus,
    /// Human-readable uptime
    pub uptime: String,
    /// Number of listed sessions
    pub active_sessions: usize,
    /// Number of running jobs
    pub running_jobs: usize,
}

/// Overall gateway status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Reachable and answering
    Online,
    /// Unreachable
    Offline,
    /// Reachable with problems
    Degraded,
}

impl HealthStatus {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Online => "online",
            HealthStatus::Offline => "offline",
            HealthStatus::Degraded => "degraded",
        }
    }
}

/// Job status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Currently running
    Running,
    /// Waiting to run
    Queued,
    /// Last run failed
    Failed,
    /// Finished
    Done,
    /// Status string this console does not know
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "running" => JobStatus::Running,
            "queued" => JobStatus::Queued,
            "failed" => JobStatus::Failed,
            "done" => JobStatus::Done,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl JobStatus {
    /// Label as the gateway spells it
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Queued => "queued",
            JobStatus::Failed => "failed",
            JobStatus::Done => "done",
            JobStatus::Other(other) => other,
        }
    }
}

/// Scheduled job row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    /// Job ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Status
    pub status: JobStatus,
    /// Start, update or next-run time as reported
    pub started_at: String,
}

/// Session activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Active
    Active,
    /// Idle
    Idle,
}

impl SessionState {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Idle => "idle",
        }
    }
}

/// Session row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    /// Session key
    pub id: String,
    /// Display name
    pub name: String,
    /// Activity
    pub state: SessionState,
    /// Model in use
    pub model: String,
}

/// Channel account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelItem {
    /// Account ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Channel type (whatsapp, telegram, discord, signal, ...)
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Whether the account is enabled
    pub enabled: bool,
}

/// Everything one dashboard refresh shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// Health summary
    pub health: GatewayHealth,
    /// Scheduled jobs
    pub jobs: Vec<JobItem>,
    /// Sessions
    pub sessions: Vec<SessionItem>,
    /// Channel accounts
    pub channels: Vec<ChannelItem>,
}

impl DashboardSnapshot {
    /// Issue the five refresh calls concurrently on a connected client
    ///
    /// Any failed call fails the whole refresh.
    pub async fn fetch(client: &GatewayClient) -> Result<Self> {
        let sessions_req = SessionsListRequest::default();
        let cron_req = CronListRequest::default();
        let channels_req = ChannelsStatusRequest::default();

        let (status, health, sessions, cron, channels) = tokio::try_join!(
            client.request(methods::STATUS, Value::Object(Default::default())),
            client.request(methods::HEALTH, Value::Object(Default::default())),
            client.call(methods::SESSIONS_LIST, &sessions_req),
            client.call(methods::CRON_LIST, &cron_req),
            client.call(methods::CHANNELS_STATUS, &channels_req),
        )?;

        let snapshot = Self::from_payloads(&status, &health, &sessions, &cron, &channels);
        debug!(
            "Snapshot: {} jobs, {} sessions, {} channels",
            snapshot.jobs.len(),
            snapshot.sessions.len(),
            snapshot.channels.len()
        );
        Ok(snapshot)
    }

    /// Build a snapshot from raw method payloads
    pub fn from_payloads(
        status: &Value,
        health: &Value,
        sessions: &Value,
        cron: &Value,
        channels: &Value,
    ) -> Self {
        let jobs = normalize_jobs(cron);
        let sessions = normalize_sessions(sessions);
        let channels = normalize_channels(channels);

        let uptime = status
            .get("uptime")
            .filter(|v| !v.is_null())
            .or_else(|| health.get("uptime").filter(|v| !v.is_null()))
            .map(display)
            .unwrap_or_else(|| "online".to_string());

        let health = GatewayHealth {
            status: HealthStatus::Online,
            uptime,
            active_sessions: sessions.len(),
            running_jobs: jobs.iter().filter(|j| j.status == JobStatus::Running).count(),
        };

        DashboardSnapshot {
            health,
            jobs,
            sessions,
            channels,
        }
    }
}

/// Stringify a scalar the way it should read on screen
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First present, non-null field among `keys`
fn field<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn rows<'a>(input: &'a Value, key: &str) -> &'a [Value] {
    input
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| input.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Normalize a `cron.list` payload
pub fn normalize_jobs(input: &Value) -> Vec<JobItem> {
    rows(input, "jobs")
        .iter()
        .take(MAX_JOBS)
        .enumerate()
        .map(|(idx, job)| {
            let status = match field(job, &["status"]) {
                Some(status) => JobStatus::from(display(status).as_str()),
                None if truthy(job.get("running")) => JobStatus::Running,
                None => JobStatus::Queued,
            };

            JobItem {
                id: field(job, &["id", "jobId"])
                    .map(display)
                    .unwrap_or_else(|| format!("job-{}", idx)),
                name: field(job, &["name", "title"])
                    .map(display)
                    .unwrap_or_else(|| "Unnamed job".to_string()),
                status,
                started_at: field(job, &["startedAt", "updatedAt", "nextRunAt"])
                    .map(display)
                    .unwrap_or_else(|| "—".to_string()),
            }
        })
        .collect()
}

/// Normalize a `sessions.list` payload
pub fn normalize_sessions(input: &Value) -> Vec<SessionItem> {
    rows(input, "sessions")
        .iter()
        .take(MAX_SESSIONS)
        .enumerate()
        .map(|(idx, session)| SessionItem {
            id: field(session, &["key", "id"])
                .map(display)
                .unwrap_or_else(|| format!("session-{}", idx)),
            name: field(session, &["label", "key"])
                .map(display)
                .unwrap_or_else(|| "session".to_string()),
            state: if truthy(session.get("active")) {
                SessionState::Active
            } else {
                SessionState::Idle
            },
            model: field(session, &["model", "defaultModel"])
                .map(display)
                .unwrap_or_else(|| "unknown".to_string()),
        })
        .collect()
}

/// Normalize a `channels.status` payload
pub fn normalize_channels(input: &Value) -> Vec<ChannelItem> {
    let Some(accounts) = field(input, &["channelAccounts", "channels"]).and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (channel, list) in accounts {
        let Some(list) = list.as_array() else {
            continue;
        };
        for (idx, row) in list.iter().enumerate() {
            let account = field(row, &["accountId"]).map(display);
            out.push(ChannelItem {
                id: account
                    .clone()
                    .unwrap_or_else(|| format!("{}-{}", channel, idx)),
                name: account
                    .or_else(|| field(row, &["name"]).map(display))
                    .unwrap_or_else(|| format!("{} account", channel)),
                channel_type: channel.clone(),
                enabled: row.get("enabled") != Some(&Value::Bool(false)),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::ClientOptions;
    use crate::gateway::transport::mock::MockConnector;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_normalize_jobs() {
        let jobs = normalize_jobs(&json!({"jobs": [
            {"id": "j1", "name": "Backup", "status": "done", "startedAt": "09:00"},
            {"jobId": 7, "title": "Digest", "running": true, "nextRunAt": "10:00"},
            {}
        ]}));

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(jobs[1].id, "7");
        assert_eq!(jobs[1].name, "Digest");
        assert_eq!(jobs[1].status, JobStatus::Running);
        assert_eq!(jobs[1].started_at, "10:00");
        assert_eq!(jobs[2].id, "job-2");
        assert_eq!(jobs[2].name, "Unnamed job");
        assert_eq!(jobs[2].status, JobStatus::Queued);
        assert_eq!(jobs[2].started_at, "—");
    }

    #[test]
    fn test_normalize_jobs_caps_and_shapes() {
        let many: Vec<Value> = (0..80).map(|i| json!({"id": i})).collect();
        assert_eq!(normalize_jobs(&Value::Array(many)).len(), MAX_JOBS);
        assert!(normalize_jobs(&json!("nope")).is_empty());
        assert!(normalize_jobs(&Value::Null).is_empty());
    }

    #[test]
    fn test_normalize_sessions() {
        let sessions = normalize_sessions(&json!({"sessions": [
            {"key": "main", "active": true, "model": "sonnet"},
            {"id": "s2", "label": "Support", "defaultModel": "haiku"},
            {}
        ]}));

        assert_eq!(sessions[0].id, "main");
        assert_eq!(sessions[0].name, "main");
        assert_eq!(sessions[0].state, SessionState::Active);
        assert_eq!(sessions[1].name, "Support");
        assert_eq!(sessions[1].model, "haiku");
        assert_eq!(sessions[1].state, SessionState::Idle);
        assert_eq!(sessions[2].id, "session-2");
        assert_eq!(sessions[2].model, "unknown");
    }

    #[test]
    fn test_normalize_channels() {
        let channels = normalize_channels(&json!({"channelAccounts": {
            "telegram": [{"accountId": "bot1"}, {"name": "Ops", "enabled": false}],
            "signal": "not a list"
        }}));

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "bot1");
        assert_eq!(channels[0].channel_type, "telegram");
        assert!(channels[0].enabled);
        assert_eq!(channels[1].id, "telegram-1");
        assert_eq!(channels[1].name, "Ops");
        assert!(!channels[1].enabled);

        assert!(normalize_channels(&json!({})).is_empty());
    }

    #[test]
    fn test_health_from_payloads() {
        let snapshot = DashboardSnapshot::from_payloads(
            &json!({}),
            &json!({"uptime": "5h"}),
            &json!([{"key": "a"}, {"key": "b"}]),
            &json!([{"running": true}, {"status": "failed"}]),
            &json!({}),
        );
        assert_eq!(snapshot.health.status, HealthStatus::Online);
        assert_eq!(snapshot.health.uptime, "5h");
        assert_eq!(snapshot.health.active_sessions, 2);
        assert_eq!(snapshot.health.running_jobs, 1);

        let snapshot = DashboardSnapshot::from_payloads(&json!({"uptime": 42}), &json!({}), &json!({}), &json!({}), &json!({}));
        assert_eq!(snapshot.health.uptime, "42");
    }

    #[tokio::test]
    async fn test_fetch_issues_five_calls() {
        let (connector, mut server) = MockConnector::pair();
        let client = Arc::new(GatewayClient::with_connector(
            "ws://gateway.test",
            ClientOptions::default(),
            Arc::new(connector),
        ));

        let connecting = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.connect().await }
        });
        let hello = server.next_frame().await;
        server.push_json(json!({"type": "res", "id": hello["id"], "ok": true}));
        connecting.await.unwrap().unwrap();

        let fetching = tokio::spawn({
            let client = Arc::clone(&client);
            async move { DashboardSnapshot::fetch(&client).await }
        });

        for _ in 0..5 {
            let frame = server.next_frame().await;
            let payload = match frame["method"].as_str().unwrap() {
                "status" => json!({"uptime": "2d"}),
                "health" => json!({}),
                "sessions.list" => {
                    assert_eq!(frame["params"]["limit"], 100);
                    json!({"sessions": [{"key": "main", "active": true}]})
                }
                "cron.list" => {
                    assert_eq!(frame["params"]["includeDisabled"], true);
                    json!({"jobs": [{"id": "j1", "status": "running"}]})
                }
                "channels.status" => {
                    assert_eq!(frame["params"]["probe"], false);
                    json!({"channels": {"discord": [{"accountId": "d1"}]}})
                }
                other => panic!("unexpected method {}", other),
            };
            server.push_json(json!({"type": "res", "id": frame["id"], "ok": true, "payload": payload}));
        }

        let snapshot = fetching.await.unwrap().unwrap();
        assert_eq!(snapshot.health.uptime, "2d");
        assert_eq!(snapshot.health.running_jobs, 1);
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(snapshot.channels[0].channel_type, "discord");
    }
}
