//! Agent conversation client.
//!
//! Thin REST client for a hosted orchestrator agent: create a conversation
//! thread, post a user message, start a run for the pre-configured agent,
//! poll the run to a terminal state, and fetch the newest assistant reply.
//!
//! Exactly one request is outstanding at any time; thread state lives
//! entirely in the agent service.

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tracing::debug;

use crate::config::ChatSettings;

/// Run states after which polling stops.
const TERMINAL_RUN_STATUSES: &[&str] = &["completed", "failed", "cancelled", "expired"];

pub struct AgentClient {
    http: reqwest::Client,
    endpoint: String,
    agent_id: String,
    token: String,
    api_version: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AgentClient {
    pub fn new(settings: &ChatSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(AgentClient {
            http,
            endpoint: settings.endpoint.clone(),
            agent_id: settings.agent_id.clone(),
            token: settings.token.clone(),
            api_version: settings.api_version.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_polls: settings.max_polls,
        })
    }

    /// Create a fresh conversation thread and return its id.
    pub async fn create_thread(&self) -> Result<String> {
        let json = self
            .post_json("threads", &serde_json::json!({}))
            .await
            .context("thread creation failed")?;
        json.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("thread creation response has no id"))
    }

    /// One full round trip: post the user message, run the agent to
    /// completion, and return the newest assistant reply text.
    pub async fn ask(&self, thread_id: &str, content: &str) -> Result<String> {
        self.post_json(
            &format!("threads/{thread_id}/messages"),
            &serde_json::json!({ "role": "user", "content": content }),
        )
        .await
        .context("posting message failed")?;

        let run = self
            .post_json(
                &format!("threads/{thread_id}/runs"),
                &serde_json::json!({ "assistant_id": self.agent_id }),
            )
            .await
            .context("starting run failed")?;
        let run_id = run
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("run creation response has no id"))?;

        let outcome = self.wait_for_run(thread_id, run_id).await?;
        if outcome.status != "completed" {
            bail!(
                "run {} {}: {}",
                run_id,
                outcome.status,
                outcome.last_error.unwrap_or_else(|| "(no error detail)".to_string())
            );
        }

        self.latest_reply(thread_id)
            .await?
            .ok_or_else(|| anyhow!("agent returned no reply"))
    }

    /// Poll the run until it reaches a terminal status or the poll budget
    /// runs out.
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<RunOutcome> {
        for poll in 0..self.max_polls {
            if poll > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }

            let json = self
                .get_json(&format!("threads/{thread_id}/runs/{run_id}"), &[])
                .await
                .context("run status poll failed")?;

            let status = json
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            debug!(run_id, %status, "run status");

            if TERMINAL_RUN_STATUSES.contains(&status.as_str()) {
                let last_error = json
                    .get("last_error")
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string());
                return Ok(RunOutcome { status, last_error });
            }
        }

        bail!(
            "run {} did not finish within {} polls",
            run_id,
            self.max_polls
        )
    }

    /// Fetch the newest assistant message in the thread, if any.
    async fn latest_reply(&self, thread_id: &str) -> Result<Option<String>> {
        let json = self
            .get_json(
                &format!("threads/{thread_id}/messages"),
                &[("order", "desc"), ("limit", "20")],
            )
            .await
            .context("listing messages failed")?;

        let messages = json
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("message list response has no data array"))?;

        for message in messages {
            let role = message
                .get("role")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            if !(role.contains("assistant") || role.contains("agent")) {
                continue;
            }
            let text = extract_message_text(message);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }

        Ok(None)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(format!("{}/{}", self.endpoint, path))
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        expect_json(resp).await
    }

    async fn get_json(
        &self,
        path: &str,
        extra_query: &[(&str, &str)],
    ) -> Result<serde_json::Value> {
        let resp = self
            .http
            .get(format!("{}/{}", self.endpoint, path))
            .query(&[("api-version", self.api_version.as_str())])
            .query(extra_query)
            .bearer_auth(&self.token)
            .send()
            .await?;
        expect_json(resp).await
    }
}

struct RunOutcome {
    status: String,
    last_error: Option<String>,
}

async fn expect_json(resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!(
            "agent service error {}: {}",
            status,
            body.chars().take(500).collect::<String>()
        );
    }
    Ok(resp.json().await?)
}

/// Concatenate every text part of a message's content array.
fn extract_message_text(message: &serde_json::Value) -> String {
    let Some(parts) = message.get("content").and_then(|v| v.as_array()) else {
        // Some payloads carry content as a bare string.
        return message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
    };

    let mut out = Vec::new();
    for part in parts {
        if let Some(value) = part
            .get("text")
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_str())
        {
            out.push(value.to_string());
        } else if let Some(value) = part.get("text").and_then(|t| t.as_str()) {
            out.push(value.to_string());
        }
    }
    out.join("\n")
}
