use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::DiscordConfig;
use crate::tasks::{NewTask, MANAGEMENT_TARGET};

const API_BASE: &str = "https://discord.com/api/v10";
pub const INVALID_ID: &str = "Invalid ID";
pub const LOOKUP_ERROR: &str = "Error";

#[derive(Debug, Deserialize)]
struct DiscordUser {
    username: String,
    global_name: Option<String>,
}

pub struct DiscordClient {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Discord HTTP client")?;
        Ok(Self { http, config })
    }

    /// Display names for each unique ID, looked up concurrently.
    ///
    /// A failed lookup only affects its own ID: a rejected request maps to
    /// `Invalid ID`, a transport failure to `Error`.
    pub async fn lookup_names(&self, ids: &[String]) -> HashMap<String, String> {
        let Some(token) = self.config.bot_token.as_deref() else {
            debug!("no bot token configured, skipping Discord lookups");
            return HashMap::new();
        };

        let lookups = ids.iter().map(|id| async move {
            let name = match self.fetch_user(token, id).await {
                Ok(Some(user)) => user.global_name.unwrap_or(user.username),
                Ok(None) => INVALID_ID.to_string(),
                Err(err) => {
                    warn!(discord_id = %id, error = %err, "Discord lookup failed");
                    LOOKUP_ERROR.to_string()
                }
            };
            (id.clone(), name)
        });

        join_all(lookups).await.into_iter().collect()
    }

    async fn fetch_user(&self, token: &str, id: &str) -> reqwest::Result<Option<DiscordUser>> {
        let response = self
            .http
            .get(format!("{API_BASE}/users/{id}"))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }
        response.json().await.map(Some)
    }

    /// Posts one message announcing `tasks`. Failures are logged and reported as
    /// `false`, never raised.
    pub async fn push_tasks(&self, tasks: &[NewTask], target: &str) -> bool {
        let (Some(token), Some(channel)) = (
            self.config.bot_token.as_deref(),
            self.config.channel_id.as_deref(),
        ) else {
            warn!("Discord bot token or channel not configured, notification skipped");
            return false;
        };

        let content = format_task_message(tasks, target, self.config.ssm_role_id.as_deref());
        let result = self
            .http
            .post(format!("{API_BASE}/channels/{channel}/messages"))
            .header("Authorization", format!("Bot {token}"))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Discord rejected the task notification");
                false
            }
            Err(err) => {
                warn!(error = %err, "Discord task notification failed");
                false
            }
        }
    }
}

/// Message body for a batch of tasks. `SSM` is rendered as a role mention.
pub fn format_task_message(tasks: &[NewTask], target: &str, ssm_role_id: Option<&str>) -> String {
    let target = target.trim();
    let mention = if target.eq_ignore_ascii_case(MANAGEMENT_TARGET) {
        ssm_role_id
            .map(|role| format!("<@&{role}>"))
            .unwrap_or_else(|| target.to_string())
    } else {
        target.to_string()
    };

    let mut content = if mention.is_empty() {
        "**New Task(s) Logged:**\n\n".to_string()
    } else {
        format!("**New Task(s) Assigned To:** {mention}\n\n")
    };

    for task in tasks {
        content.push_str(&format!("• **{}**\n", task.title));
        if !task.description.is_empty() {
            content.push_str(&format!("  └ *{}*\n", task.description));
        }
    }
    content
}
