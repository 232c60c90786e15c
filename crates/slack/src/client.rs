//! Slack Web API calls the bot needs: `chat.postMessage` and `users.profile.get`.

use std::time::Duration;

use async_trait::async_trait;
use kintai_core::config::SlackConfig;
use kintai_core::domain::user::UserId;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack returned HTTP {0}")]
    Status(u16),
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
    #[error("slack api error: {0}")]
    Api(String),
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    /// Real name, falling back to the profile display name. `None` when both are blank.
    async fn display_name(&self, user_id: &UserId) -> Result<Option<String>, SlackApiError>;
}

#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    profile: Option<ProfilePayload>,
}

#[derive(Deserialize)]
struct ProfilePayload {
    real_name: Option<String>,
    display_name: Option<String>,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, SlackApiError> {
        if !response.status().is_success() {
            return Err(SlackApiError::Status(response.status().as_u16()));
        }
        let payload: ApiResponse =
            response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;
        if !payload.ok {
            return Err(SlackApiError::Api(
                payload.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body = json!({
            "channel": channel_id,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });
        let response = self
            .client
            .post(self.url("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        Self::read(response).await?;
        debug!(event_name = "slack.message_posted", channel_id, "chat.postMessage ok");
        Ok(())
    }

    async fn display_name(&self, user_id: &UserId) -> Result<Option<String>, SlackApiError> {
        let response = self
            .client
            .get(self.url("users.profile.get"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("user", user_id.as_str())])
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        let payload = Self::read(response).await?;
        Ok(payload.profile.and_then(preferred_name))
    }
}

fn preferred_name(profile: ProfilePayload) -> Option<String> {
    [profile.real_name, profile.display_name]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_owned())
        .find(|name| !name.is_empty())
}
