//! REST client for the remote conversation authority.
//!
//! The [`BackendApi`] trait is the seam the gateway (and the engine's
//! tests) talk through; [`HttpBackend`] is the production implementation.
//! Every request carries a bearer credential header when one is
//! configured. No retries — the socket reconnect loop is the only retry
//! machinery in the system.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use banter_core::errors::{ChatError, Result};
use banter_core::model::{Message, Role, Session};
use banter_core::settings::{ChatSettings, SettingsPatch};

/// Body of `POST /conversations/:id/messages`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Author role (always `user` for engine-initiated sends).
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Sampling settings in effect at send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ChatSettings>,
}

/// The backend's REST surface, one method per endpoint.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /conversations`
    async fn list_conversations(&self, auth: Option<&str>) -> Result<Vec<Session>>;
    /// `POST /conversations {title}`
    async fn create_conversation(&self, auth: Option<&str>, title: &str) -> Result<Session>;
    /// `PATCH /conversations/:id {title}`
    async fn update_conversation(
        &self,
        auth: Option<&str>,
        id: &str,
        title: &str,
    ) -> Result<Session>;
    /// `DELETE /conversations/:id`
    async fn delete_conversation(&self, auth: Option<&str>, id: &str) -> Result<()>;
    /// `GET /conversations/:id/messages`
    async fn list_messages(&self, auth: Option<&str>, id: &str) -> Result<Vec<Message>>;
    /// `POST /conversations/:id/messages` — returns the assistant reply.
    async fn create_message(
        &self,
        auth: Option<&str>,
        id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message>;
    /// `DELETE /conversations/:id/messages`
    async fn clear_messages(&self, auth: Option<&str>, id: &str) -> Result<()>;
    /// `POST /settings`
    async fn update_settings(&self, auth: Option<&str>, patch: &SettingsPatch) -> Result<()>;
}

/// Production `BackendApi` over reqwest.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Client for the API rooted at `base_url` (e.g.
    /// `http://localhost:8080/api`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(req: RequestBuilder, auth: Option<&str>) -> RequestBuilder {
        match auth {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn expect_ok(req: RequestBuilder) -> Result<reqwest::Response> {
        let response = req
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| ChatError::Network(e.to_string()))
    }

    async fn json<T: for<'de> Deserialize<'de>>(req: RequestBuilder) -> Result<T> {
        Self::expect_ok(req)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::Network(format!("decode response: {e}")))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn list_conversations(&self, auth: Option<&str>) -> Result<Vec<Session>> {
        let req = Self::authed(self.client.get(self.url("/conversations")), auth);
        Self::json(req).await
    }

    async fn create_conversation(&self, auth: Option<&str>, title: &str) -> Result<Session> {
        debug!(title, "creating remote conversation");
        let req = Self::authed(self.client.post(self.url("/conversations")), auth)
            .json(&serde_json::json!({ "title": title }));
        Self::json(req).await
    }

    async fn update_conversation(
        &self,
        auth: Option<&str>,
        id: &str,
        title: &str,
    ) -> Result<Session> {
        let req = Self::authed(
            self.client.patch(self.url(&format!("/conversations/{id}"))),
            auth,
        )
        .json(&serde_json::json!({ "title": title }));
        Self::json(req).await
    }

    async fn delete_conversation(&self, auth: Option<&str>, id: &str) -> Result<()> {
        let req = Self::authed(
            self.client
                .delete(self.url(&format!("/conversations/{id}"))),
            auth,
        );
        let _ = Self::expect_ok(req).await?;
        Ok(())
    }

    async fn list_messages(&self, auth: Option<&str>, id: &str) -> Result<Vec<Message>> {
        let req = Self::authed(
            self.client
                .get(self.url(&format!("/conversations/{id}/messages"))),
            auth,
        );
        Self::json(req).await
    }

    async fn create_message(
        &self,
        auth: Option<&str>,
        id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message> {
        let req = Self::authed(
            self.client
                .post(self.url(&format!("/conversations/{id}/messages"))),
            auth,
        )
        .json(message);
        Self::json(req).await
    }

    async fn clear_messages(&self, auth: Option<&str>, id: &str) -> Result<()> {
        let req = Self::authed(
            self.client
                .delete(self.url(&format!("/conversations/{id}/messages"))),
            auth,
        );
        let _ = Self::expect_ok(req).await?;
        Ok(())
    }

    async fn update_settings(&self, auth: Option<&str>, patch: &SettingsPatch) -> Result<()> {
        let req = Self::authed(self.client.post(self.url("/settings")), auth).json(patch);
        let _ = Self::expect_ok(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let backend = HttpBackend::new("http://h/api/");
        assert_eq!(backend.url("/conversations"), "http://h/api/conversations");
    }

    #[test]
    fn outgoing_message_omits_absent_settings() {
        let msg = OutgoingMessage {
            role: Role::User,
            content: "hi".into(),
            settings: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
