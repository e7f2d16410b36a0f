//! Browser engine boundary.
//!
//! The engine owns real browser state on the other side of an HTTP
//! endpoint; this side only holds an opaque session id. The
//! [`EngineSessionFactory`] adapter plugs the engine into the session
//! manager so session lifetime is managed in one place.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PluginResult;
use crate::session::SessionFactory;

/// Opaque engine-assigned session identifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the browser dispatcher can ask the engine to do.
#[async_trait]
pub trait BrowserEngine: Send + Sync + 'static {
    async fn open_session(&self) -> PluginResult<SessionId>;
    async fn close_session(&self, id: &SessionId) -> PluginResult<()>;
    async fn observe(&self, id: &SessionId, url: &str) -> PluginResult<Value>;
    async fn act(&self, id: &SessionId, url: &str, instruction: &str) -> PluginResult<Value>;
    async fn extract(&self, id: &SessionId, url: &str, query: &str) -> PluginResult<Value>;
}

/// REST-backed engine speaking to a local automation endpoint.
#[derive(Clone, Debug)]
pub struct RestBrowserEngine {
    client: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
struct OpenSessionResponse {
    session_id: SessionId,
}

impl RestBrowserEngine {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn session_call(
        &self,
        id: &SessionId,
        endpoint: &str,
        body: Value,
    ) -> PluginResult<Value> {
        let result = self
            .client
            .post(self.url(&format!("/sessions/{id}/{endpoint}")))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl BrowserEngine for RestBrowserEngine {
    async fn open_session(&self) -> PluginResult<SessionId> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .send()
            .await?
            .error_for_status()?
            .json::<OpenSessionResponse>()
            .await?;
        Ok(response.session_id)
    }

    async fn close_session(&self, id: &SessionId) -> PluginResult<()> {
        self.client
            .delete(self.url(&format!("/sessions/{id}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn observe(&self, id: &SessionId, url: &str) -> PluginResult<Value> {
        self.session_call(id, "observe", serde_json::json!({ "url": url }))
            .await
    }

    async fn act(&self, id: &SessionId, url: &str, instruction: &str) -> PluginResult<Value> {
        self.session_call(
            id,
            "act",
            serde_json::json!({ "url": url, "instruction": instruction }),
        )
        .await
    }

    async fn extract(&self, id: &SessionId, url: &str, query: &str) -> PluginResult<Value> {
        self.session_call(
            id,
            "extract",
            serde_json::json!({ "url": url, "query": query }),
        )
        .await
    }
}

/// Session-manager factory backed by a shared engine.
pub struct EngineSessionFactory<E: BrowserEngine> {
    engine: Arc<E>,
}

impl<E: BrowserEngine> EngineSessionFactory<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<E: BrowserEngine> SessionFactory for EngineSessionFactory<E> {
    type Handle = SessionId;

    async fn create(&self) -> PluginResult<SessionId> {
        self.engine.open_session().await
    }

    async fn destroy(&self, handle: &SessionId) -> PluginResult<()> {
        self.engine.close_session(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_transparent_on_the_wire() {
        let id: SessionId = serde_json::from_str(r#""s-1""#).unwrap();
        assert_eq!(id, SessionId("s-1".to_string()));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""s-1""#);
    }

    #[test]
    fn test_rest_engine_normalizes_base_url() {
        let engine = RestBrowserEngine::new("http://127.0.0.1:3900/");
        assert_eq!(engine.url("/sessions"), "http://127.0.0.1:3900/sessions");
    }
}
