//! Mail provider boundary.
//!
//! The dispatcher only ever talks to [`MailProvider`]; the REST-backed
//! default implementation keeps the concrete wire calls in one place and the
//! tests swap in a recording mock.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PluginResult;
use crate::rules::Subject;

/// One header as the provider reports it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailHeader {
    pub name: String,
    pub value: String,
}

/// One message as the provider reports it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub headers: Vec<MailHeader>,
}

/// One page of inbox results plus the continuation cursor.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InboxPage {
    #[serde(default)]
    pub messages: Vec<MailMessage>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A message to send or to park as a draft.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub in_reply_to: Option<String>,
}

/// Flatten a provider message into the record the rule engine evaluates.
///
/// Header names keep their original casing; lookups are case-insensitive on
/// the engine side. Duplicate header names keep the last value, which is
/// enough for presence checks.
pub fn normalize(message: &MailMessage) -> Subject {
    let headers: HashMap<String, String> = message
        .headers
        .iter()
        .map(|header| (header.name.clone(), header.value.clone()))
        .collect();
    Subject {
        from: message.from.clone(),
        subject: message.subject.clone(),
        headers,
    }
}

/// Everything the mail dispatcher can do to an account.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn list_inbox(&self, cursor: Option<&str>, limit: usize) -> PluginResult<InboxPage>;
    async fn apply_label(&self, message_id: &str, label: &str) -> PluginResult<()>;
    async fn archive(&self, message_id: &str) -> PluginResult<()>;
    async fn send(&self, draft: &MailDraft) -> PluginResult<()>;
    async fn trash(&self, message_id: &str) -> PluginResult<()>;
    async fn delete_permanent(&self, message_id: &str) -> PluginResult<()>;
    async fn unsubscribe(&self, message_id: &str) -> PluginResult<()>;
    async fn create_draft(&self, draft: &MailDraft) -> PluginResult<()>;
}

/// REST-backed provider speaking to the local mail bridge.
#[derive(Clone, Debug)]
pub struct RestMailProvider {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl RestMailProvider {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn post_empty(&self, path: &str) -> PluginResult<()> {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl MailProvider for RestMailProvider {
    async fn list_inbox(&self, cursor: Option<&str>, limit: usize) -> PluginResult<InboxPage> {
        let mut request = self
            .client
            .get(self.url("/messages"))
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        let page = request
            .send()
            .await?
            .error_for_status()?
            .json::<InboxPage>()
            .await?;
        Ok(page)
    }

    async fn apply_label(&self, message_id: &str, label: &str) -> PluginResult<()> {
        self.client
            .post(self.url(&format!("/messages/{message_id}/labels")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "label": label }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn archive(&self, message_id: &str) -> PluginResult<()> {
        self.post_empty(&format!("/messages/{message_id}/archive")).await
    }

    async fn send(&self, draft: &MailDraft) -> PluginResult<()> {
        self.client
            .post(self.url("/messages/send"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn trash(&self, message_id: &str) -> PluginResult<()> {
        self.post_empty(&format!("/messages/{message_id}/trash")).await
    }

    async fn delete_permanent(&self, message_id: &str) -> PluginResult<()> {
        self.client
            .delete(self.url(&format!("/messages/{message_id}")))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn unsubscribe(&self, message_id: &str) -> PluginResult<()> {
        self.post_empty(&format!("/messages/{message_id}/unsubscribe")).await
    }

    async fn create_draft(&self, draft: &MailDraft) -> PluginResult<()> {
        self.client
            .post(self.url("/drafts"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_flattens_headers() {
        let message = MailMessage {
            id: "m-1".to_string(),
            from: "news@daily.com".to_string(),
            subject: "Digest".to_string(),
            headers: vec![
                MailHeader {
                    name: "List-Unsubscribe".to_string(),
                    value: "<mailto:off@daily.com>".to_string(),
                },
                MailHeader {
                    name: "Message-Id".to_string(),
                    value: "<abc@daily.com>".to_string(),
                },
            ],
        };

        let subject = normalize(&message);
        assert_eq!(subject.from, "news@daily.com");
        assert_eq!(subject.subject, "Digest");
        assert_eq!(
            subject.headers.get("List-Unsubscribe").map(String::as_str),
            Some("<mailto:off@daily.com>")
        );
    }

    #[test]
    fn test_inbox_page_parses_partial_json() {
        let page: InboxPage =
            serde_json::from_str(r#"{"messages":[{"id":"m-1"}]}"#).unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, "m-1");
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_rest_provider_normalizes_base_url() {
        let provider = RestMailProvider::new("http://127.0.0.1:8970/", "token");
        assert_eq!(provider.url("/messages"), "http://127.0.0.1:8970/messages");
    }
}
