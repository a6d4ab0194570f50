//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use filterfox::client::{LabelInfo, MailboxClient};
use filterfox::config::RunConfig;
use filterfox::error::{FilterFoxError, Result};
use filterfox::models::{Header, MessageMetadata};
use mockall::mock;
use std::sync::Mutex;

/// Create a test message with From and Subject headers
pub fn create_test_message(id: &str, from: &str, subject: &str) -> MessageMetadata {
    MessageMetadata::new(
        id,
        vec![
            Header::new("From", from),
            Header::new("To", "me@example.com"),
            Header::new("Subject", subject),
        ],
    )
}

/// Create a newsletter message (carries List-Unsubscribe)
pub fn create_newsletter_message(id: &str, from: &str) -> MessageMetadata {
    let mut message = create_test_message(id, from, "This week in Rust");
    message
        .headers
        .push(Header::new("List-Unsubscribe", "<mailto:leave@lists.example>"));
    message
}

pub fn create_promo_message(id: &str) -> MessageMetadata {
    create_test_message(id, "deals@shop.example", "50% off your next order!")
}

pub fn create_receipt_message(id: &str) -> MessageMetadata {
    create_test_message(id, "billing@acme.com", "Your invoice #123 receipt")
}

pub fn create_social_message(id: &str) -> MessageMetadata {
    create_test_message(id, "notifications@github.com", "New comment")
}

/// A message no rule matches
pub fn create_personal_message(id: &str) -> MessageMetadata {
    create_test_message(id, "alice@friends.example", "Lunch on Thursday?")
}

pub fn preview_config() -> RunConfig {
    RunConfig {
        dry_run: true,
        ..RunConfig::default()
    }
}

pub fn apply_config() -> RunConfig {
    RunConfig {
        dry_run: false,
        ..RunConfig::default()
    }
}

/// One recorded `apply_label_change` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub message_id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

/// Everything a [`FakeMailbox`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub list_calls: usize,
    pub fetched: Vec<String>,
    pub ensured: Vec<String>,
    pub created: Vec<String>,
    pub applied: Vec<AppliedChange>,
}

/// In-memory mailbox that behaves like Gmail for the calls the pipeline makes
/// and records every call
pub struct FakeMailbox {
    messages: Vec<MessageMetadata>,
    labels: Mutex<Vec<LabelInfo>>,
    calls: Mutex<CallLog>,
    fail_fetch_for: Option<String>,
    fail_apply_for: Option<String>,
}

impl FakeMailbox {
    pub fn new(messages: Vec<MessageMetadata>) -> Self {
        Self {
            messages,
            labels: Mutex::new(Vec::new()),
            calls: Mutex::new(CallLog::default()),
            fail_fetch_for: None,
            fail_apply_for: None,
        }
    }

    /// Pre-populate a label as if it had been created by an earlier run
    pub fn with_label(self, id: &str, name: &str) -> Self {
        self.labels.lock().unwrap().push(LabelInfo {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn failing_fetch(mut self, message_id: &str) -> Self {
        self.fail_fetch_for = Some(message_id.to_string());
        self
    }

    pub fn failing_apply(mut self, message_id: &str) -> Self {
        self.fail_apply_for = Some(message_id.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id.clone())
    }
}

#[async_trait]
impl MailboxClient for FakeMailbox {
    async fn list_candidate_ids(&self, _query: &str, max_results: usize) -> Result<Vec<String>> {
        self.calls.lock().unwrap().list_calls += 1;
        Ok(self
            .messages
            .iter()
            .take(max_results)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<MessageMetadata> {
        self.calls.lock().unwrap().fetched.push(id.to_string());
        if self.fail_fetch_for.as_deref() == Some(id) {
            return Err(FilterFoxError::ServerError {
                status: 503,
                message: "HTTP 503: Service Unavailable".to_string(),
            });
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| FilterFoxError::NotFound(id.to_string()))
    }

    async fn ensure_label(&self, name: &str) -> Result<String> {
        self.calls.lock().unwrap().ensured.push(name.to_string());

        let mut labels = self.labels.lock().unwrap();
        if let Some(existing) = labels.iter().find(|l| l.name == name) {
            return Ok(existing.id.clone());
        }

        let id = format!("Label_{}", labels.len() + 1);
        labels.push(LabelInfo {
            id: id.clone(),
            name: name.to_string(),
        });
        self.calls.lock().unwrap().created.push(name.to_string());
        Ok(id)
    }

    async fn apply_label_change(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        if self.fail_apply_for.as_deref() == Some(message_id) {
            return Err(FilterFoxError::Forbidden("HTTP 403: Forbidden".to_string()));
        }
        self.calls.lock().unwrap().applied.push(AppliedChange {
            message_id: message_id.to_string(),
            add: add_label_ids.to_vec(),
            remove: remove_label_ids.to_vec(),
        });
        Ok(())
    }
}

// Mock implementation of MailboxClient for call-expectation tests
mock! {
    pub Mailbox {}

    #[async_trait::async_trait]
    impl MailboxClient for Mailbox {
        async fn list_candidate_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
        async fn get_metadata(&self, id: &str) -> Result<MessageMetadata>;
        async fn ensure_label(&self, name: &str) -> Result<String>;
        async fn apply_label_change(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "test@example.com", "Test Subject");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.header("From"), "test@example.com");
        assert_eq!(msg.header("Subject"), "Test Subject");
        assert_eq!(msg.header("List-Unsubscribe"), "");
    }

    #[test]
    fn test_create_newsletter_message() {
        let msg = create_newsletter_message("msg1", "digest@news.example");
        assert!(!msg.header("List-Unsubscribe").is_empty());
    }

    #[tokio::test]
    async fn test_fake_mailbox_ensure_label_is_idempotent() {
        let mailbox = FakeMailbox::new(vec![]).with_label("Label_9", "FilterFox/Social");

        let existing = mailbox.ensure_label("FilterFox/Social").await.unwrap();
        let created = mailbox.ensure_label("FilterFox/Receipts").await.unwrap();
        let again = mailbox.ensure_label("FilterFox/Receipts").await.unwrap();

        assert_eq!(existing, "Label_9");
        assert_eq!(created, again);
        assert_eq!(mailbox.calls().created, vec!["FilterFox/Receipts".to_string()]);
    }
}
