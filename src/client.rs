//! Mailbox port and its Gmail API implementation

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{GmailHub, GMAIL_MODIFY_SCOPE};
use crate::error::{FilterFoxError, Result};
use crate::models::{Header, MessageMetadata};

/// Headers requested with every metadata fetch
pub const METADATA_HEADERS: &[&str] = &["From", "To", "Subject", "List-Unsubscribe", "Precedence"];

/// Gmail caps `messages.list` page size at 500
const MAX_PAGE_SIZE: usize = 500;

/// Per-request timeout so a stalled call cannot hang a run
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RETRIES: u32 = 3;

/// Ceiling for any single retry wait, including server-requested Retry-After
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Label info returned from Gmail API
#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Operations the run pipeline needs from a mailbox
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List up to `max_results` message ids matching `query`, in mailbox order.
    /// Implementations page internally.
    async fn list_candidate_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>>;

    /// Fetch a message's headers
    async fn get_metadata(&self, id: &str) -> Result<MessageMetadata>;

    /// Return the id of the label named exactly `name`, creating it if needed
    async fn ensure_label(&self, name: &str) -> Result<String>;

    /// Add and remove labels on one message
    async fn apply_label_change(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Gmail-backed mailbox with per-request timeouts and retry on transient failures
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }

    /// Check if an error is retryable
    fn should_retry(error: &FilterFoxError) -> bool {
        error.is_transient()
    }

    /// How long to wait before the next attempt. Retry-After can stretch the
    /// wait, but never past [`MAX_BACKOFF`].
    fn retry_wait(error: &FilterFoxError, delay: Duration) -> Duration {
        match error {
            FilterFoxError::RateLimitExceeded { retry_after } => {
                delay.max(Duration::from_secs(*retry_after)).min(MAX_BACKOFF)
            }
            _ => delay.min(MAX_BACKOFF),
        }
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    let wait = Self::retry_wait(&e, delay);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = std::cmp::min(delay * 2, MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one API call under [`REQUEST_TIMEOUT`]
    async fn with_timeout<T, Fut>(operation_name: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        match tokio::time::timeout(REQUEST_TIMEOUT, call).await {
            Ok(result) => result.map_err(FilterFoxError::from),
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, REQUEST_TIMEOUT
                );
                Err(FilterFoxError::NetworkError(format!(
                    "{} timed out after {:?}",
                    operation_name, REQUEST_TIMEOUT
                )))
            }
        }
    }

    /// List all labels in the account
    pub async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", MAX_RETRIES, || async {
            let (_, response) = Self::with_timeout(
                "list_labels",
                self.hub
                    .users()
                    .labels_list("me")
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit(),
            )
            .await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Fetched {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    /// Create a new user label, visible in both the label and message lists
    pub async fn create_label(&self, name: &str) -> Result<String> {
        Self::with_retry("create_label", MAX_RETRIES, || async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created) = Self::with_timeout(
                "create_label",
                self.hub
                    .users()
                    .labels_create(label, "me")
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit(),
            )
            .await?;

            created
                .id
                .ok_or_else(|| FilterFoxError::LabelError("Created label has no ID".to_string()))
        })
        .await
    }
}

/// Page size for the next `messages.list` call
fn page_size(remaining: usize) -> u32 {
    remaining.min(MAX_PAGE_SIZE) as u32
}

/// Page through a listing until `max_results` ids are collected or the
/// listing runs out. `fetch_page` gets the page size and the previous page's
/// token and returns that page's ids plus the next token.
async fn collect_paged_ids<F, Fut>(max_results: usize, mut fetch_page: F) -> Result<Vec<String>>
where
    F: FnMut(u32, Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<String>, Option<String>)>>,
{
    let mut ids: Vec<String> = Vec::new();
    let mut page_token: Option<String> = None;

    while ids.len() < max_results {
        let (page_ids, next_token) =
            fetch_page(page_size(max_results - ids.len()), page_token.take()).await?;
        ids.extend(page_ids);

        page_token = next_token;
        if page_token.is_none() {
            break;
        }
    }

    ids.truncate(max_results);
    Ok(ids)
}

/// Exact-name lookup with create on miss.
///
/// A create that conflicts means the label exists after all (created
/// concurrently, or by an earlier attempt whose response was lost), so the
/// labels are listed once more and the match returned.
async fn find_or_create_label<L, LFut, C, CFut>(
    name: &str,
    mut list_labels: L,
    create_label: C,
) -> Result<String>
where
    L: FnMut() -> LFut,
    LFut: Future<Output = Result<Vec<LabelInfo>>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<String>>,
{
    let find = |labels: Vec<LabelInfo>| {
        labels
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
    };

    if let Some(id) = find(list_labels().await?) {
        debug!("Label '{}' already exists with ID {}", name, id);
        return Ok(id);
    }

    match create_label().await {
        Ok(id) => {
            info!("Created label '{}' with ID: {}", name, id);
            Ok(id)
        }
        Err(FilterFoxError::Conflict(message)) => {
            warn!("Creating label '{}' conflicted ({}), looking it up again", name, message);
            find(list_labels().await?).ok_or_else(|| {
                FilterFoxError::LabelError(format!(
                    "Label '{}' reported as existing but not found: {}",
                    name, message
                ))
            })
        }
        Err(e) => Err(e),
    }
}

/// Convert a Gmail API message into our header-only metadata.
/// A message without payload headers yields an empty header list.
fn parse_message_metadata(msg: Message) -> Result<MessageMetadata> {
    let id = msg
        .id
        .ok_or_else(|| FilterFoxError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| {
            let name = h.name?;
            Some(Header {
                name,
                value: h.value.unwrap_or_default(),
            })
        })
        .collect();

    Ok(MessageMetadata { id, headers })
}

#[async_trait]
impl MailboxClient for ProductionGmailClient {
    async fn list_candidate_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let ids = collect_paged_ids(max_results, |page, token| async move {
            Self::with_retry("list_messages", MAX_RETRIES, || async {
                let mut call = self
                    .hub
                    .users()
                    .messages_list("me")
                    .q(query)
                    .max_results(page);

                if let Some(token) = token.as_deref() {
                    call = call.page_token(token);
                }

                let (_, response) =
                    Self::with_timeout("list_messages", call.add_scope(GMAIL_MODIFY_SCOPE).doit())
                        .await?;

                let page_ids: Vec<String> = response
                    .messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|m| m.id)
                    .collect();
                Ok((page_ids, response.next_page_token))
            })
            .await
        })
        .await?;

        info!("Listed {} candidate messages for query '{}'", ids.len(), query);
        Ok(ids)
    }

    async fn get_metadata(&self, id: &str) -> Result<MessageMetadata> {
        Self::with_retry("get_metadata", MAX_RETRIES, || async {
            let mut call = self.hub.users().messages_get("me", id).format("metadata");
            for header in METADATA_HEADERS {
                call = call.add_metadata_headers(header);
            }

            let (_, msg) =
                Self::with_timeout("get_metadata", call.add_scope(GMAIL_MODIFY_SCOPE).doit())
                    .await?;
            parse_message_metadata(msg)
        })
        .await
    }

    async fn ensure_label(&self, name: &str) -> Result<String> {
        find_or_create_label(name, || self.list_labels(), || self.create_label(name)).await
    }

    async fn apply_label_change(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        Self::with_retry("modify_message", MAX_RETRIES, || async {
            let request = ModifyMessageRequest {
                add_label_ids: Some(add_label_ids.to_vec()),
                remove_label_ids: Some(remove_label_ids.to_vec()),
            };

            Self::with_timeout(
                "modify_message",
                self.hub
                    .users()
                    .messages_modify(request, "me", message_id)
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit(),
            )
            .await?;
            Ok(())
        })
        .await
    }
}
