//! Run orchestration: list, fetch, classify, plan, resolve labels, apply or preview
//!
//! Messages are processed strictly one at a time in the order the mailbox
//! listed them. Every mailbox call is awaited before the next is issued, so
//! the label cache never sees two lookups for the same name in flight.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::actions::{plan_for_category, summarize_message};
use crate::classifier::EmailClassifier;
use crate::client::MailboxClient;
use crate::config::RunConfig;
use crate::error::{FilterFoxError, Result};
use crate::models::{ActionPlan, MessageResult, PlannedAction, RunMode, RunResult, INBOX_LABEL};

/// Invoked once per processed message id, classified or not
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Label name to Gmail label id, valid for a single run only.
///
/// Labels can be renamed or deleted outside FilterFox, so ids are never
/// carried over between runs.
#[derive(Debug, Default)]
pub struct LabelCache {
    ids: HashMap<String, String>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached id for `label_name`, asking the mailbox on first use
    pub async fn resolve<C>(&mut self, client: &C, label_name: &str) -> Result<String>
    where
        C: MailboxClient + ?Sized,
    {
        if let Some(id) = self.ids.get(label_name) {
            return Ok(id.clone());
        }

        let id = client.ensure_label(label_name).await?;
        debug!("Resolved label '{}' to {}", label_name, id);
        self.ids.insert(label_name.to_string(), id.clone());
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Label ids to add and remove for a plan. INBOX is removed only when archiving.
pub fn label_changes(plan: &ActionPlan, label_id: &str) -> (Vec<String>, Vec<String>) {
    let add = vec![label_id.to_string()];
    let remove = if plan.archive {
        vec![INBOX_LABEL.to_string()]
    } else {
        Vec::new()
    };
    (add, remove)
}

/// Run one pass over the messages selected by `run.query`.
///
/// Any mailbox failure after listing aborts the run with
/// [`FilterFoxError::RunAborted`], carrying everything recorded so far.
/// Label changes already applied stay applied.
pub async fn run_filterfox<C>(
    client: &C,
    run: &RunConfig,
    on_progress: Option<ProgressCallback>,
) -> Result<RunResult>
where
    C: MailboxClient + ?Sized,
{
    let mode = run.mode();
    info!(
        "Starting {} run: query='{}', max_results={}, prefix='{}'",
        mode, run.query, run.max_results, run.label_prefix
    );

    let ids = client.list_candidate_ids(&run.query, run.max_results).await?;

    let classifier = EmailClassifier::new();
    let mut labels = LabelCache::new();
    let mut result = RunResult {
        found: ids.len(),
        ..RunResult::default()
    };

    for id in &ids {
        if let Err(source) =
            process_message(client, &classifier, run, mode, &mut labels, &mut result, id).await
        {
            return Err(FilterFoxError::RunAborted {
                message_id: id.clone(),
                partial: Box::new(result),
                source: Box::new(source),
            });
        }

        if let Some(on_progress) = &on_progress {
            on_progress();
        }
    }

    info!(
        "Run complete: found={}, classified={}, skipped={}, applied={}, labels={}",
        result.found,
        result.classified,
        result.skipped,
        result.applied,
        labels.len()
    );
    Ok(result)
}

async fn process_message<C>(
    client: &C,
    classifier: &EmailClassifier,
    run: &RunConfig,
    mode: RunMode,
    labels: &mut LabelCache,
    result: &mut RunResult,
    id: &str,
) -> Result<()>
where
    C: MailboxClient + ?Sized,
{
    let metadata = client.get_metadata(id).await?;

    let Some(classification) = classifier.classify(&metadata) else {
        debug!("Message {} matched no rule, skipping", id);
        result.skipped += 1;
        return Ok(());
    };

    let plan = plan_for_category(&classification.category, &run.label_prefix);
    let label_id = labels.resolve(client, &plan.label_name).await?;

    debug!(
        "Message {} -> {} ({}), archive={}",
        id, plan.label_name, classification.reason, plan.archive
    );

    result.results.push(MessageResult {
        message_id: id.to_string(),
        category: classification.category,
        reason: classification.reason,
        summary: summarize_message(&metadata),
        action: PlannedAction {
            label: plan.label_name.clone(),
            archive: plan.archive,
        },
    });
    result.classified += 1;

    if mode == RunMode::Apply {
        let (add, remove) = label_changes(&plan, &label_id);
        client.apply_label_change(id, &add, &remove).await?;
        result.applied += 1;
    }

    Ok(())
}
