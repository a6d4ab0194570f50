//! Category to action policy

use crate::models::{ActionPlan, Category, MessageMetadata};

/// Maps a category to the label to apply and whether to archive.
///
/// Receipts stay in the inbox; bulk categories are archived; anything
/// unrecognized is only labeled.
pub fn plan_for_category(category: &Category, label_prefix: &str) -> ActionPlan {
    let label_name = format!("{}/{}", label_prefix, category);

    let archive = match category {
        Category::Receipts => false,
        Category::Newsletters | Category::Promotions | Category::Social => true,
        Category::Other(_) => false,
    };

    ActionPlan {
        label_name,
        archive,
        trash: false,
    }
}

/// One-line description used in run reports
pub fn summarize_message(message: &MessageMetadata) -> String {
    format!(
        "From=\"{}\" Subject=\"{}\"",
        message.header("From").trim(),
        message.header("Subject").trim()
    )
}
