//! Header-only message classification with an ordered, first-match-wins rule chain

use crate::models::{Category, Classification, MessageMetadata};
use once_cell::sync::Lazy;
use regex::Regex;

/// Subject keywords that mark a promotional mailing
pub const PROMO_KEYWORDS: &[&str] = &[
    "deal",
    "sale",
    "offer",
    "promo",
    "discount",
    "clearance",
    "% off",
    "free shipping",
];

/// Subject keywords that mark a receipt or order update
pub const RECEIPT_KEYWORDS: &[&str] = &[
    "receipt",
    "invoice",
    "order",
    "payment",
    "shipped",
    "delivered",
    "tracking",
    "confirmation",
];

/// Sender fragments identifying social networks and platforms
pub const SOCIAL_SENDERS: &[&str] = &[
    "linkedin",
    "facebook",
    "instagram",
    "x.com",
    "twitter",
    "reddit",
    "discord",
    "github",
];

/// Builds `\b(?:k1|k2|...)\b` so each keyword must sit on word boundaries
fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).expect("keyword pattern is valid")
}

static PROMO_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_regex(PROMO_KEYWORDS));
static RECEIPT_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_regex(RECEIPT_KEYWORDS));

/// The headers every rule looks at, read once per message
struct RuleInput<'a> {
    subject: String,
    from: String,
    list_unsubscribe: &'a str,
    precedence: String,
}

impl<'a> RuleInput<'a> {
    fn from_message(message: &'a MessageMetadata) -> Self {
        Self {
            subject: message.header("Subject").to_lowercase(),
            from: message.header("From").to_lowercase(),
            list_unsubscribe: message.header("List-Unsubscribe"),
            precedence: message.header("Precedence").to_lowercase(),
        }
    }
}

struct Rule {
    matches: fn(&RuleInput<'_>) -> bool,
    category: Category,
    reason: &'static str,
}

/// Evaluated top to bottom; the first matching rule decides.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            matches: |m| !m.list_unsubscribe.is_empty(),
            category: Category::Newsletters,
            reason: "Has List-Unsubscribe header",
        },
        Rule {
            matches: |m| m.precedence.contains("bulk"),
            category: Category::Newsletters,
            reason: "Precedence: bulk",
        },
        Rule {
            matches: |m| PROMO_PATTERN.is_match(&m.subject),
            category: Category::Promotions,
            reason: "Promo keywords in subject",
        },
        Rule {
            matches: |m| RECEIPT_PATTERN.is_match(&m.subject),
            category: Category::Receipts,
            reason: "Receipt/order keywords in subject",
        },
        Rule {
            matches: |m| SOCIAL_SENDERS.iter().any(|s| m.from.contains(s)),
            category: Category::Social,
            reason: "Sender matches social/platform list",
        },
    ]
});

#[derive(Debug, Default, Clone, Copy)]
pub struct EmailClassifier;

impl EmailClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a message from its headers. `None` means unclassified.
    pub fn classify(&self, message: &MessageMetadata) -> Option<Classification> {
        classify_message(message)
    }
}

/// Runs the rule chain against one message
pub fn classify_message(message: &MessageMetadata) -> Option<Classification> {
    let input = RuleInput::from_message(message);

    RULES
        .iter()
        .find(|rule| (rule.matches)(&input))
        .map(|rule| Classification {
            category: rule.category.clone(),
            reason: rule.reason.to_string(),
        })
}
