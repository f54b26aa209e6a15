//! Priority tiers and the heuristic classifier.
//!
//! Classification order, first match wins:
//! 1. Adapter-forced override (Alertmanager "no data" batches)
//! 2. Explicit `channel` tag on the alert (`P0`/`P1`/`P2`)
//! 3. Keyword heuristics over name, description and metric namespace
//! 4. `P2`
//!
//! The heuristics are a coarse fallback for alerts without an explicit
//! channel mapping; the router ignores priority when a mapping exists.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::alert::NormalizedAlert;

/// Severity tier. `P0` is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    /// Critical, page-worthy
    P0,
    /// Elevated
    P1,
    /// Normal
    P2,
}

impl Priority {
    /// All tiers, most severe first.
    pub const ALL: [Self; 3] = [Self::P0, Self::P1, Self::P2];

    /// Display name, also used as the routing-table key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }

    /// Parse a tier tag case-insensitively. Returns `None` for anything else.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            _ => None,
        }
    }

    /// Parse an externally supplied tier, folding unrecognized values to `P2`.
    #[must_use]
    pub fn fold(tag: &str) -> Self {
        Self::from_tag(tag).unwrap_or(Self::P2)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::P0 => 2,
            Self::P1 => 1,
            Self::P2 => 0,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityReason {
    /// Adapter forced the tier
    Forced,
    /// Explicit `channel` tag on the alert
    ChannelTag,
    /// Keyword heuristic matched
    Heuristic,
    /// Nothing matched
    Default,
}

/// One heuristic rule, evaluated in table order.
enum Rule {
    /// Case-insensitive substring of name, title or description
    Keywords(&'static [&'static str], Priority),
    /// Case-sensitive substring of the metric namespace ("AWS/RDS")
    Namespace(&'static [&'static str], Priority),
}

impl Rule {
    fn matches(&self, haystack: &str, namespace: Option<&str>) -> Option<Priority> {
        match self {
            Self::Keywords(words, priority) => words
                .iter()
                .any(|w| haystack.contains(w))
                .then_some(*priority),
            Self::Namespace(needles, priority) => namespace
                .is_some_and(|ns| needles.iter().any(|n| ns.contains(n)))
                .then_some(*priority),
        }
    }
}

const RULES: &[Rule] = &[
    Rule::Keywords(&["prod", "critical", "down"], Priority::P0),
    Rule::Namespace(&["RDS", "DynamoDB", "ELB", "5xx"], Priority::P0),
    Rule::Keywords(&["cpu", "memory"], Priority::P0),
    Rule::Keywords(&["redis", "elasticache"], Priority::P1),
    Rule::Keywords(&["error", "high"], Priority::P1),
    Rule::Keywords(&["staging", "qa", "warning"], Priority::P2),
];

/// Classify an alert into a priority tier.
#[must_use]
pub fn classify(alert: &NormalizedAlert) -> Priority {
    classify_with_reason(alert).0
}

/// Classify an alert and report which rule decided.
#[must_use]
pub fn classify_with_reason(alert: &NormalizedAlert) -> (Priority, PriorityReason) {
    if let Some(forced) = alert.forced_priority {
        return (forced, PriorityReason::Forced);
    }

    if let Some(tag) = alert.channel_tag.as_deref() {
        return (Priority::fold(tag), PriorityReason::ChannelTag);
    }

    if let Some(priority) = heuristic_priority(alert) {
        return (priority, PriorityReason::Heuristic);
    }

    (Priority::P2, PriorityReason::Default)
}

fn heuristic_priority(alert: &NormalizedAlert) -> Option<Priority> {
    let haystack = [
        Some(alert.name.as_str()),
        alert.title.as_deref(),
        alert.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n")
    .to_lowercase();

    let namespace = alert.namespace();
    RULES
        .iter()
        .find_map(|rule| rule.matches(&haystack, namespace))
}
