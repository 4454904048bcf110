//! Keyword-based source classification.
//!
//! Matches extracted text against a static registry of known retailers.
//! Matching is a single pass over the lower-cased text; the first registry
//! entry with any matching keyword wins. Registry order is part of the
//! contract: it is fixed, documented by the `REGISTRY` constant, and stable
//! across runs.

use serde::{Deserialize, Serialize};

/// Coarse origin label for a receipt. `Unknown` is a legitimate terminal
/// classification, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLabel {
    Aldi,
    Lidl,
    Colruyt,
    Delhaize,
    Carrefour,
    Spar,
    Okay,
    Kruidvat,
    Action,
    Unknown,
}

impl SourceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aldi => "aldi",
            Self::Lidl => "lidl",
            Self::Colruyt => "colruyt",
            Self::Delhaize => "delhaize",
            Self::Carrefour => "carrefour",
            Self::Spar => "spar",
            Self::Okay => "okay",
            Self::Kruidvat => "kruidvat",
            Self::Action => "action",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aldi" => Some(Self::Aldi),
            "lidl" => Some(Self::Lidl),
            "colruyt" => Some(Self::Colruyt),
            "delhaize" => Some(Self::Delhaize),
            "carrefour" => Some(Self::Carrefour),
            "spar" => Some(Self::Spar),
            "okay" => Some(Self::Okay),
            "kruidvat" => Some(Self::Kruidvat),
            "action" => Some(Self::Action),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keyword registry, in match-priority order.
///
/// Keywords are lower-case substrings. Entries earlier in the slice win
/// ties; reordering this table changes classification results, so additions
/// go at the end unless they must shadow an existing entry.
const REGISTRY: &[(SourceLabel, &[&str])] = &[
    (SourceLabel::Aldi, &["aldi"]),
    (SourceLabel::Lidl, &["lidl"]),
    (SourceLabel::Colruyt, &["colruyt", "collect&go"]),
    (SourceLabel::Delhaize, &["delhaize"]),
    (SourceLabel::Carrefour, &["carrefour"]),
    (SourceLabel::Spar, &["spar"]),
    (SourceLabel::Okay, &["okay"]),
    (SourceLabel::Kruidvat, &["kruidvat"]),
    (SourceLabel::Action, &["action"]),
];

/// Classify extracted text into a source label.
///
/// Deterministic: no scoring, no fuzzy matching. Returns
/// [`SourceLabel::Unknown`] when nothing matches, including for empty text.
pub fn classify(text: &str) -> SourceLabel {
    if text.is_empty() {
        return SourceLabel::Unknown;
    }

    let lowered = text.to_lowercase();
    for (label, keywords) in REGISTRY {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return *label;
        }
    }

    SourceLabel::Unknown
}

/// All labels a user can pick during review, in registry order.
pub fn known_labels() -> impl Iterator<Item = SourceLabel> {
    REGISTRY
        .iter()
        .map(|(label, _)| *label)
        .chain(std::iter::once(SourceLabel::Unknown))
}
