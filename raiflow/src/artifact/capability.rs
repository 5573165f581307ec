//! Capability vocabulary and predicates over capability sets.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A capability an artifact exposes.
///
/// The fixed vocabulary covers inference operations and dataset structure.
/// `Custom` carries caller- or object-declared tags such as `has_raw_pii`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Capability {
    /// Produces class or value predictions.
    Predict,
    /// Produces class probabilities.
    PredictProba,
    /// Produces embeddings.
    Embed,
    /// Generates text or other content.
    Generate,
    /// Has named feature columns.
    Features,
    /// Has a label (ground truth) column.
    Labels,
    /// Has one or more sensitive attribute columns.
    SensitiveFeatures,
    /// Tabular modality.
    Tabular,
    /// Text modality.
    Text,
    /// A free-form tag.
    Custom(String),
}

impl Capability {
    /// All built-in (non-custom) capabilities.
    pub const BUILTIN: [Self; 9] = [
        Self::Predict,
        Self::PredictProba,
        Self::Embed,
        Self::Generate,
        Self::Features,
        Self::Labels,
        Self::SensitiveFeatures,
        Self::Tabular,
        Self::Text,
    ];

    /// Creates a custom capability tag, validating its spelling.
    pub fn custom(tag: impl Into<String>) -> Result<Self, InvalidCapability> {
        let tag = tag.into();
        if is_valid_tag(&tag) {
            Ok(Self::Custom(tag))
        } else {
            Err(InvalidCapability(tag))
        }
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Predict => "predict",
            Self::PredictProba => "predict_proba",
            Self::Embed => "embed",
            Self::Generate => "generate",
            Self::Features => "features",
            Self::Labels => "labels",
            Self::SensitiveFeatures => "sensitive_features",
            Self::Tabular => "tabular",
            Self::Text => "text",
            Self::Custom(tag) => tag,
        }
    }

    /// Returns true for capabilities that only make sense on a model.
    #[must_use]
    pub fn is_inference(&self) -> bool {
        matches!(
            self,
            Self::Predict | Self::PredictProba | Self::Embed | Self::Generate
        )
    }

    /// Maps an exposed operation name to its capability.
    #[must_use]
    pub fn from_operation(operation: &str) -> Option<Self> {
        match operation {
            "predict" => Some(Self::Predict),
            "predict_proba" => Some(Self::PredictProba),
            "embed" => Some(Self::Embed),
            "generate" => Some(Self::Generate),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability tag that does not match `^[a-z][a-z0-9_]*$`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid capability tag '{0}'")]
pub struct InvalidCapability(pub String);

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").ok())
        .as_ref()
}

fn is_valid_tag(tag: &str) -> bool {
    tag.len() <= 64 && tag_pattern().is_some_and(|p| p.is_match(tag))
}

impl FromStr for Capability {
    type Err = InvalidCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::BUILTIN
            .iter()
            .find(|c| c.as_str() == s)
            .cloned()
            .map_or_else(|| Self::custom(s), Ok)
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.as_str().to_string()
    }
}

impl TryFrom<String> for Capability {
    type Error = InvalidCapability;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An ordered set of capabilities.
pub type CapabilitySet = BTreeSet<Capability>;

/// A boolean predicate over a capability set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPredicate {
    /// Always satisfied.
    Always,
    /// The capability is present.
    Has(Capability),
    /// Every sub-predicate holds.
    All(Vec<CapabilityPredicate>),
    /// At least one sub-predicate holds.
    Any(Vec<CapabilityPredicate>),
    /// The sub-predicate does not hold.
    Not(Box<CapabilityPredicate>),
}

impl CapabilityPredicate {
    /// Requires a single capability.
    #[must_use]
    pub fn has(capability: Capability) -> Self {
        Self::Has(capability)
    }

    /// Requires every listed capability.
    #[must_use]
    pub fn all_of(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self::All(capabilities.into_iter().map(Self::Has).collect())
    }

    /// Requires at least one listed capability.
    #[must_use]
    pub fn any_of(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self::Any(capabilities.into_iter().map(Self::Has).collect())
    }

    /// Negates a predicate.
    #[must_use]
    pub fn negate(predicate: Self) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Combines with another predicate under conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::Always => other,
            Self::All(mut items) => {
                items.push(other);
                Self::All(items)
            }
            first => Self::All(vec![first, other]),
        }
    }

    /// Evaluates the predicate against a capability set.
    #[must_use]
    pub fn evaluate(&self, capabilities: &CapabilitySet) -> bool {
        match self {
            Self::Always => true,
            Self::Has(c) => capabilities.contains(c),
            Self::All(items) => items.iter().all(|p| p.evaluate(capabilities)),
            Self::Any(items) => items.iter().any(|p| p.evaluate(capabilities)),
            Self::Not(inner) => !inner.evaluate(capabilities),
        }
    }

    /// Human-readable form, e.g. `labels & (predict | predict_proba)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Always => "*".to_string(),
            Self::Has(c) => c.to_string(),
            Self::All(items) => join_described(items, " & "),
            Self::Any(items) => join_described(items, " | "),
            Self::Not(inner) => format!("!{}", inner.describe()),
        }
    }
}

impl Default for CapabilityPredicate {
    fn default() -> Self {
        Self::Always
    }
}

fn join_described(items: &[CapabilityPredicate], separator: &str) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|p| match p {
            CapabilityPredicate::All(_) | CapabilityPredicate::Any(_) if items.len() > 1 => {
                format!("({})", p.describe())
            }
            _ => p.describe(),
        })
        .collect();
    parts.join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn caps(items: &[Capability]) -> CapabilitySet {
        items.iter().cloned().collect()
    }

    #[test]
    fn test_parse_builtin_and_custom() {
        assert_eq!("predict_proba".parse::<Capability>(), Ok(Capability::PredictProba));
        assert_eq!(
            "has_raw_pii".parse::<Capability>(),
            Ok(Capability::Custom("has_raw_pii".to_string()))
        );
        assert!("Has Raw PII".parse::<Capability>().is_err());
        assert!("".parse::<Capability>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Capability::SensitiveFeatures).unwrap();
        assert_eq!(json, "\"sensitive_features\"");

        let back: Capability = serde_json::from_str("\"has_raw_pii\"").unwrap();
        assert_eq!(back, Capability::Custom("has_raw_pii".to_string()));

        assert!(serde_json::from_str::<Capability>("\"BAD-TAG\"").is_err());
    }

    #[test]
    fn test_from_operation() {
        assert_eq!(Capability::from_operation("predict"), Some(Capability::Predict));
        assert_eq!(Capability::from_operation("fit"), None);
        assert!(Capability::Embed.is_inference());
        assert!(!Capability::Labels.is_inference());
    }

    #[test]
    fn test_predicate_evaluation() {
        let set = caps(&[Capability::Labels, Capability::PredictProba]);

        let pred = CapabilityPredicate::has(Capability::Labels)
            .and(CapabilityPredicate::any_of([Capability::Predict, Capability::PredictProba]));
        assert!(pred.evaluate(&set));

        let missing = CapabilityPredicate::all_of([Capability::Labels, Capability::SensitiveFeatures]);
        assert!(!missing.evaluate(&set));

        let not_text = CapabilityPredicate::negate(CapabilityPredicate::has(Capability::Text));
        assert!(not_text.evaluate(&set));
        assert!(CapabilityPredicate::Always.evaluate(&CapabilitySet::new()));
    }

    #[test]
    fn test_predicate_describe() {
        let pred = CapabilityPredicate::has(Capability::Labels)
            .and(CapabilityPredicate::any_of([Capability::Predict, Capability::PredictProba]));
        assert_eq!(pred.describe(), "labels & (predict | predict_proba)");
    }

    #[test]
    fn test_predicate_serde_roundtrip() {
        let pred = CapabilityPredicate::all_of([Capability::Labels, Capability::SensitiveFeatures]);
        let json = serde_json::to_value(&pred).unwrap();
        assert_eq!(json, serde_json::json!({"all": [{"has": "labels"}, {"has": "sensitive_features"}]}));
        let back: CapabilityPredicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, pred);
    }
}
