//! Intent labels - the closed routing vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BranchKind;

/// Coarse classification of what the user wants.
///
/// Used purely as a routing key and recorded on the assistant turn.
/// `Other` is the catch-all for anything the classifier cannot place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentLabel {
    /// Operate equipment: aerators, feeders, pumps, lights.
    DeviceControl,
    /// Trends and statistics over recorded sensor data.
    DataAnalysis,
    /// Dissolved oxygen, pH, ammonia, temperature readings and thresholds.
    WaterQuality,
    /// Symptoms, disease and treatment questions.
    DiseaseDiagnosis,
    /// General aquaculture know-how.
    GeneralKnowledge,
    /// Greetings, thanks, small talk and anything unclassified.
    Other,
}

impl IntentLabel {
    /// Every label, in prompt order.
    pub const ALL: [IntentLabel; 6] = [
        IntentLabel::DeviceControl,
        IntentLabel::DataAnalysis,
        IntentLabel::WaterQuality,
        IntentLabel::DiseaseDiagnosis,
        IntentLabel::GeneralKnowledge,
        IntentLabel::Other,
    ];

    /// Labels routed to the device-control branch.
    pub const DEVICE_CONTROL_SET: [IntentLabel; 1] = [IntentLabel::DeviceControl];

    /// Labels routed to the expert-consultation branch.
    pub const EXPERT_SET: [IntentLabel; 3] = [
        IntentLabel::DataAnalysis,
        IntentLabel::WaterQuality,
        IntentLabel::DiseaseDiagnosis,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::DeviceControl => "device-control",
            IntentLabel::DataAnalysis => "data-analysis",
            IntentLabel::WaterQuality => "water-quality",
            IntentLabel::DiseaseDiagnosis => "disease-diagnosis",
            IntentLabel::GeneralKnowledge => "general-knowledge",
            IntentLabel::Other => "other",
        }
    }

    /// One-line description used when prompting the classifier.
    pub fn description(&self) -> &'static str {
        match self {
            IntentLabel::DeviceControl => "operate or query equipment (aerators, feeders, pumps, lights)",
            IntentLabel::DataAnalysis => "trends, statistics or reports over recorded pond data",
            IntentLabel::WaterQuality => "dissolved oxygen, pH, ammonia, nitrite or temperature questions",
            IntentLabel::DiseaseDiagnosis => "fish or shrimp symptoms, disease and treatment",
            IntentLabel::GeneralKnowledge => "general aquaculture know-how",
            IntentLabel::Other => "greetings, thanks, small talk or anything else",
        }
    }

    /// Leniently parses a label produced by a language model.
    ///
    /// Case, surrounding quotes/punctuation and `_`/space separators are
    /// ignored. Returns `None` for anything outside the closed set.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        IntentLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
    }

    pub fn is_device_control(&self) -> bool {
        Self::DEVICE_CONTROL_SET.contains(self)
    }

    pub fn is_expert_domain(&self) -> bool {
        Self::EXPERT_SET.contains(self)
    }

    /// Branch selected for this label. Device control takes precedence.
    pub fn branch(&self) -> BranchKind {
        if self.is_device_control() {
            BranchKind::DeviceControl
        } else if self.is_expert_domain() {
            BranchKind::ExpertConsultation
        } else {
            BranchKind::CasualChat
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s).ok_or_else(|| format!("unknown intent label: {}", s))
    }
}
