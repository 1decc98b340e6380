//! Branch selection and the outcome each branch hands back.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TurnMetadata;

/// One of the three mutually exclusive processing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    DeviceControl,
    ExpertConsultation,
    CasualChat,
}

impl BranchKind {
    /// Source label recorded for answers produced by this branch.
    pub fn source(&self) -> BranchSource {
        match self {
            BranchKind::DeviceControl => BranchSource::Device,
            BranchKind::ExpertConsultation => BranchSource::Expert,
            BranchKind::CasualChat => BranchSource::Chat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::DeviceControl => "device_control",
            BranchKind::ExpertConsultation => "expert_consultation",
            BranchKind::CasualChat => "casual_chat",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a raw answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSource {
    Device,
    Expert,
    Chat,
}

impl BranchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchSource::Device => "device",
            BranchSource::Expert => "expert",
            BranchSource::Chat => "chat",
        }
    }
}

impl fmt::Display for BranchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draft answer produced by exactly one branch per request.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchResult {
    pub raw_answer: String,
    pub source: BranchSource,
    pub success: bool,
    pub extra: TurnMetadata,
}

impl BranchResult {
    pub fn new(raw_answer: impl Into<String>, source: BranchSource, success: bool) -> Self {
        Self {
            raw_answer: raw_answer.into(),
            source,
            success,
            extra: TurnMetadata::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Why a branch could not produce an answer of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Turned off by configuration or capability not wired.
    Disabled,
    /// The capability answered but reported `success=false`.
    Unsuccessful,
    /// The capability call raised an error.
    Errored,
    /// The capability call exceeded its timeout.
    TimedOut,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Disabled => "disabled",
            FailureReason::Unsuccessful => "unsuccessful",
            FailureReason::Errored => "errored",
            FailureReason::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A branch failure the orchestrator resolves through the fallback table.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFailure {
    pub branch: BranchKind,
    pub reason: FailureReason,
    pub detail: String,
    /// Query the next branch in the chain should answer, when there is one.
    pub fallback_query: Option<String>,
}

impl BranchFailure {
    pub fn new(branch: BranchKind, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            branch,
            reason,
            detail: detail.into(),
            fallback_query: None,
        }
    }

    pub fn with_fallback_query(mut self, query: impl Into<String>) -> Self {
        self.fallback_query = Some(query.into());
        self
    }
}

/// Result of running one branch handler. Handlers never return `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOutcome {
    /// The capability produced an answer.
    Ok(BranchResult),
    /// A usable answer was produced without the capability (for example the
    /// fixed disabled message).
    Degraded(BranchResult),
    /// No answer; the orchestrator decides what happens next.
    Fail(BranchFailure),
}

impl BranchOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, BranchOutcome::Ok(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, BranchOutcome::Fail(_))
    }

    /// The produced result, if any.
    pub fn result(&self) -> Option<&BranchResult> {
        match self {
            BranchOutcome::Ok(result) | BranchOutcome::Degraded(result) => Some(result),
            BranchOutcome::Fail(_) => None,
        }
    }
}
