//! Response metadata recorded on every assistant turn.

use serde::{Deserialize, Serialize};

use super::{
    AbsentReason, BranchKind, BranchSource, FailureReason, IntentLabel, SearchOutcome,
    TurnMetadata,
};

/// Overall result reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
        }
    }
}

/// How the background search resolved for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchStatus {
    Found { hits: usize },
    Absent { reason: AbsentReason },
    #[default]
    NotJoined,
}

impl From<&SearchOutcome> for SearchStatus {
    fn from(outcome: &SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Found(hits) => SearchStatus::Found { hits: hits.len() },
            SearchOutcome::Absent(reason) => SearchStatus::Absent { reason: *reason },
        }
    }
}

/// Wall-clock milliseconds spent in each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub classify_ms: u64,
    pub weather_ms: u64,
    pub branch_ms: u64,
    pub search_wait_ms: u64,
    pub integrate_ms: u64,
    pub total_ms: u64,
}

/// Typed view of what happened while answering one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<BranchSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchKind>,
    pub branch_success: bool,
    pub expert_consulted: bool,
    pub chat_agent_used: bool,
    pub device_agent_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<BranchKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FailureReason>,
    pub query_rewritten: bool,
    pub weather_included: bool,
    pub search: SearchStatus,
    pub streamed: bool,
    pub interrupted: bool,
    pub truncated: bool,
    pub integration_failed: bool,
    pub timings: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Answer text that was ready when the client went away, never shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undelivered_draft: Option<String>,
    #[serde(skip_serializing_if = "TurnMetadata::is_empty")]
    pub branch_extra: TurnMetadata,
}

impl ResponseMetadata {
    /// Flattens into the free-form map stored with the turn.
    pub fn to_turn_metadata(&self) -> TurnMetadata {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => TurnMetadata::new(),
        }
    }

    /// Reads metadata back from a stored turn, tolerating missing keys.
    pub fn from_turn_metadata(map: &TurnMetadata) -> Option<Self> {
        serde_json::from_value(serde_json::Value::Object(map.clone())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_status_tracks_outcome() {
        let found = SearchOutcome::Found(vec![]);
        assert_eq!(SearchStatus::from(&found), SearchStatus::Found { hits: 0 });

        let absent = SearchOutcome::Absent(AbsentReason::TimedOut);
        assert_eq!(
            SearchStatus::from(&absent),
            SearchStatus::Absent { reason: AbsentReason::TimedOut }
        );
    }

    #[test]
    fn turn_metadata_uses_flat_keys() {
        let metadata = ResponseMetadata {
            source: Some(BranchSource::Chat),
            intent: Some(IntentLabel::Other),
            chat_agent_used: true,
            search: SearchStatus::Absent { reason: AbsentReason::Disabled },
            ..Default::default()
        };

        let map = metadata.to_turn_metadata();
        assert_eq!(map["source"], "chat");
        assert_eq!(map["intent"], "other");
        assert_eq!(map["chat_agent_used"], true);
        assert_eq!(map["search"]["state"], "absent");
        assert_eq!(map["search"]["reason"], "disabled");
        assert!(!map.contains_key("error"));
        assert!(!map.contains_key("undelivered_draft"));
        assert!(!map.contains_key("branch_extra"));
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let metadata = ResponseMetadata {
            source: Some(BranchSource::Expert),
            expert_consulted: true,
            timings: StageTimings { total_ms: 42, ..Default::default() },
            ..Default::default()
        };

        let restored = ResponseMetadata::from_turn_metadata(&metadata.to_turn_metadata());
        assert_eq!(restored, Some(metadata));
    }

    #[test]
    fn tolerates_sparse_maps() {
        let mut map = TurnMetadata::new();
        map.insert("streamed".into(), true.into());
        let restored = ResponseMetadata::from_turn_metadata(&map).unwrap();
        assert!(restored.streamed);
        assert_eq!(restored.search, SearchStatus::NotJoined);
    }
}
