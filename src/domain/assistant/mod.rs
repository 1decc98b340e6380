//! Assistant domain - the vocabulary of one orchestrated request.
//!
//! Pure types only: turns and the per-request session window, intent
//! labels and their routing sets, branch outcomes, enrichment data and
//! stream frames. Nothing here performs I/O.

mod branch;
mod context;
mod enrichment;
mod intent;
mod metadata;
mod stream;
mod turn;

pub use branch::{BranchFailure, BranchKind, BranchOutcome, BranchResult, BranchSource, FailureReason};
pub use context::{SessionContext, DEFAULT_HISTORY_WINDOW};
pub use enrichment::{AbsentReason, EnrichmentBundle, SearchHit, SearchOutcome, WeatherSnapshot};
pub use intent::IntentLabel;
pub use metadata::{ResponseMetadata, ResponseStatus, SearchStatus, StageTimings};
pub use stream::{StreamEvent, StreamFrame};
pub use turn::{ConversationTurn, NewTurn, TurnMetadata, TurnRole};
