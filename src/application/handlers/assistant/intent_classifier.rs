//! IntentClassifier - maps a message to one routing label.
//!
//! Never fails: any generation problem resolves to `IntentLabel::Other`
//! with the error kept in the returned stats.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::assistant::{ConversationTurn, IntentLabel};
use crate::ports::{
    purpose, GenerationProvider, GenerationRequest, GenerationSettings, MessageRole, RequestMetadata,
};

use super::prompts::classification_prompt;
use super::support::{complete_within, elapsed_ms, transcript};

/// Recent turns shown to the classifier for follow-up questions.
const CLASSIFIER_HISTORY_TURNS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationStats {
    pub elapsed_ms: u64,
    /// What the model actually returned.
    pub raw_label: Option<String>,
    /// True when the raw label was outside the closed set.
    pub coerced: bool,
    pub error: Option<String>,
}

pub struct IntentClassifier {
    provider: Arc<dyn GenerationProvider>,
    settings: GenerationSettings,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: &GenerationSettings, timeout: Duration) -> Self {
        Self {
            provider,
            settings: GenerationSettings {
                temperature: 0.0,
                max_tokens: 16,
                enable_search: false,
                ..settings.clone()
            },
            timeout,
        }
    }

    pub async fn classify(&self, text: &str, history: &[ConversationTurn]) -> (IntentLabel, ClassificationStats) {
        let started = Instant::now();
        let mut stats = ClassificationStats::default();

        let recent = &history[history.len().saturating_sub(CLASSIFIER_HISTORY_TURNS)..];
        let prompt = if recent.is_empty() {
            format!("Message: {}", text)
        } else {
            format!("Conversation so far:\n{}\n\nMessage: {}", transcript(recent), text)
        };

        let request = GenerationRequest::new(self.settings.clone(), RequestMetadata::new(purpose::CLASSIFY))
            .with_system_prompt(classification_prompt())
            .with_message(MessageRole::User, prompt);

        let label = match complete_within(self.provider.as_ref(), request, self.timeout).await {
            Ok(raw) => {
                let parsed = IntentLabel::parse_label(&raw);
                if parsed.is_none() {
                    tracing::warn!(raw_label = %raw.trim(), "Classifier returned an unknown label, using other");
                    stats.coerced = true;
                }
                stats.raw_label = Some(raw.trim().to_string());
                parsed.unwrap_or(IntentLabel::Other)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Intent classification failed, using other");
                stats.error = Some(err.to_string());
                IntentLabel::Other
            }
        };

        stats.elapsed_ms = elapsed_ms(started);
        (label, stats)
    }
}
