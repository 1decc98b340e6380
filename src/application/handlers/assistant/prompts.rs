//! Prompt templates and fixed user-facing messages.

use crate::domain::assistant::{BranchSource, IntentLabel};

/// Shown when device control is switched off.
pub const DEVICE_DISABLED_MESSAGE: &str =
    "Device control is currently disabled, so I can't operate equipment right now. \
     Please use the pond control panel or ask an operator.";

/// Used when the device service succeeds without a readable message.
pub const DEVICE_DEFAULT_ACK: &str = "The device command was accepted.";

/// Persisted when the pipeline itself fails.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while handling your request. Please try again in a moment.";

pub const CHAT_PERSONA: &str =
    "You are a friendly, knowledgeable aquaculture assistant for fish and shrimp farmers. \
     Answer conversationally and concisely. If a question needs live pond data you do not \
     have, say so and suggest what to check.";

pub const REWRITE_SYSTEM: &str =
    "Rewrite the user's latest question into a single self-contained query for an \
     aquaculture data expert. Resolve pronouns and references using the conversation, \
     keep every concrete detail (pond numbers, dates, parameters) and add nothing else. \
     Reply with the rewritten query only.";

pub const WEATHER_RELEVANCE_SYSTEM: &str =
    "Decide whether current weather conditions would materially improve the answer to the \
     user's message (for example feeding, aeration, oxygen or temperature decisions, or a \
     direct weather question). Reply with exactly yes or no.";

pub const INTEGRATION_SYSTEM: &str =
    "You are the final editor of an aquaculture assistant. Compose the reply the farmer will \
     read from the draft answer and any context provided.";

/// Classifier system prompt listing the closed label set.
pub fn classification_prompt() -> String {
    let labels: Vec<String> = IntentLabel::ALL
        .iter()
        .map(|label| format!("- {}: {}", label.as_str(), label.description()))
        .collect();

    format!(
        "Classify the user's latest message for an aquaculture assistant.\n\
         Choose exactly one label:\n{}\n\
         Reply with the label only.",
        labels.join("\n")
    )
}

/// Error string surfaced when a device command fails.
pub fn device_error_message(detail: &str) -> String {
    format!("The device command could not be completed: {}", detail)
}

/// Persisted when final composition fails outright.
pub fn integration_apology(error: &str) -> String {
    format!(
        "Sorry, I couldn't put together a full answer just now ({}). Please try again shortly.",
        error
    )
}

/// Everything the integration prompt embeds.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationPrompt<'a> {
    pub user_query: &'a str,
    pub raw_answer: &'a str,
    pub source: BranchSource,
    pub weather: Option<&'a str>,
    pub search: Option<&'a str>,
    pub auxiliary: Option<&'a str>,
}

impl IntegrationPrompt<'_> {
    pub fn render(&self) -> String {
        let mut sections = vec![
            format!("User question:\n{}", self.user_query),
            format!("Draft answer (source: {}):\n{}", source_description(self.source), self.raw_answer),
        ];

        if let Some(weather) = self.weather {
            sections.push(format!("Current weather:\n{}", weather));
        }
        if let Some(search) = self.search {
            sections.push(format!("Related search results:\n{}", search));
        }
        if let Some(auxiliary) = self.auxiliary {
            sections.push(format!("Farm context:\n{}", auxiliary));
        }

        sections.push(
            "Instructions:\n\
             - Keep a professional, practical tone.\n\
             - Preserve every fact and number from the draft answer; do not invent data.\n\
             - Use the weather and search context only where it is relevant.\n\
             - If the draft reports a failure, say so plainly.\n\
             - End with one or two short follow-up suggestions."
                .to_string(),
        );

        sections.join("\n\n")
    }
}

fn source_description(source: BranchSource) -> &'static str {
    match source {
        BranchSource::Device => "device control system",
        BranchSource::Expert => "aquaculture data expert",
        BranchSource::Chat => "general assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prompt_lists_every_label() {
        let prompt = classification_prompt();
        for label in IntentLabel::ALL {
            assert!(prompt.contains(label.as_str()));
        }
    }

    #[test]
    fn integration_prompt_omits_absent_sections() {
        let prompt = IntegrationPrompt {
            user_query: "Turn on the aerator",
            raw_answer: "Aerator activated",
            source: BranchSource::Device,
            weather: None,
            search: None,
            auxiliary: None,
        }
        .render();

        assert!(prompt.contains("Turn on the aerator"));
        assert!(prompt.contains("Aerator activated"));
        assert!(prompt.contains("device control system"));
        assert!(!prompt.contains("Current weather"));
        assert!(!prompt.contains("search results"));
    }

    #[test]
    fn integration_prompt_embeds_enrichment() {
        let prompt = IntegrationPrompt {
            user_query: "Should I feed today?",
            raw_answer: "Feed lightly.",
            source: BranchSource::Chat,
            weather: Some("Shanghai: rain"),
            search: Some("1. Feeding in rain - reduce rations"),
            auxiliary: Some("pond: 3"),
        }
        .render();

        assert!(prompt.contains("Current weather:\nShanghai: rain"));
        assert!(prompt.contains("reduce rations"));
        assert!(prompt.contains("Farm context:\npond: 3"));
    }

    #[test]
    fn apology_embeds_the_error() {
        assert!(integration_apology("provider unavailable").contains("provider unavailable"));
    }
}
