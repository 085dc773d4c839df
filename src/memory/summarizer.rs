//! Conversation summarization and prompt-context assembly.
//!
//! Grounded on `original_source/app/core/memory_manager.py`'s
//! `MemorySummarizer.summarize_conversation` and
//! `MemoryManager.get_memory_context_for_prompt`.

use super::patterns::SUMMARY_IMPORTANCE_KEYWORDS;
use crate::context::{ConversationContext, Message, Role};

const MAX_SENTENCES_CONSIDERED: usize = 20;
const MAX_IMPORTANT_SENTENCES: usize = 5;
const IMPORTANT_SUMMARY_CAP: usize = 500;
const FALLBACK_SUMMARY_CAP: usize = 300;
const MAX_FACTS_IN_PROMPT: usize = 10;
const PREFERENCE_CONFIDENCE_THRESHOLD: f64 = 0.6;
const FACT_CONFIDENCE_THRESHOLD: f64 = 0.6;

fn truncate_with_ellipsis(s: &str, cap: usize) -> String {
    if s.len() > cap {
        let mut out: String = s.chars().take(cap).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

/// Build a short, best-effort summary of a message list, preferring
/// sentences that mention an importance keyword and falling back to the
/// opening sentences otherwise.
pub fn summarize_conversation(messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let combined: String = messages
        .iter()
        .map(|m| match m.role {
            Role::User => format!("User: {}", m.content),
            Role::Assistant => format!("Assistant: {}", m.content),
            Role::System => String::new(),
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let sentences: Vec<&str> = combined
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let important: Vec<&str> = sentences
        .iter()
        .take(MAX_SENTENCES_CONSIDERED)
        .filter(|s| s.len() > 10)
        .filter(|s| {
            let lower = s.to_lowercase();
            SUMMARY_IMPORTANCE_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .copied()
        .collect();

    if !important.is_empty() {
        let summary = important[..important.len().min(MAX_IMPORTANT_SENTENCES)].join(". ");
        truncate_with_ellipsis(&summary, IMPORTANT_SUMMARY_CAP)
    } else {
        let first: Vec<&str> = sentences.iter().take(3).copied().collect();
        let summary = first.join(". ");
        truncate_with_ellipsis(&summary, FALLBACK_SUMMARY_CAP)
    }
}

/// Render the memory-bearing parts of a context (high-confidence
/// preferences, high-confidence facts, and the running summary) for
/// injection into an upstream prompt.
pub fn memory_context_for_prompt(ctx: &ConversationContext) -> String {
    if ctx.user_preferences.is_empty() && ctx.key_facts.is_empty() {
        return String::new();
    }

    let mut parts: Vec<String> = Vec::new();

    if !ctx.user_preferences.is_empty() {
        let lines: Vec<&str> = ctx
            .user_preferences
            .values()
            .filter(|p| p.confidence > PREFERENCE_CONFIDENCE_THRESHOLD)
            .map(|p| p.content.as_str())
            .collect();
        if !lines.is_empty() {
            parts.push("User Preferences:".to_string());
            parts.extend(lines.into_iter().map(|l| format!("- {l}")));
        }
    }

    if !ctx.key_facts.is_empty() {
        let mut facts: Vec<&str> = ctx
            .key_facts
            .iter()
            .filter(|f| f.confidence > FACT_CONFIDENCE_THRESHOLD)
            .map(|f| f.content.as_str())
            .collect();
        facts.truncate(MAX_FACTS_IN_PROMPT);
        if !facts.is_empty() {
            parts.push("\nKey Information:".to_string());
            parts.extend(facts.into_iter().map(|l| format!("- {l}")));
        }
    }

    if !ctx.interaction_summary.is_empty() {
        parts.push(format!("\nConversation Summary: {}", ctx.interaction_summary));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_messages_summarize_to_empty() {
        assert_eq!(summarize_conversation(&[]), "");
    }

    #[test]
    fn picks_sentences_with_importance_keywords() {
        let messages = vec![Message::new(
            Role::User,
            "I prefer dark mode. The weather is nice today. I need this fixed urgently.",
        )];
        let summary = summarize_conversation(&messages);
        assert!(summary.to_lowercase().contains("prefer") || summary.to_lowercase().contains("need"));
    }

    #[test]
    fn falls_back_to_opening_sentences_without_keywords() {
        let messages = vec![Message::new(Role::User, "A plain statement. Another plain one.")];
        let summary = summarize_conversation(&messages);
        assert!(!summary.is_empty());
    }

    #[test]
    fn prompt_context_empty_without_memory() {
        let ctx = ConversationContext::new("c1".into());
        assert_eq!(memory_context_for_prompt(&ctx), "");
    }
}
