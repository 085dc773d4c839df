//! Query Complexity Analyzer (C1)
//!
//! Deterministic, pattern-driven classification that drives routing.
//! `analyze` is a pure, total function of its inputs and is safe to call
//! concurrently from any number of workers — the pattern families are
//! compiled once (see [`patterns`]) and never mutated.

mod patterns;

use crate::context::ConversationContext;
use serde::{Deserialize, Serialize};

/// Complexity bucket assigned to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Critical,
}

/// Result of analyzing a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub complexity: Complexity,
    pub confidence: f64,
    pub reasoning_indicators: Vec<String>,
    pub estimated_tokens: u32,
    pub requires_planning: bool,
    pub domain_specific: bool,
    pub time_sensitive: bool,
}

/// Stateless classifier. Cheap to construct; typically built once and
/// shared behind an `Arc` alongside the rest of the router.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `query`, optionally adjusting for an existing conversation.
    pub fn analyze(&self, query: &str, context: Option<&ConversationContext>) -> QueryAnalysis {
        let lowered = query.to_lowercase();
        let mut indicators = Vec::new();

        let simple_matches = patterns::count_matches(&patterns::SIMPLE_PATTERNS, &lowered);
        let complex_matches = patterns::count_matches(&patterns::COMPLEX_PATTERNS, &lowered);
        let critical_matches = patterns::count_matches(&patterns::CRITICAL_PATTERNS, &lowered);

        let word_count = query.split_whitespace().count();
        let sentence_count = query.split('.').filter(|s| !s.trim().is_empty()).count();

        let domain_specific = patterns::any_match(&patterns::DOMAIN_PATTERNS, &lowered);

        let mut requires_planning = patterns::PLANNING_KEYWORDS
            .iter()
            .any(|kw| lowered.contains(kw));

        let time_sensitive = patterns::URGENCY_KEYWORDS
            .iter()
            .any(|kw| lowered.contains(kw));

        let estimated_tokens = ((word_count as f64) * 1.3).round().max(50.0) as u32;

        let complexity_score = -(simple_matches as f64)
            + 2.0 * complex_matches as f64
            + 3.0 * critical_matches as f64
            + (word_count as f64) / 10.0
            + 0.5 * sentence_count as f64;

        let (mut complexity, mut confidence) = if complexity_score <= 1.0 && !requires_planning {
            indicators.push("simple_patterns".to_string());
            indicators.push("short_query".to_string());
            (Complexity::Simple, 0.8 + simple_matches as f64 * 0.1)
        } else if complexity_score <= 4.0 && critical_matches == 0 {
            indicators.push("moderate_complexity".to_string());
            indicators.push("standard_reasoning".to_string());
            (Complexity::Moderate, 0.7 + complex_matches as f64 * 0.1)
        } else if complexity_score <= 8.0 || requires_planning {
            indicators.push("complex_reasoning".to_string());
            indicators.push("planning_required".to_string());
            if !requires_planning && (critical_matches > 0 || complex_matches > 1) {
                requires_planning = true;
            }
            (Complexity::Complex, 0.6 + critical_matches as f64 * 0.1)
        } else {
            indicators.push("critical_complexity".to_string());
            indicators.push("advanced_reasoning".to_string());
            requires_planning = true;
            (Complexity::Critical, 0.9)
        };

        if let Some(ctx) = context
            && ctx.messages.len() > 5
            && complexity == Complexity::Simple
        {
            complexity = Complexity::Moderate;
            indicators.push("long_conversation_context".to_string());
        }

        confidence = confidence.clamp(0.0, 1.0);

        QueryAnalysis {
            complexity,
            confidence,
            reasoning_indicators: indicators,
            estimated_tokens,
            requires_planning,
            domain_specific,
            time_sensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_simple_with_low_confidence() {
        let analyzer = ComplexityAnalyzer::new();
        let analysis = analyzer.analyze("", None);
        assert_eq!(analysis.complexity, Complexity::Simple);
        assert!(analysis.confidence > 0.0 && analysis.confidence <= 1.0);
    }

    #[test]
    fn simple_query_routes_simple() {
        let analyzer = ComplexityAnalyzer::new();
        let analysis = analyzer.analyze("Summarize this text briefly", None);
        assert_eq!(analysis.complexity, Complexity::Simple);
    }

    #[test]
    fn critical_query_requires_planning() {
        let analyzer = ComplexityAnalyzer::new();
        let analysis = analyzer.analyze(
            "Integrate a sophisticated, thorough analysis of this mathematical programming problem for the production system",
            None,
        );
        assert_eq!(analysis.complexity, Complexity::Critical);
        assert!(analysis.requires_planning);
    }

    #[test]
    fn long_conversation_upgrades_simple_to_moderate() {
        let analyzer = ComplexityAnalyzer::new();
        let mut ctx = ConversationContext::new("conv-1".to_string());
        for i in 0..6 {
            ctx.messages.push(crate::context::Message::new(
                crate::context::Role::User,
                format!("turn {i}"),
            ));
        }
        let analysis = analyzer.analyze("define this", Some(&ctx));
        assert_eq!(analysis.complexity, Complexity::Moderate);
        assert!(
            analysis
                .reasoning_indicators
                .contains(&"long_conversation_context".to_string())
        );
    }

    #[test]
    fn confidence_always_clamped() {
        let analyzer = ComplexityAnalyzer::new();
        let analysis = analyzer.analyze(
            "summarize summary tldr brief short format reformat convert",
            None,
        );
        assert!(analysis.confidence <= 1.0);
    }

    #[test]
    fn estimated_tokens_has_floor_of_fifty() {
        let analyzer = ComplexityAnalyzer::new();
        let analysis = analyzer.analyze("hi", None);
        assert_eq!(analysis.estimated_tokens, 50);
    }
}
