//! Pre-compiled extraction patterns for the memory extractor.
//!
//! Grounded on `original_source/app/core/memory_manager.py`'s
//! `MemoryExtractor.preference_patterns`/`fact_patterns`/`importance_keywords`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("pattern family regex must compile"))
        .collect()
}

pub static PREFERENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)i (?:prefer|like|love|enjoy|want|need) (.+)",
        r"(?i)my favorite (.+) is (.+)",
        r"(?i)i (?:don't|do not) like (.+)",
        r"(?i)i (?:always|usually|often) (.+)",
        r"(?i)i (?:never|rarely|seldom) (.+)",
        r"(?i)i am (?:a|an) (.+)",
        r"(?i)i work (?:as|in|at) (.+)",
        r"(?i)my (?:job|role|position) is (.+)",
        r"(?i)i live in (.+)",
        r"(?i)i speak (.+)",
        r"(?i)i use (.+) (?:programming language|framework|tool)",
    ])
});

pub static FACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)(?:the|this|that) (.+) is (.+)",
        r"(?i)(.+) (?:means|refers to|is defined as) (.+)",
        r"(?i)(?:remember|note) that (.+)",
        r"(?i)(?:important|key|critical): (.+)",
        r"(?i)(.+) (?:works|functions) by (.+)",
    ])
});

pub const IMPORTANCE_KEYWORDS: &[&str] = &[
    "important", "critical", "key", "essential", "vital", "crucial", "remember", "note",
    "warning", "caution", "alert", "prefer", "like", "love", "hate", "dislike", "favorite",
    "always", "never", "usually", "often", "rarely", "seldom",
];

pub const EXPLICIT_CONFIDENCE_INDICATORS: &[&str] =
    &["i prefer", "i like", "i love", "i hate", "i always", "i never"];

pub const DEFINITIVE_CONFIDENCE_INDICATORS: &[&str] = &["is", "are", "means", "refers to"];

pub const SUMMARY_IMPORTANCE_KEYWORDS: &[&str] = &[
    "prefer", "like", "need", "want", "important", "key", "remember", "problem", "solution",
    "help", "question", "answer",
];

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "can", "this", "that",
        "these", "those",
    ]
    .into_iter()
    .collect()
});
