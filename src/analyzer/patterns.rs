//! Pre-compiled cue-word pattern families for the complexity analyzer.
//!
//! Compiled once via `once_cell::sync::Lazy` and shared across workers —
//! `Regex` is `Sync` and safe for concurrent `is_match`/`find_iter` calls.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("pattern family regex must compile"))
        .collect()
}

pub static SIMPLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)\b(summarize|summary|tldr|brief|short)\b",
        r"(?i)\b(format|reformat|convert)\b",
        r"(?i)\b(translate|translation)\b",
        r"(?i)\b(list|enumerate)\b",
        r"(?i)\b(define|definition|what is)\b",
        r"(?i)\b(yes|no|true|false)\b",
    ])
});

pub static COMPLEX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)\b(analyze|analysis|analytical)\b",
        r"(?i)\b(strategy|strategic|plan|planning)\b",
        r"(?i)\b(compare|comparison|contrast)\b",
        r"(?i)\b(research|investigate)\b",
        r"(?i)\b(design|architect|create)\b",
        r"(?i)\b(optimize|optimization)\b",
        r"(?i)\b(solve|solution|problem)\b",
        r"(?i)\b(reason|reasoning|logic)\b",
    ])
});

pub static CRITICAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)\b(multi-step|step-by-step|complex)\b",
        r"(?i)\b(comprehensive|detailed|thorough)\b",
        r"(?i)\b(advanced|sophisticated)\b",
        r"(?i)\b(integrate|integration|combine)\b",
        r"(?i)\b(algorithm|mathematical|calculation)\b",
        r"(?i)\b(code|programming|development)\b",
    ])
});

pub static DOMAIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)\b(api|database|server|code|programming|algorithm)\b", // technical
        r"(?i)\b(revenue|profit|market|strategy|business|roi)\b",    // business
        r"(?i)\b(research|study|analysis|theory|hypothesis)\b",      // academic
        r"(?i)\b(design|creative|art|story|narrative)\b",            // creative
    ])
});

pub const PLANNING_KEYWORDS: &[&str] = &[
    "step by step",
    "plan",
    "strategy",
    "approach",
    "method",
    "process",
    "design",
    "create",
    "develop",
    "algorithm",
    "comprehensive",
];

pub const URGENCY_KEYWORDS: &[&str] = &["urgent", "asap", "quickly", "fast", "immediate", "now"];

pub fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|re| re.is_match(text)).count()
}

pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}
