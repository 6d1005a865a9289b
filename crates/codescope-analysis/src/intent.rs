use codescope_core::{Intent, TaskPattern};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

/// Verb table scanned in declared order; the first description word found
/// here decides the task pattern.
static ACTION_VERBS: &[(&str, TaskPattern)] = &[
    ("add", TaskPattern::AddFeature),
    ("implement", TaskPattern::AddFeature),
    ("create", TaskPattern::AddFeature),
    ("build", TaskPattern::AddFeature),
    ("introduce", TaskPattern::AddFeature),
    ("fix", TaskPattern::FixBug),
    ("repair", TaskPattern::FixBug),
    ("resolve", TaskPattern::FixBug),
    ("debug", TaskPattern::FixBug),
    ("patch", TaskPattern::FixBug),
    ("modify", TaskPattern::Modify),
    ("change", TaskPattern::Modify),
    ("update", TaskPattern::Modify),
    ("edit", TaskPattern::Modify),
    ("adjust", TaskPattern::Modify),
    ("refactor", TaskPattern::Refactor),
    ("restructure", TaskPattern::Refactor),
    ("reorganize", TaskPattern::Refactor),
    ("simplify", TaskPattern::Refactor),
    ("optimize", TaskPattern::Optimize),
    ("improve", TaskPattern::Optimize),
    ("speed", TaskPattern::Optimize),
    ("accelerate", TaskPattern::Optimize),
    ("remove", TaskPattern::Remove),
    ("delete", TaskPattern::Remove),
    ("drop", TaskPattern::Remove),
    ("deprecate", TaskPattern::Remove),
    ("test", TaskPattern::Test),
    ("verify", TaskPattern::Test),
    ("validate", TaskPattern::Test),
    ("cover", TaskPattern::Test),
    ("document", TaskPattern::Document),
    ("describe", TaskPattern::Document),
    ("explain", TaskPattern::Document),
    ("annotate", TaskPattern::Document),
];

/// English function words dropped from keyword extraction.
static STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "his", "has", "have", "this", "that", "these", "those", "with", "from", "they",
    "will", "would", "there", "their", "what", "about", "which", "when", "then", "them", "some",
    "into", "more", "other", "than", "its", "also", "after", "before", "should", "could", "being",
    "been", "were", "does", "did", "each", "how", "where", "why", "any", "both", "because", "such",
    "only", "own", "same", "very", "just", "now", "too", "use", "using",
];

/// Identifier mention patterns, matched in declared order on the original
/// case-preserving text.
static CAMEL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+\b").unwrap());
static SNAKE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").unwrap());
static LOWER_CAMEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]+(?:[A-Z][a-z0-9]+)+\b").unwrap());

const TRIM_PUNCT: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '/', '<', '>',
];

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c| TRIM_PUNCT.contains(&c))
}

fn is_action_word(word: &str) -> bool {
    ACTION_VERBS.iter().any(|(verb, _)| *verb == word)
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// A token counts as identifier-like when the original casing mixes upper
/// and lower case, or it carries underscores. All-caps acronyms read as
/// plain vocabulary and stay generic.
fn is_identifier_like(original: &str) -> bool {
    if original.contains('_') {
        return true;
    }
    let has_upper = original.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = original.chars().any(|c| c.is_ascii_lowercase());
    has_upper && has_lower
}

/// Classify a free-text task description. Pure: identical input always
/// produces an identical `Intent`.
pub fn extract_intent(description: &str) -> Intent {
    let mut intent = Intent::default();

    // Action detection on lowercased words, first table hit wins.
    'outer: for word in description.to_lowercase().split_whitespace() {
        let word = strip_punct(word);
        for (verb, pattern) in ACTION_VERBS {
            if word == *verb {
                intent.action_verb = verb.to_string();
                intent.pattern = *pattern;
                break 'outer;
            }
        }
    }

    // Entity mentions from the case-preserving text, duplicates dropped
    // keeping the first occurrence.
    let mut seen_mentions = FxHashSet::default();
    for regex in [&*CAMEL_CASE, &*SNAKE_CASE, &*LOWER_CAMEL] {
        for m in regex.find_iter(description) {
            let mention = m.as_str().to_string();
            if seen_mentions.insert(mention.clone()) {
                intent.entity_mentions.push(mention);
            }
        }
    }

    // Keyword split over the original tokens so casing evidence survives.
    let mut seen_generic = FxHashSet::default();
    let mut seen_identifier = FxHashSet::default();
    for raw in description.split_whitespace() {
        let token = strip_punct(raw);
        let lowered = token.to_lowercase();
        if lowered.len() < 3 || is_stop_word(&lowered) || is_action_word(&lowered) {
            continue;
        }
        if is_identifier_like(token) {
            if seen_identifier.insert(lowered.clone()) {
                intent.identifier_keywords.push(lowered);
            }
        } else if seen_generic.insert(lowered.clone()) {
            intent.keywords.push(lowered);
        }
    }

    intent
}
