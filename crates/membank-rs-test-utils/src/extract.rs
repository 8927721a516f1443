//! Deterministic stand-ins for extraction and embedding.

use membank_rs_protocol::{Content, CustomTopic, ManagedTopic, MemoryTopic};
use std::collections::{BTreeMap, BTreeSet};

const STOPWORDS: &[&str] = &[
    "about", "also", "always", "been", "could", "does", "forget", "from", "have", "into", "just",
    "like", "love", "more", "most", "much", "name", "never", "please", "prefer", "really",
    "remember", "should", "some", "that", "their", "them", "there", "they", "this", "very", "want",
    "were", "what", "when", "which", "will", "with", "work", "would", "your",
];

/// Lowercase alphanumeric words.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Words that identify what a fact is about.
pub(crate) fn keywords(text: &str) -> BTreeSet<String> {
    words(text)
        .into_iter()
        .filter(|word| word.len() >= 4 && !STOPWORDS.contains(&word.as_str()))
        .collect()
}

pub(crate) fn shares_keyword(left: &str, right: &str) -> bool {
    let right = keywords(right);
    keywords(left).iter().any(|word| right.contains(word))
}

/// Candidate facts from user turns: one per sentence.
pub(crate) fn candidate_facts<'a>(contents: impl IntoIterator<Item = &'a Content>) -> Vec<String> {
    contents
        .into_iter()
        .filter(|content| content.role == "user")
        .flat_map(|content| sentences(&content.text()))
        .collect()
}

/// Split on line breaks and on `.`, `!` or `?` followed by whitespace or the
/// end of the text, so "3.12" stays in one piece.
fn sentences(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let ends = ch == '\n'
            || (matches!(ch, '.' | '!' | '?')
                && chars.peek().is_none_or(|(_, next)| next.is_whitespace()));
        if ends {
            found.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    found.push(&text[start..]);
    found
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(str::to_string)
        .collect()
}

/// Subject of a "forget ..." request, if the sentence is one.
pub(crate) fn forget_subject(sentence: &str) -> Option<&str> {
    let head = sentence.get(..6)?;
    head.eq_ignore_ascii_case("forget")
        .then(|| sentence[6..].trim())
        .filter(|subject| !subject.is_empty())
}

pub(crate) fn managed_topic(fact: &str) -> ManagedTopic {
    let lower = fact.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));
    if has(&["prefer", "like", "love", "favorite", "favourite"]) {
        ManagedTopic::UserPreferences
    } else if has(&["my name", "i am", "i'm", "i work", "i live"]) {
        ManagedTopic::UserPersonalInfo
    } else if has(&["always", "never", "remember", "don't", "do not"]) {
        ManagedTopic::ExplicitInstructions
    } else {
        ManagedTopic::KeyConversationDetails
    }
}

/// Managed topic plus every custom topic whose label or description shares a
/// keyword with the fact.
pub(crate) fn topics(fact: &str, custom: &[CustomTopic]) -> Vec<MemoryTopic> {
    let mut topics = vec![MemoryTopic::Managed(managed_topic(fact))];
    let fact_keywords = keywords(fact);
    for topic in custom {
        let topic_keywords = keywords(&format!(
            "{} {}",
            topic.label.replace('_', " "),
            topic.description
        ));
        if topic_keywords.iter().any(|word| fact_keywords.contains(word)) {
            topics.push(MemoryTopic::Custom(topic.label.clone()));
        }
    }
    topics
}

/// Euclidean distance between unit-length bag-of-words vectors. Identical
/// texts are 0 apart; texts with no word in common are sqrt(2) apart.
pub(crate) fn distance(left: &str, right: &str) -> f64 {
    let left = unit_vector(left);
    let right = unit_vector(right);
    let dims: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    dims.into_iter()
        .map(|dim| {
            let delta =
                left.get(dim).copied().unwrap_or(0.0) - right.get(dim).copied().unwrap_or(0.0);
            delta * delta
        })
        .sum::<f64>()
        .sqrt()
}

fn unit_vector(text: &str) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::new();
    for word in words(text) {
        *counts.entry(word).or_insert(0.0) += 1.0;
    }
    let norm = counts.values().map(|count| count * count).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in counts.values_mut() {
            *value /= norm;
        }
    }
    counts
}
