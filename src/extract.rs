use std::collections::HashSet;

/// Minimum token length for a word to be worth translating.
const MIN_WORD_LEN: usize = 4;

/// Common English words that are never useful replacement targets.
/// Anything shorter than MIN_WORD_LEN is filtered before this list applies.
const STOP_WORDS: &[&str] = &[
    "that", "with", "have", "this", "will", "your", "from", "they", "know",
    "want", "been", "good", "much", "some", "time", "very", "when", "come",
    "here", "just", "like", "long", "make", "many", "more", "most", "only",
    "over", "such", "take", "than", "them", "then", "there", "these",
    "thing", "think", "well", "were", "what", "where", "which", "while",
    "their", "those", "would", "could", "should", "about", "after", "before",
    "other", "into", "also", "being", "because", "does", "doing",
    "down", "each", "even", "ever", "every", "still", "through", "under",
    "until", "upon", "again", "against", "between", "both", "cannot", "same",
    "itself", "himself", "herself", "themselves", "yourself",
];

/// Derives the unique candidate words from raw page text.
///
/// Tokens are lowercased, anything that is not a letter is treated as a
/// separator, and tokens shorter than four characters or on the stop-word
/// list are dropped. First-seen order is preserved; duplicates collapse.
pub fn candidate_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let lowered = text.to_lowercase();
    for token in lowered.split(|ch: char| !ch.is_alphabetic()) {
        if token.chars().count() < MIN_WORD_LEN {
            continue;
        }
        if STOP_WORDS.contains(&token) {
            continue;
        }
        if seen.insert(token.to_string()) {
            candidates.push(token.to_string());
        }
    }

    candidates
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}
