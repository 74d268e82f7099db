use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Target languages the replacement pipeline can be pointed at.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    codes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TargetsData {
    languages: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn load() -> Result<Self> {
        let raw = include_str!("targets.json");
        let parsed: TargetsData =
            serde_json::from_str(raw).with_context(|| "failed to parse target language data")?;
        Ok(LanguageRegistry {
            codes: parsed.languages,
        })
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.codes.contains_key(&normalize_code(code))
    }

    pub fn language_name(&self, code: &str) -> Option<String> {
        self.codes.get(&normalize_code(code)).cloned()
    }

    /// All supported codes, sorted for stable display.
    pub fn all(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .codes
            .iter()
            .map(|(code, name)| (code.clone(), name.clone()))
            .collect();
        entries.sort();
        entries
    }
}

/// Maps a target language code to the espeak voice used for pronunciation.
pub fn espeak_voice(code: &str) -> &'static str {
    match normalize_code(code).as_str() {
        "ar" => "ar",
        "de" => "de",
        "es" => "es",
        "fr" => "fr",
        "hi" => "hi",
        "it" => "it",
        "ja" => "ja",
        "ko" => "ko",
        "nl" => "nl",
        "pl" => "pl",
        "pt" => "pt",
        "ru" => "ru",
        "sv" => "sv",
        "tr" => "tr",
        "zh" => "zh",
        _ => "en",
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_spanish() {
        let registry = LanguageRegistry::load().expect("registry");
        assert!(registry.is_supported("es"));
        assert!(registry.is_supported(" ES "));
        assert_eq!(registry.language_name("es").as_deref(), Some("Spanish"));
        assert!(!registry.is_supported("tlh"));
    }

    #[test]
    fn all_is_sorted_by_code() {
        let registry = LanguageRegistry::load().expect("registry");
        let all = registry.all();
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
        assert!(!all.is_empty());
    }

    #[test]
    fn espeak_voice_falls_back_to_english() {
        assert_eq!(espeak_voice("es"), "es");
        assert_eq!(espeak_voice("unknown"), "en");
    }
}
