//! Deterministic quality scoring for generated translations.
//!
//! Every translated entry gets a confidence in `[0, 1]` and a review flag.
//! The heuristics are sketches tuned for Latin-script output, so the rule set
//! is selected per target language through [`ScoringProfile`].

use crate::model::{TranslationDraft, TranslationResult};
use regex::{Regex, RegexSet};
use std::collections::HashSet;
use std::sync::OnceLock;

const BASE_CONFIDENCE: f64 = 0.8;
const KEY_ECHO_CONFIDENCE: f64 = 0.1;

/// Keys whose copy is legal text, app branding or onboarding and always gets a human pass.
pub const DEFAULT_CRITICAL_KEYS: &[&str] = &[
    "app_title",
    "app_subtitle",
    "welcome_title",
    "welcome_subtitle",
    "welcome_message",
    "diary_name_title",
    "diary_name_placeholder",
    "terms_of_service",
    "privacy_policy",
    "legal_notice",
];

static STOPWORD_REGEX: OnceLock<Regex> = OnceLock::new();
static LETTER_RUN_REGEX: OnceLock<Regex> = OnceLock::new();
static REVIEW_PATTERNS: OnceLock<RegexSet> = OnceLock::new();

fn stopword_regex() -> &'static Regex {
    STOPWORD_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(the|and|or|but|in|on|at|to|for|of|with|by)\b").unwrap()
    })
}

fn letter_run_regex() -> &'static Regex {
    LETTER_RUN_REGEX.get_or_init(|| Regex::new(r"(?i)[a-z]{10,}").unwrap())
}

fn review_patterns() -> &'static RegexSet {
    REVIEW_PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"\?{2,}",
            r"\[.*\]",
            r"(?i)translation",
            r"undefined",
            r"missing",
            r"(?i)[a-z]{15,}",
        ])
        .unwrap()
    })
}

/// Writing system family of a target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    Latin,
    Cyrillic,
    /// Scripts scored without the length and spacing rules (Chinese, Japanese, Korean)
    Logographic,
    Other,
}

impl ScriptClass {
    /// Classify a language code such as `fr`, `zh-CN` or `pt_BR`.
    pub fn for_language(code: &str) -> Self {
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match primary.as_str() {
            "zh" | "ja" | "ko" => Self::Logographic,
            "ru" | "uk" | "be" | "bg" | "sr" | "mk" | "kk" | "ky" | "mn" | "tg" => Self::Cyrillic,
            "en" | "fr" | "de" | "es" | "it" | "pt" | "nl" | "pl" | "cs" | "sk" | "sl" | "hr"
            | "ro" | "hu" | "sv" | "da" | "no" | "nb" | "fi" | "et" | "lv" | "lt" | "tr"
            | "id" | "ms" | "vi" | "ca" | "ga" | "is" | "sq" => Self::Latin,
            _ => Self::Other,
        }
    }
}

/// Which heuristics apply for one target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringProfile {
    pub script: ScriptClass,
    /// Penalize texts shorter than 3 characters
    pub short_text_penalty: bool,
    /// Reward multi-word texts containing a space
    pub spacing_bonus: bool,
}

impl ScoringProfile {
    pub fn for_language(code: &str) -> Self {
        let script = ScriptClass::for_language(code);
        let spaced = script != ScriptClass::Logographic;

        Self {
            script,
            short_text_penalty: spaced,
            spacing_bonus: spaced,
        }
    }
}

impl Default for ScoringProfile {
    /// The full rule set, as applied to a Latin-script target.
    fn default() -> Self {
        Self {
            script: ScriptClass::Latin,
            short_text_penalty: true,
            spacing_bonus: true,
        }
    }
}

/// Confidence and review flag for one translated entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub confidence: f64,
    pub needs_review: bool,
}

/// Scores translations with a fixed profile and critical-key allowlist.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    profile: ScoringProfile,
    critical_keys: HashSet<String>,
}

impl QualityScorer {
    pub fn new(profile: ScoringProfile, critical_keys: &[String]) -> Self {
        Self {
            profile,
            critical_keys: critical_keys.iter().cloned().collect(),
        }
    }

    /// Scorer for `language` using the built-in critical keys.
    pub fn for_language(language: &str) -> Self {
        let keys: Vec<String> = DEFAULT_CRITICAL_KEYS.iter().map(|k| k.to_string()).collect();
        Self::new(ScoringProfile::for_language(language), &keys)
    }

    pub fn profile(&self) -> ScoringProfile {
        self.profile
    }

    pub fn score(&self, key: &str, translated_text: &str) -> Score {
        Score {
            confidence: self.confidence(key, translated_text),
            needs_review: self.needs_review(key, translated_text),
        }
    }

    pub fn score_draft(&self, draft: TranslationDraft) -> TranslationResult {
        let score = self.score(&draft.key, &draft.translated_text);
        TranslationResult {
            key: draft.key,
            original_text: draft.original_text,
            translated_text: draft.translated_text,
            confidence: score.confidence,
            needs_review: score.needs_review,
        }
    }

    pub fn confidence(&self, key: &str, text: &str) -> f64 {
        if is_blank(text) {
            return 0.0;
        }
        if text == key {
            return KEY_ECHO_CONFIDENCE;
        }

        let len = text.chars().count();
        let mut confidence = BASE_CONFIDENCE;

        if self.profile.short_text_penalty && len < 3 {
            confidence -= 0.3;
        }
        if len > 100 {
            confidence -= 0.1;
        }
        if text.contains("??") {
            confidence -= 0.4;
        }
        if text.contains("[missing") || text.contains("[undefined") {
            confidence -= 0.5;
        }
        if len > 10 && stopword_regex().is_match(text) {
            confidence -= 0.2;
        }
        if self.profile.spacing_bonus && len > 5 && text.contains(' ') {
            confidence += 0.1;
        }
        if !letter_run_regex().is_match(text) {
            confidence += 0.1;
        }

        confidence.clamp(0.0, 1.0)
    }

    pub fn needs_review(&self, key: &str, text: &str) -> bool {
        self.critical_keys.contains(key) || review_patterns().is_match(text)
    }
}

/// Empty, or nothing but question marks and whitespace.
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == '?' || c.is_whitespace())
}
