//! Admission policy: decides whether a generated response is worth caching.
//!
//! Short answers and hedges/refusals are kept out of both tiers. The check is
//! a plain case-insensitive substring match over the whole response, so a
//! legitimate answer that happens to contain a deny phrase is rejected too.

use crate::config::AdmissionConfig;

/// Default minimum response length, in characters.
pub const DEFAULT_MIN_RESPONSE_CHARS: usize = 15;

/// Default hedge/refusal phrases (lowercase).
pub const DEFAULT_DENY_PHRASES: &[&str] = &["i cannot", "i am not sure", "as an ai", "i do not have"];

/// Why a response was refused admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Empty or shorter than the configured minimum.
    TooShort { chars: usize, min: usize },
    /// Contains a deny phrase.
    DenyPhrase(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::TooShort { chars, min } => write!(f, "too short ({chars} < {min} chars)"),
            Rejection::DenyPhrase(p) => write!(f, "contains deny phrase {p:?}"),
        }
    }
}

/// Pure admission predicate. Holds no store or provider handles.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    min_chars: usize,
    deny_phrases: Vec<String>,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

impl AdmissionPolicy {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            min_chars: config.min_response_chars,
            deny_phrases: config
                .deny_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Check a response, returning the reason when it is rejected.
    pub fn check(&self, response: &str) -> Result<(), Rejection> {
        let chars = response.chars().count();
        if chars == 0 || chars < self.min_chars {
            return Err(Rejection::TooShort {
                chars,
                min: self.min_chars,
            });
        }

        let lowered = response.to_lowercase();
        if let Some(phrase) = self.deny_phrases.iter().find(|p| lowered.contains(p.as_str())) {
            return Err(Rejection::DenyPhrase(phrase.clone()));
        }

        Ok(())
    }

    pub fn is_admissible(&self, response: &str) -> bool {
        self.check(response).is_ok()
    }
}

/// [`AdmissionPolicy::is_admissible`] with the default configuration.
pub fn is_admissible(response: &str) -> bool {
    AdmissionPolicy::default().is_admissible(response)
}
