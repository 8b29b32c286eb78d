use crate::memory::types::PrivacyLevel;

const HIGH_KEYWORDS: &[&str] = &["password", "secret", "private", "confidential"];
const MEDIUM_KEYWORDS: &[&str] = &["email", "phone", "address"];
const LOW_KEYWORDS: &[&str] = &["name", "company", "public"];

/// Assigns a [`PrivacyLevel`] to turn text by keyword matching.
///
/// Tiers are checked from most to least sensitive and the first tier with any
/// case-insensitive substring hit wins; text matching nothing is `Low`.
///
/// This is a best-effort hint. Substring matching is easy to evade and produces false
/// positives ("username" matches `name`), so the level must never gate access to data.
#[derive(Debug, Clone)]
pub struct PrivacyClassifier {
    tiers: Vec<(PrivacyLevel, &'static [&'static str])>,
}

impl Default for PrivacyClassifier {
    fn default() -> Self {
        Self {
            tiers: vec![
                (PrivacyLevel::High, HIGH_KEYWORDS),
                (PrivacyLevel::Medium, MEDIUM_KEYWORDS),
                (PrivacyLevel::Low, LOW_KEYWORDS),
            ],
        }
    }
}

impl PrivacyClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, text: &str) -> PrivacyLevel {
        let lowered = text.to_lowercase();
        self.tiers
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(level, _)| *level)
            .unwrap_or(PrivacyLevel::Low)
    }
}

/// Classify with the default keyword tiers.
pub fn classify(text: &str) -> PrivacyLevel {
    PrivacyClassifier::default().classify(text)
}
