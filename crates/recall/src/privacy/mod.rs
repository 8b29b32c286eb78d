//! Keyword-based privacy classification of conversation turns

pub mod classifier;

pub use classifier::{PrivacyClassifier, classify};
