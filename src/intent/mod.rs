//! Intent collaborator boundary: closed vocabulary, classification, and
//! parameter extraction.

pub mod classifier;
pub mod entities;
pub mod vocabulary;

pub use classifier::{IntentClassifier, IntentGuess, KeywordClassifier, MockIntentClassifier};
pub use vocabulary::{Intent, IntentSpec, VOCABULARY, VOCABULARY_VERSION};
