//! Intent classification over the closed vocabulary.

use std::time::Duration;

use crate::error::{Result, VocmdError};
use crate::intent::vocabulary::{Intent, VOCABULARY};

/// Best-match classification: the intent, the collaborator's confidence, and
/// the phrase that won (for logging).
#[derive(Debug, Clone, PartialEq)]
pub struct IntentGuess {
    pub intent: Intent,
    pub confidence: f32,
    pub matched_phrase: String,
}

/// Trait for the intent collaborator.
///
/// `Ok(None)` means nothing in the vocabulary matched at all, which the
/// intent stage maps to an unresolved command.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, transcript: &str) -> Result<Option<IntentGuess>>;

    fn name(&self) -> &str;
}

/// Phrase-overlap scorer over the closed vocabulary.
///
/// Deterministic and dependency-free: scores each intent by its best trigger
/// phrase. A contiguous phrase hit scores high (longer phrases higher, they
/// are less ambiguous); partial token overlap scores below the default
/// confidence threshold so it surfaces as unresolved rather than firing an
/// action. Semantic-model collaborators plug in behind the same trait.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn score_phrase(transcript: &str, phrase: &str) -> f32 {
        if contains_phrase(transcript, phrase) {
            let tokens = phrase.split_whitespace().count() as f32;
            // one word 0.7, two 0.8, three+ capped at 0.95
            (0.6 + 0.1 * tokens).min(0.95)
        } else {
            let phrase_tokens: Vec<&str> = phrase.split_whitespace().collect();
            let matched = phrase_tokens
                .iter()
                .filter(|token| contains_phrase(transcript, token))
                .count() as f32;
            // partial overlap never crosses the dispatch threshold
            0.5 * matched / phrase_tokens.len() as f32
        }
    }
}

/// Whole-word contiguous phrase match, case already folded by the caller.
fn contains_phrase(transcript: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = transcript[start..].find(phrase) {
        let begin = start + pos;
        let end = begin + phrase.len();
        let left_ok = begin == 0
            || !transcript[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let right_ok = end == transcript.len()
            || !transcript[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if left_ok && right_ok {
            return true;
        }
        start = end;
    }
    false
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, transcript: &str) -> Result<Option<IntentGuess>> {
        let folded = transcript.to_lowercase();

        let mut best: Option<IntentGuess> = None;
        for spec in VOCABULARY {
            for phrase in spec.phrases {
                let score = Self::score_phrase(&folded, phrase);
                if score <= 0.0 {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => score > current.confidence,
                };
                if better {
                    best = Some(IntentGuess {
                        intent: spec.intent,
                        confidence: score,
                        matched_phrase: (*phrase).to_string(),
                    });
                }
            }
        }

        Ok(best)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Mock classifier for tests.
pub struct MockIntentClassifier {
    guess: Option<IntentGuess>,
    should_fail: bool,
    delay: Option<Duration>,
}

impl MockIntentClassifier {
    pub fn new() -> Self {
        Self {
            guess: None,
            should_fail: false,
            delay: None,
        }
    }

    pub fn with_guess(mut self, intent: Intent, confidence: f32) -> Self {
        self.guess = Some(IntentGuess {
            intent,
            confidence,
            matched_phrase: String::new(),
        });
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Default for MockIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier for MockIntentClassifier {
    fn classify(&self, _transcript: &str) -> Result<Option<IntentGuess>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            return Err(VocmdError::IntentClassification {
                message: "mock classifier failure".to_string(),
            });
        }
        Ok(self.guess.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
