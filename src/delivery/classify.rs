//! Benign-versus-real classification of client error text.
//!
//! The WhatsApp client throws from its read-marking path when a send is made
//! with read receipts suppressed, even though the message went out. There is
//! no structured error code for this, so the only signal is the error text.
//! The substrings are configurable because they depend on the client version
//! behind the bridge.

/// Substrings that identify read-receipt suppression artifacts.
///
/// `sendSeen` is the suppression option itself; `markedUnread` is the
/// property the client dereferences on a chat it has not loaded.
pub const DEFAULT_BENIGN_PATTERNS: &[&str] = &["sendSeen", "markedUnread"];

/// How an error should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Side effect of suppression bookkeeping; delivery may have succeeded.
    Benign,
    /// Anything else.
    Real,
}

/// Case-sensitive substring matcher over error text.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<String>,
}

impl ErrorClassifier {
    /// Build a classifier. Blank patterns are dropped since they would match
    /// every error.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
        Self { patterns }
    }

    /// Classify an error message.
    pub fn classify(&self, message: &str) -> ErrorClass {
        if self.patterns.iter().any(|p| message.contains(p.as_str())) {
            ErrorClass::Benign
        } else {
            ErrorClass::Real
        }
    }

    /// Shorthand for `classify(message) == ErrorClass::Benign`.
    pub fn is_benign(&self, message: &str) -> bool {
        self.classify(message) == ErrorClass::Benign
    }

    /// The active patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BENIGN_PATTERNS.iter().copied())
    }
}
