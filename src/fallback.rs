//! Typed input fallback
//!
//! The always-available parallel path: a plain text buffer with its own
//! submit action, used when microphone permission is denied or the user
//! prefers typing. It shares the voice path's submit contract, so the
//! caller never learns which modality produced the text.

use tracing::info;

use crate::session::SubmitHandler;

/// A typed response in progress
#[derive(Debug, Clone)]
pub struct TypedInput {
    text: String,
    placeholder: String,
}

impl TypedInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            placeholder: placeholder.into(),
        }
    }

    /// Prompt shown while the buffer is empty
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Submit is only enabled for non-blank input
    pub fn can_submit(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Deliver the trimmed text to the caller and clear the buffer.
    /// Returns false (and delivers nothing) for blank input.
    pub fn submit(&mut self, handler: &SubmitHandler) -> bool {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return false;
        }

        info!("Delivering {} typed chars to the caller", trimmed.len());
        handler(trimmed.to_string());
        self.text.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting_handler() -> (SubmitHandler, Arc<Mutex<Vec<String>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let handler: SubmitHandler = Arc::new(move |text| {
            sink.lock().unwrap().push(text);
        });
        (handler, delivered)
    }

    #[test]
    fn blank_input_cannot_submit() {
        let (handler, delivered) = collecting_handler();
        let mut input = TypedInput::new("Say something...");

        assert!(!input.can_submit());
        input.set_text("   \n ");
        assert!(!input.can_submit());
        assert!(!input.submit(&handler));
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn submit_trims_and_clears() {
        let (handler, delivered) = collecting_handler();
        let mut input = TypedInput::new("Say something...");

        input.set_text("  I need space  ");
        assert!(input.can_submit());
        assert!(input.submit(&handler));

        assert_eq!(*delivered.lock().unwrap(), vec!["I need space".to_string()]);
        assert!(input.text().is_empty());
    }
}
