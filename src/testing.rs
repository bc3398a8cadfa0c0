use std::cell::RefCell;

use crate::error::{ReportError, ReportResult};
use crate::llm::{ChatMessage, TextGenerator};

/// Scripted generator that records every request it receives.
pub struct FakeGenerator {
    replies: RefCell<Vec<ReportResult<String>>>,
    calls: RefCell<Vec<(String, Vec<ChatMessage>)>>,
}

impl FakeGenerator {
    /// Replies are handed out in order; the last one repeats.
    pub fn scripted(replies: Vec<ReportResult<String>>) -> Self {
        Self {
            replies: RefCell::new(replies),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::scripted(vec![Ok(text.to_string())])
    }

    pub fn failing(reason: &str) -> Self {
        Self::scripted(vec![Err(ReportError::generation(reason))])
    }

    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl TextGenerator for FakeGenerator {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> ReportResult<String> {
        self.calls
            .borrow_mut()
            .push((model.to_string(), messages.to_vec()));

        let mut replies = self.replies.borrow_mut();
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            match replies.first() {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(err)) => Err(ReportError::generation(match err {
                    ReportError::GenerationFailed { reason } => reason.clone(),
                    other => other.to_string(),
                })),
                None => Err(ReportError::generation("no scripted reply")),
            }
        }
    }
}
