//! Summaries for finished sessions and answered questions.

use async_trait::async_trait;

use crate::models::{Session, SessionQuestion};

/// Produces the free-text summaries stored on sessions and answers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_session(&self, session: &Session) -> String;
    async fn summarize_answer(&self, question: &SessionQuestion) -> String;
}

pub const PENDING_SUMMARY: &str = "Summary pending review";

/// Stand-in until an automated reviewer is connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderSummarizer;

#[async_trait]
impl Summarizer for PlaceholderSummarizer {
    async fn summarize_session(&self, _session: &Session) -> String {
        PENDING_SUMMARY.to_string()
    }

    async fn summarize_answer(&self, _question: &SessionQuestion) -> String {
        PENDING_SUMMARY.to_string()
    }
}
