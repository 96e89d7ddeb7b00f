//! The ask pipeline: sanitize, pick a directive, format, invoke, extract, record

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::history::{ExchangeRecord, HistoryRecorder};
use crate::model::{extract_response, ModelInvoker};
use crate::prompt::{detect_directive, format_prompt, DirectiveKind};
use crate::sanitize::sanitize;
use crate::{AssistError, Result};

/// Message for a blank question
pub const EMPTY_QUESTION: &str = "Pergunta vazia";

/// Everything produced by one pass through the pipeline
#[derive(Debug, Clone)]
pub struct Exchange {
    /// What was stored
    pub record: ExchangeRecord,
    pub sanitized_question: String,
    pub directive: DirectiveKind,
    pub prompt: String,
    /// Raw process output; `None` when the invoker failed
    pub raw_output: Option<String>,
}

impl Exchange {
    pub fn answer(&self) -> &str {
        &self.record.response
    }

    pub fn timestamp(&self) -> String {
        self.record.timestamp()
    }

    pub fn failed(&self) -> bool {
        self.raw_output.is_none()
    }
}

/// Composes the stateless pipeline stages around a model invoker
#[derive(Clone)]
pub struct AskPipeline {
    invoker: Arc<dyn ModelInvoker>,
    recorder: HistoryRecorder,
}

impl fmt::Debug for AskPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskPipeline")
            .field("invoker", &self.invoker.name())
            .finish_non_exhaustive()
    }
}

impl AskPipeline {
    pub fn new(invoker: Arc<dyn ModelInvoker>, recorder: HistoryRecorder) -> Self {
        Self { invoker, recorder }
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    /// Answer one question for `username` and record the exchange.
    ///
    /// Model failures do not fail the call: their message becomes the answer
    /// and is recorded like any other. Only a blank question is rejected,
    /// before anything is stored.
    pub async fn ask(&self, username: &str, question: &str) -> Result<Exchange> {
        let sanitized = sanitize(Some(question));
        if sanitized.trim().is_empty() {
            return Err(AssistError::validation(EMPTY_QUESTION));
        }

        let directive = detect_directive(question);
        let prompt = format_prompt(&sanitized, Some(directive.text()));

        let start = Instant::now();
        let (answer, raw_output) = match self.invoker.invoke(&prompt).await {
            Ok(raw) => (extract_response(&raw), Some(raw)),
            Err(e) => {
                error!(username, invoker = self.invoker.name(), error = %e, "Model invocation failed");
                (e.user_message(), None)
            }
        };

        let recorder = self.recorder.clone();
        let (user, asked, stored_answer) = (username.to_string(), question.to_string(), answer);
        let record = tokio::task::spawn_blocking(move || {
            recorder.record_with_directive(&user, &asked, &stored_answer, directive)
        })
        .await??;

        info!(
            username,
            directive = %directive,
            elapsed_ms = start.elapsed().as_millis() as u64,
            failed = raw_output.is_none(),
            "Question processed"
        );

        Ok(Exchange {
            record,
            sanitized_question: sanitized,
            directive,
            prompt,
            raw_output,
        })
    }
}
