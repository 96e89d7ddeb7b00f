//! External model boundary
//!
//! The model is an opaque executable fed a prompt file. [`ModelInvoker`] is
//! the seam the pipeline talks to; [`LlamaInvoker`] drives llama.cpp and
//! [`extract_response`] cuts the answer back out of whatever it printed.

pub mod extract;
pub mod invoker;

pub use extract::{extract_response, APOLOGY};
pub use invoker::LlamaInvoker;

use async_trait::async_trait;
use thiserror::Error;

/// Prefix of every error string handed back to the user in place of an answer
pub const ERROR_PREFIX: &str = "Erro ao processar sua pergunta";

/// Failure at the invoker boundary
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("failed to write prompt file: {0}")]
    PromptFile(#[source] std::io::Error),

    #[error("failed to start model process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("model process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("model process timed out after {0}s")]
    Timeout(u64),
}

impl InvokeError {
    /// Message recorded as the answer when the model could not produce one
    pub fn user_message(&self) -> String {
        format!("{ERROR_PREFIX}: {self}")
    }
}

/// Anything that turns a formatted prompt into raw model output
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run the model once and return its raw standard output
    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let msg = InvokeError::Timeout(30).user_message();
        assert_eq!(msg, "Erro ao processar sua pergunta: model process timed out after 30s");
    }
}
