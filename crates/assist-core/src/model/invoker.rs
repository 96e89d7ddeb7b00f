//! llama.cpp process invoker

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

use super::{InvokeError, ModelInvoker};
use crate::config::ModelSettings;
use crate::prompt::{INST_CLOSE, INST_OPEN};

/// Characters of stderr kept in [`InvokeError::NonZeroExit`]
const STDERR_TAIL_CHARS: usize = 500;

/// Runs one llama.cpp process per prompt.
///
/// The prompt travels through a temporary file passed with `-f`; it is
/// removed when the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct LlamaInvoker {
    settings: ModelSettings,
}

impl LlamaInvoker {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Arguments passed to the executable for a given prompt file
    pub fn command_args(&self, prompt_file: &Path) -> Vec<OsString> {
        let s = &self.settings;
        let temperature = s.temperature.to_string();
        vec![
            "-m".into(),
            s.model_path.clone().into_os_string(),
            "-c".into(),
            s.context_size.to_string().into(),
            "-t".into(),
            temperature.clone().into(),
            "-n".into(),
            s.max_tokens.to_string().into(),
            "--temp".into(),
            temperature.into(),
            "--repeat_penalty".into(),
            s.repeat_penalty.to_string().into(),
            "--in-prefix".into(),
            INST_OPEN.into(),
            "--in-suffix".into(),
            INST_CLOSE.into(),
            "-f".into(),
            prompt_file.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl ModelInvoker for LlamaInvoker {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let prompt_file = tempfile::Builder::new()
            .prefix("assist-prompt-")
            .suffix(".txt")
            .tempfile()
            .map_err(InvokeError::PromptFile)?;
        tokio::fs::write(prompt_file.path(), prompt)
            .await
            .map_err(InvokeError::PromptFile)?;

        let args = self.command_args(prompt_file.path());
        debug!(
            executable = %self.settings.executable.display(),
            args = ?args,
            "Launching model process"
        );

        let mut cmd = Command::new(&self.settings.executable);
        cmd.args(&args).kill_on_drop(true);

        let start = Instant::now();
        let output = match self.settings.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), cmd.output())
                .await
                .map_err(|_| InvokeError::Timeout(secs))?,
            None => cmd.output().await,
        }
        .map_err(InvokeError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InvokeError::NonZeroExit {
                code: output.status.code(),
                stderr: tail(stderr.trim(), STDERR_TAIL_CHARS),
            });
        }

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            "Model process finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}
