//! Assist Core - the question pipeline behind the corporate assistant
//!
//! Every question an employee asks travels the same request-scoped path:
//!
//! ```text
//!   raw question
//!        │
//!   ┌────▼─────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//!   │ sanitize │──▶│ directive │──▶│  format   │──▶│  invoke  │──▶│  extract  │──▶│  record  │
//!   └──────────┘   └───────────┘   └───────────┘   └──────────┘   └───────────┘   └──────────┘
//!                   keyword scan    [INST] <<SYS>>  llama.cpp      after [/INST]   SQLite
//! ```
//!
//! The model itself is an opaque executable. This crate owns the contract
//! around it: how the prompt is wrapped, how the process is launched, and how
//! the answer is cut back out of its output.
//!
//! # Modules
//!
//! - [`sanitize`]: metacharacter stripping and length clamp
//! - [`prompt`]: directive selection and the instruction template
//! - [`model`]: external process invocation and response extraction
//! - [`auth`]: password hashing, roles and the authorization guard
//! - [`storage`]: repository traits and the SQLite store
//! - [`history`]: the exchange recorder
//! - [`pipeline`]: the composed ask pipeline
//! - [`integrations`]: optional document sources
//!
//! # Quick Start
//!
//! ```
//! use assist_core::prompt::{detect_directive, format_prompt, DirectiveKind};
//! use assist_core::model::extract_response;
//!
//! let question = "O servidor de arquivos está fora do ar?";
//! let kind = detect_directive(question);
//! assert_eq!(kind, DirectiveKind::Technical);
//!
//! let prompt = format_prompt(question, Some(kind.text()));
//! assert!(prompt.contains("[/INST]"));
//!
//! let answer = extract_response(&format!("{prompt}Verifique a VPN."));
//! assert_eq!(answer, "Verifique a VPN.");
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod history;
pub mod integrations;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod sanitize;
pub mod storage;

pub use auth::{authorize, AccessDecision, Identity, IdentityService, NewIdentity, Principal, Requirement, Role};
pub use config::AssistConfig;
pub use error::{AssistError, Result};
pub use history::{ExchangeRecord, HistoryRecorder};
pub use model::{extract_response, InvokeError, LlamaInvoker, ModelInvoker};
pub use pipeline::{AskPipeline, Exchange};
pub use prompt::{detect_directive, format_prompt, DirectiveKind};
pub use sanitize::sanitize;
pub use storage::{ExchangeRepository, IdentityRepository, SqliteStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display format for every timestamp shown to users
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
