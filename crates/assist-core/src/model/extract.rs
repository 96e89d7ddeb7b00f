//! Response extraction from raw model output
//!
//! llama.cpp echoes the prompt before generating, so the answer is whatever
//! follows the first closing instruction marker.

use lazy_static::lazy_static;
use regex::Regex;

use crate::prompt::{BOS, EOS, INST_CLOSE};

/// Answer used when the model produced nothing usable
pub const APOLOGY: &str = "Desculpe, não foi possível gerar uma resposta.";

/// Trailer llama.cpp prints when generation hits end-of-sequence
const END_OF_TEXT: &str = "[end of text]";

lazy_static! {
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Cut the answer out of raw model output.
///
/// Never fails: blank output, or output that is nothing but markers, yields
/// [`APOLOGY`].
pub fn extract_response(raw: &str) -> String {
    if raw.trim().is_empty() {
        return APOLOGY.to_string();
    }

    let answer = match raw.split_once(INST_CLOSE) {
        Some((_, rest)) => rest,
        None => raw,
    };
    let answer = strip_markers(answer);
    let answer = EXCESS_NEWLINES.replace_all(answer, "\n\n");
    let answer = answer.trim();

    if answer.is_empty() {
        APOLOGY.to_string()
    } else {
        answer.to_string()
    }
}

fn strip_markers(mut text: &str) -> &str {
    loop {
        let before = text.len();
        text = text.trim();
        for marker in [BOS, EOS] {
            text = text.strip_prefix(marker).unwrap_or(text);
        }
        for marker in [EOS, BOS, END_OF_TEXT] {
            text = text.strip_suffix(marker).unwrap_or(text);
        }
        if text.len() == before {
            return text;
        }
    }
}
