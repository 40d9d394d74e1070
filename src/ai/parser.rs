//! Extraction of JSON payloads from model replies.
//!
//! Models wrap JSON in markdown fences or surround it with prose. The
//! extractor strips fences, finds the first `{` or `[`, and scans to its
//! matching closer while honoring string literals, so braces inside strings
//! or trailing commentary never change the extracted slice.

use serde::de::DeserializeOwned;

/// Errors from reading a model reply as JSON.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("AI response contained no JSON")]
    NoJson,

    #[error("AI response JSON is not balanced")]
    Unbalanced,

    #[error("AI response JSON is invalid: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Remove markdown code-fence markers and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```JSON", "").replace("```", "").trim().to_string()
}

/// Locate the first complete JSON object or array in `text`.
///
/// Returns the slice from the first opener through its matching closer.
pub fn extract_json(text: &str) -> Result<&str, ParseError> {
    let start = text.find(['{', '[']).ok_or(ParseError::NoJson)?;

    let mut closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => closers.push(b'}'),
            b'[' => closers.push(b']'),
            b'}' | b']' => {
                if closers.pop() != Some(byte) {
                    return Err(ParseError::Unbalanced);
                }
                if closers.is_empty() {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(ParseError::Unbalanced)
}

/// Parse a model reply into `T`.
///
/// The extracted slice must deserialize strictly into `T`; anything else is
/// an error the caller maps to its fallback.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let cleaned = strip_code_fences(raw);
    match extract_json(&cleaned) {
        Ok(payload) => Ok(serde_json::from_str(payload)?),
        Err(ParseError::NoJson) => serde_json::from_str(&cleaned).map_err(|_| ParseError::NoJson),
        Err(e) => Err(e),
    }
}
