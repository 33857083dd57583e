use std::fmt;

use thiserror::Error;

const PROFILE_URL_PREFIX: &str = "https://www.linkedin.com/in/";
const MAX_HANDLE_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("source identifier is empty")]
    Empty,

    #[error("'{0}' is not a profile URL or handle")]
    Unrecognised(String),
}

/// A public profile reference, normalized to its lower-cased handle.
///
/// Accepts bare handles (`janedoe`) and profile URLs, with or without scheme
/// (`linkedin.com/in/janedoe/`, `https://www.linkedin.com/pub/janedoe?trk=x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentifier {
    handle: String,
}

impl SourceIdentifier {
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let candidate = match profile_path_segment(input) {
            Some(segment) => segment,
            None if input.contains('/') || input.contains('.') => {
                return Err(IdentifierError::Unrecognised(input.to_string()))
            }
            None => input,
        };

        if !is_valid_handle(candidate) {
            return Err(IdentifierError::Unrecognised(input.to_string()));
        }

        Ok(Self {
            handle: candidate.to_lowercase(),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Canonical public profile URL for this handle.
    pub fn profile_url(&self) -> String {
        format!("{PROFILE_URL_PREFIX}{}", self.handle)
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handle)
    }
}

/// Returns the handle segment following `linkedin.com/in/` or `linkedin.com/pub/`.
fn profile_path_segment(input: &str) -> Option<&str> {
    let lower = input.to_ascii_lowercase();
    let host_at = lower.find("linkedin.com/")?;
    let rest_start = host_at + "linkedin.com/".len();
    let rest = &input[rest_start..];
    let lower_rest = &lower[rest_start..];

    let after = ["in/", "pub/"]
        .iter()
        .find(|p| lower_rest.starts_with(*p))
        .map(|p| &rest[p.len()..])?;

    let end = after
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(after.len());
    let segment = &after[..end];
    (!segment.is_empty()).then_some(segment)
}

fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '%'))
}
