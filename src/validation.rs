//! Content checks applied to every submission before an identifier is drawn.

use crate::constants::MAX_PAYLOAD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty payload")]
    Empty,

    #[error("payload too big")]
    TooLarge,

    #[error("blacklisted phrases, antispam system")]
    Blacklisted,
}

/// Returns the first failing check, in order: empty, oversize, deny-listed.
///
/// Size checks run first so the substring scan never touches trivial or
/// oversized input.
pub fn validate<S: AsRef<str>>(content: &[u8], deny_list: &[S]) -> Result<(), ValidationError> {
    if content.is_empty() {
        return Err(ValidationError::Empty);
    }

    if content.len() > MAX_PAYLOAD_SIZE {
        return Err(ValidationError::TooLarge);
    }

    if deny_list
        .iter()
        .map(|phrase| phrase.as_ref().as_bytes())
        .any(|phrase| contains(content, phrase))
    {
        return Err(ValidationError::Blacklisted);
    }

    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
