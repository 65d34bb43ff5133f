//! Tokenizing of free-form option strings.

use super::error::CommandError;

/// Splits `"-preset fast -crf 23"` into shell-style tokens.
///
/// Quoting follows POSIX shell rules, so `-metadata "title=My Song"` yields
/// two tokens.
pub fn tokenize_options(options: &str) -> Result<Vec<String>, CommandError> {
    shell_words::split(options)
        .map_err(|e| CommandError::invalid_options(format!("{}: {}", e, options)))
}
