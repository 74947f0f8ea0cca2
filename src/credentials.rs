use std::{fs, path::Path};

use crate::{FlipsideError, Result};

/// Default location of the API key, relative to the working directory.
pub const DEFAULT_API_KEY_PATH: &str = "api_key.txt";

/// Reads the API key from the first line of `path`.
///
/// Trailing whitespace (including the newline) is stripped. A missing or
/// unreadable file is [`FlipsideError::Credential`]; a blank first line is
/// [`FlipsideError::EmptyCredential`].
pub fn read_api_key(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| FlipsideError::Credential {
        path: path.to_path_buf(),
        source,
    })?;

    let key = content.lines().next().unwrap_or_default().trim_end();
    if key.is_empty() {
        return Err(FlipsideError::EmptyCredential {
            path: path.to_path_buf(),
        });
    }
    Ok(key.to_owned())
}
