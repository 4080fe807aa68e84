//! Input validation for chat arguments, channel ids and channel documents.

use std::collections::HashMap;

/// Validation errors with chat-friendly messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Channel id must not be empty")]
    EmptyChannelId,

    #[error("Channel id is too long (maximum {max} characters)")]
    ChannelIdTooLong { max: usize },

    #[error("Channel id contains whitespace or control characters")]
    ChannelIdInvalidCharacters,

    #[error("Cannot convert {value} to an integer")]
    NotAnInteger { value: String },

    #[error("Cannot set {what} lower than 0")]
    Negative { what: &'static str },

    #[error("Guess code '{code}' is used by both {first} and {second}")]
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },

    #[error("Document exceeds size limit ({limit} bytes)")]
    FileSizeExceeded { limit: usize },

    #[error("Invalid document format: {reason}")]
    InvalidFormat { reason: String },
}

/// Longest channel id accepted. Twitch room ids are numeric and far shorter.
pub const MAX_CHANNEL_ID_LEN: usize = 64;

/// Percent-encode an identifier so it can be used as a file name.
pub fn safe_filename(name: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Validate a channel id used as a document key.
pub fn validate_channel_id(channel_id: &str) -> Result<String, ValidationError> {
    let trimmed = channel_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyChannelId);
    }
    if trimmed.chars().count() > MAX_CHANNEL_ID_LEN {
        return Err(ValidationError::ChannelIdTooLong {
            max: MAX_CHANNEL_ID_LEN,
        });
    }
    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::ChannelIdInvalidCharacters);
    }
    Ok(trimmed.to_string())
}

/// Parse a `!guesspoints` / `!firstguess` argument.
///
/// `what` names the setting in the negative-value message, e.g. "points value".
pub fn parse_points_value(raw: &str, what: &'static str) -> Result<u32, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotAnInteger {
            value: raw.to_string(),
        })?;
    if value < 0 {
        return Err(ValidationError::Negative { what });
    }
    u32::try_from(value).map_err(|_| ValidationError::NotAnInteger {
        value: raw.to_string(),
    })
}

/// Normalize a username typed in chat (`@Alice` and `alice` name the same viewer).
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

/// Reject guess codes shared by more than one item.
///
/// Codes are compared after lowercasing, matching how they are resolved.
pub fn check_unique_codes<'a, I>(items: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut owners: HashMap<String, &'a str> = HashMap::new();
    for (name, codes) in items {
        for code in codes {
            let key = code.to_lowercase();
            match owners.get(key.as_str()) {
                Some(first) if *first != name => {
                    return Err(ValidationError::DuplicateCode {
                        code: key,
                        first: first.to_string(),
                        second: name.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(key, name);
                }
            }
        }
    }
    Ok(())
}

/// Parse a JSON document with a size limit, tolerating leading NUL bytes left
/// behind by an interrupted write.
pub fn secure_json_parse<T>(content: &str, max_bytes: usize) -> Result<T, ValidationError>
where
    T: serde::de::DeserializeOwned,
{
    if content.len() > max_bytes {
        return Err(ValidationError::FileSizeExceeded { limit: max_bytes });
    }
    let normalized = content.trim_start_matches('\0');
    serde_json::from_str(normalized).map_err(|e| ValidationError::InvalidFormat {
        reason: e.to_string(),
    })
}
