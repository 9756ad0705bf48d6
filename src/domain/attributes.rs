use std::error::Error;
use std::fmt;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

pub const MAX_DISPLAY_NAME_CHARS: usize = 40;

/// Trims and checks a display name: 1 to 40 characters.
pub fn parse_display_name(raw: &str) -> Result<String, AttributeError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AttributeError::EmptyDisplayName);
    }
    let length = name.chars().count();
    if length > MAX_DISPLAY_NAME_CHARS {
        return Err(AttributeError::DisplayNameTooLong { length });
    }
    Ok(name.to_string())
}

/// Cuts a provider-reported name down to the display name limit without
/// splitting a grapheme. Blank means the provider had no usable name.
pub fn fit_display_name(raw: &str) -> String {
    let mut fitted = String::new();
    let mut length = 0;
    for grapheme in raw.trim().graphemes(true) {
        length += grapheme.chars().count();
        if length > MAX_DISPLAY_NAME_CHARS {
            break;
        }
        fitted.push_str(grapheme);
    }
    fitted.trim_end().to_string()
}

pub fn normalize_bio(raw: &str) -> String {
    raw.trim().to_string()
}

/// Blank clears the avatar; anything else must be an absolute URL.
pub fn parse_avatar_url(raw: &str) -> Result<Option<String>, AttributeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Url::parse(trimmed)
        .map(|_| Some(trimmed.to_string()))
        .map_err(|err| AttributeError::InvalidAvatarUrl {
            value: trimmed.to_string(),
            reason: err.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    EmptyDisplayName,
    DisplayNameTooLong { length: usize },
    InvalidAvatarUrl { value: String, reason: String },
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeError::EmptyDisplayName => write!(f, "display name cannot be empty"),
            AttributeError::DisplayNameTooLong { length } => write!(
                f,
                "display name is {} characters; the limit is {}",
                length, MAX_DISPLAY_NAME_CHARS
            ),
            AttributeError::InvalidAvatarUrl { value, reason } => {
                write!(f, "invalid avatar url '{}': {}", value, reason)
            }
        }
    }
}

impl Error for AttributeError {}

#[cfg(test)]
mod tests {
    use super::{
        fit_display_name, normalize_bio, parse_avatar_url, parse_display_name, AttributeError,
    };

    #[test]
    fn display_name_bounds_count_characters() {
        assert_eq!(
            parse_display_name("   "),
            Err(AttributeError::EmptyDisplayName)
        );
        assert_eq!(parse_display_name(" Ada ").as_deref(), Ok("Ada"));
        let forty_wide = "é".repeat(40);
        assert!(parse_display_name(&forty_wide).is_ok());
        assert_eq!(
            parse_display_name(&"x".repeat(41)),
            Err(AttributeError::DisplayNameTooLong { length: 41 })
        );
    }

    #[test]
    fn provider_names_are_cut_to_the_limit() {
        let long = "x".repeat(45);
        assert_eq!(fit_display_name(&long), "x".repeat(40));
        assert!(parse_display_name(&fit_display_name(&long)).is_ok());

        // a flag is two chars; the one that would cross the limit is dropped whole
        let flags = format!("{}{}", "a".repeat(39), "🇯🇵");
        assert_eq!(fit_display_name(&flags), "a".repeat(39));
        assert_eq!(fit_display_name("  Ada  "), "Ada");
        assert_eq!(fit_display_name("   "), "");
    }

    #[test]
    fn avatar_blank_clears_and_relative_is_rejected() {
        assert_eq!(parse_avatar_url(" "), Ok(None));
        assert_eq!(
            parse_avatar_url("https://img.example/a.png"),
            Ok(Some("https://img.example/a.png".to_string()))
        );
        assert!(parse_avatar_url("a.png").is_err());
        assert_eq!(normalize_bio("  hi there \n"), "hi there");
    }
}
