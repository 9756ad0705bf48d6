use std::error::Error;
use std::fmt;

use url::Url;

use super::icon::{LinkIcon, ParseIconError};

/// Validated fields for a new link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFields {
    pub icon: LinkIcon,
    pub title: String,
    pub url: String,
}

impl LinkFields {
    pub fn parse(icon: Option<&str>, title: &str, url: &str) -> Result<Self, LinkInputError> {
        Ok(Self {
            icon: LinkIcon::parse(icon.unwrap_or(""))?,
            title: parse_title(title)?,
            url: parse_url(url)?,
        })
    }
}

pub fn parse_title(raw: &str) -> Result<String, LinkInputError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(LinkInputError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// Accepts any absolute URL. Relative references and garbage are rejected.
pub fn parse_url(raw: &str) -> Result<String, LinkInputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LinkInputError::EmptyUrl);
    }
    Url::parse(trimmed)
        .map(|_| trimmed.to_string())
        .map_err(|err| LinkInputError::InvalidUrl {
            value: trimmed.to_string(),
            reason: err.to_string(),
        })
}

/// Short form shown under a link title: host plus path, with a bare `/` path
/// dropped. Falls back to the raw value when it does not parse or has no host.
pub fn display_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) if url.path() == "/" || url.path().is_empty() => host.to_string(),
            Some(host) => format!("{host}{}", url.path()),
            None => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInputError {
    EmptyTitle,
    EmptyUrl,
    InvalidUrl { value: String, reason: String },
    Icon(ParseIconError),
}

impl fmt::Display for LinkInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkInputError::EmptyTitle => write!(f, "link title cannot be empty"),
            LinkInputError::EmptyUrl => write!(f, "link url cannot be empty"),
            LinkInputError::InvalidUrl { value, reason } => {
                write!(f, "invalid link url '{}': {}", value, reason)
            }
            LinkInputError::Icon(err) => write!(f, "{}", err),
        }
    }
}

impl Error for LinkInputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LinkInputError::Icon(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseIconError> for LinkInputError {
    fn from(value: ParseIconError) -> Self {
        LinkInputError::Icon(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{display_url, parse_url, LinkFields, LinkInputError};
    use crate::domain::icon::LinkIcon;

    #[test]
    fn parses_and_trims_fields() {
        let fields = LinkFields::parse(None, "  Blog ", " https://a.com/posts ")
            .expect("fields should parse");
        assert_eq!(fields.icon, LinkIcon::Default);
        assert_eq!(fields.title, "Blog");
        assert_eq!(fields.url, "https://a.com/posts");
    }

    #[test]
    fn rejects_empty_title_and_relative_urls() {
        assert_eq!(
            LinkFields::parse(None, "  ", "https://a.com"),
            Err(LinkInputError::EmptyTitle)
        );
        assert!(matches!(
            parse_url("a.com/page"),
            Err(LinkInputError::InvalidUrl { .. })
        ));
        assert_eq!(parse_url(""), Err(LinkInputError::EmptyUrl));
        assert!(parse_url("mailto:me@example.com").is_ok());
    }

    #[test]
    fn display_url_drops_scheme_and_root_path() {
        assert_eq!(display_url("https://a.com/"), "a.com");
        assert_eq!(display_url("https://a.com"), "a.com");
        assert_eq!(display_url("https://a.com/me/links"), "a.com/me/links");
        assert_eq!(display_url("mailto:me@example.com"), "mailto:me@example.com");
    }
}
