use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_ICON_GLYPH: &str = "🔗";

/// Icon attached to a link. Rendering is left to the presentation layer;
/// this type only decides which kind of icon a raw value denotes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkIcon {
    #[default]
    Default,
    Glyph(String),
    Symbolic(SymbolicIcon),
    /// A stored value this build does not know. Kept verbatim.
    Unrecognized(String),
}

impl LinkIcon {
    /// Parses user input. Blank input is the default icon; anything after the
    /// first whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, ParseIconError> {
        let token = raw.split_whitespace().next().unwrap_or("");
        if token.is_empty() || token == DEFAULT_ICON_GLYPH {
            return Ok(LinkIcon::Default);
        }

        if is_single_glyph(token) {
            return Ok(LinkIcon::Glyph(token.to_string()));
        }

        let name = token.to_ascii_lowercase();
        let name = name.strip_prefix("fa-").unwrap_or(&name);
        SymbolicIcon::from_str(name).map(LinkIcon::Symbolic)
    }

    /// Reads a stored value. Unknown values are carried through unchanged
    /// instead of failing the whole listing.
    pub fn from_stored(raw: &str) -> Self {
        LinkIcon::parse(raw).unwrap_or_else(|_| LinkIcon::Unrecognized(raw.trim().to_string()))
    }

    pub fn as_stored(&self) -> &str {
        match self {
            LinkIcon::Default => DEFAULT_ICON_GLYPH,
            LinkIcon::Glyph(glyph) => glyph,
            LinkIcon::Symbolic(icon) => icon.as_str(),
            LinkIcon::Unrecognized(raw) => raw,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LinkIcon::Default => "default",
            LinkIcon::Glyph(_) => "glyph",
            LinkIcon::Symbolic(_) => "symbolic",
            LinkIcon::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for LinkIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_stored())
    }
}

impl Serialize for LinkIcon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_stored())
    }
}

fn is_single_glyph(token: &str) -> bool {
    !token.is_ascii() && token.graphemes(true).count() == 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolicIcon {
    Twitter,
    Snapchat,
    Instagram,
    Facebook,
    Youtube,
    Spotify,
    Tiktok,
    LocationDot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconFamily {
    Brand,
    Solid,
}

impl SymbolicIcon {
    pub const ALL: [SymbolicIcon; 8] = [
        SymbolicIcon::Twitter,
        SymbolicIcon::Snapchat,
        SymbolicIcon::Instagram,
        SymbolicIcon::Facebook,
        SymbolicIcon::Youtube,
        SymbolicIcon::Spotify,
        SymbolicIcon::Tiktok,
        SymbolicIcon::LocationDot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolicIcon::Twitter => "twitter",
            SymbolicIcon::Snapchat => "snapchat",
            SymbolicIcon::Instagram => "instagram",
            SymbolicIcon::Facebook => "facebook",
            SymbolicIcon::Youtube => "youtube",
            SymbolicIcon::Spotify => "spotify",
            SymbolicIcon::Tiktok => "tiktok",
            SymbolicIcon::LocationDot => "location-dot",
        }
    }

    pub fn family(self) -> IconFamily {
        match self {
            SymbolicIcon::LocationDot => IconFamily::Solid,
            _ => IconFamily::Brand,
        }
    }
}

impl FromStr for SymbolicIcon {
    type Err = ParseIconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SymbolicIcon::ALL
            .into_iter()
            .find(|icon| icon.as_str() == value)
            .ok_or_else(|| ParseIconError {
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIconError {
    value: String,
}

impl fmt::Display for ParseIconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown icon '{}': use a single emoji or one of {}",
            self.value,
            SymbolicIcon::ALL
                .iter()
                .map(|icon| icon.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseIconError {}

#[cfg(test)]
mod tests {
    use super::{IconFamily, LinkIcon, SymbolicIcon, DEFAULT_ICON_GLYPH};

    #[test]
    fn blank_and_link_glyph_mean_default() {
        assert_eq!(LinkIcon::parse("").unwrap(), LinkIcon::Default);
        assert_eq!(LinkIcon::parse("   ").unwrap(), LinkIcon::Default);
        assert_eq!(LinkIcon::parse(DEFAULT_ICON_GLYPH).unwrap(), LinkIcon::Default);
        assert_eq!(LinkIcon::Default.as_stored(), "🔗");
    }

    #[test]
    fn single_emoji_is_a_glyph() {
        assert_eq!(
            LinkIcon::parse("🎵").unwrap(),
            LinkIcon::Glyph("🎵".to_string())
        );
        // flag emoji is two code points but one grapheme
        assert_eq!(
            LinkIcon::parse("🇯🇵").unwrap(),
            LinkIcon::Glyph("🇯🇵".to_string())
        );
        assert!(LinkIcon::parse("🎵🎵").is_err());
    }

    #[test]
    fn symbolic_names_accept_prefix_and_trailing_words() {
        assert_eq!(
            LinkIcon::parse("fa-Spotify").unwrap(),
            LinkIcon::Symbolic(SymbolicIcon::Spotify)
        );
        assert_eq!(
            LinkIcon::parse("instagram brand icon").unwrap(),
            LinkIcon::Symbolic(SymbolicIcon::Instagram)
        );
        assert_eq!(SymbolicIcon::LocationDot.family(), IconFamily::Solid);
        assert_eq!(SymbolicIcon::Tiktok.family(), IconFamily::Brand);
    }

    #[test]
    fn unknown_names_are_rejected_on_input_but_tolerated_from_storage() {
        let err = LinkIcon::parse("myspace").expect_err("unknown vocabulary");
        assert!(err.to_string().contains("unknown icon 'myspace'"));
        let stored = LinkIcon::from_stored("map-marker-alt");
        assert_eq!(stored, LinkIcon::Unrecognized("map-marker-alt".to_string()));
        assert_eq!(stored.as_stored(), "map-marker-alt");
        assert_eq!(stored.kind(), "unrecognized");
        assert_eq!(
            LinkIcon::from_stored("youtube"),
            LinkIcon::Symbolic(SymbolicIcon::Youtube)
        );
    }
}
