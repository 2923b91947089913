//! Target platform vocabulary for feed artifacts.

use std::fmt;

/// Operating system a release artifact targets.
///
/// Parsed artifacts carry `Option<Platform>`: legacy feed entries may omit or
/// mangle the `sparkle:os` attribute and still load, but an enclosure without
/// a platform never serializes back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS disk images and bundles.
    MacOs,
    /// Windows installers.
    Windows,
}

impl Platform {
    /// Parse the `sparkle:os` attribute vocabulary, case-insensitively.
    ///
    /// The arch-suffixed forms `windows-x86` and `windows-x64` collapse to
    /// plain [`Platform::Windows`]. Anything unrecognized is `None`.
    pub fn from_feed_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "macos" => Some(Self::MacOs),
            "windows" | "windows-x86" | "windows-x64" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Canonical `sparkle:os` attribute value.
    pub fn feed_value(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    /// Path segment used when deriving S3 distribution URLs.
    pub fn url_segment(self) -> &'static str {
        match self {
            Self::MacOs => "mac",
            Self::Windows => "windows",
        }
    }

    /// Human-readable name for summaries and log lines.
    pub fn description(self) -> &'static str {
        match self {
            Self::MacOs => "macOS",
            Self::Windows => "Windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feed_vocabulary() {
        assert_eq!(Platform::from_feed_value("macos"), Some(Platform::MacOs));
        assert_eq!(Platform::from_feed_value("windows"), Some(Platform::Windows));
        assert_eq!(
            Platform::from_feed_value("windows-x86"),
            Some(Platform::Windows)
        );
        assert_eq!(
            Platform::from_feed_value("windows-x64"),
            Some(Platform::Windows)
        );
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(Platform::from_feed_value("MacOS"), Some(Platform::MacOs));
        assert_eq!(Platform::from_feed_value("WINDOWS"), Some(Platform::Windows));
    }

    #[test]
    fn unknown_values_have_no_platform() {
        assert_eq!(Platform::from_feed_value(""), None);
        assert_eq!(Platform::from_feed_value("linux"), None);
        assert_eq!(Platform::from_feed_value("mac os"), None);
    }

    #[test]
    fn url_segment_differs_from_feed_value_on_mac() {
        assert_eq!(Platform::MacOs.feed_value(), "macos");
        assert_eq!(Platform::MacOs.url_segment(), "mac");
        assert_eq!(Platform::Windows.url_segment(), "windows");
    }
}
