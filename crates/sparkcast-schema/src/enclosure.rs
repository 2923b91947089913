//! Release artifacts: the `<enclosure>` element and its delta variant.

use quick_xml::events::BytesStart;
use thiserror::Error;
use tracing::warn;

use crate::feed::FeedError;
use crate::platform::Platform;
use crate::signature::{Signature, SignatureKind};

/// MIME type written for enclosures that did not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Errors that keep an [`Enclosure`] out of a serialized feed.
///
/// Parsing never produces these: legacy documents load leniently, and the
/// checks only run when an enclosure is about to be written back out.
#[derive(Debug, Error)]
pub enum EnclosureError {
    /// The build number is negative (unset or unparseable at load time).
    #[error("invalid build number: {0}")]
    InvalidBuild(i64),

    /// No target platform is recorded.
    #[error("no platform set")]
    MissingPlatform,

    /// The download URL is empty or does not start with `http`.
    #[error("invalid URL: {0:?}")]
    InvalidUrl(String),

    /// The artifact byte length is zero or negative.
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// No signature, or a signature with an empty value.
    #[error("no signature set")]
    MissingSignature,

    /// A delta whose source build number is negative.
    #[error("invalid delta source build: {0}")]
    InvalidDeltaSource(i64),
}

/// One downloadable artifact of a release.
///
/// A full-installer enclosure has `delta_from: None`; a binary delta records
/// the build it patches from. Both share the same attribute vocabulary on the
/// wire, deltas just live under `<sparkle:deltas>` and add `sparkle:deltaFrom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    /// Human-facing version string (e.g. "1.2.0").
    pub version_description: String,
    /// Machine-facing build number, `-1` when unset.
    pub version_build: i64,
    /// Download URL.
    pub url: String,
    /// MIME type of the artifact.
    pub mime_type: String,
    /// Artifact size in bytes, `-1` when unset.
    pub length: i64,
    /// Detached signature, if any.
    pub signature: Option<Signature>,
    /// Target platform, `None` when the feed entry omitted or mangled it.
    pub platform: Option<Platform>,
    /// Arguments Sparkle passes to the installer (Windows only in practice).
    pub installer_arguments: Vec<String>,
    /// Build this delta patches from; `None` for full installers.
    pub delta_from: Option<i64>,
}

impl Enclosure {
    /// Build a full-installer enclosure with the default MIME type.
    pub fn new(
        version_description: impl Into<String>,
        version_build: i64,
        url: impl Into<String>,
        length: i64,
        platform: Platform,
        signature: Signature,
    ) -> Self {
        Self {
            version_description: version_description.into(),
            version_build,
            url: url.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            length,
            signature: Some(signature),
            platform: Some(platform),
            installer_arguments: Vec::new(),
            delta_from: None,
        }
    }

    /// Build a delta enclosure patching from `source_build`.
    pub fn new_delta(
        source_build: i64,
        version_description: impl Into<String>,
        version_build: i64,
        url: impl Into<String>,
        length: i64,
        platform: Platform,
        signature: Signature,
    ) -> Self {
        let mut enclosure = Self::new(
            version_description,
            version_build,
            url,
            length,
            platform,
            signature,
        );
        enclosure.delta_from = Some(source_build);
        enclosure
    }

    /// Whether this enclosure is a binary delta.
    pub fn is_delta(&self) -> bool {
        self.delta_from.is_some()
    }

    /// Final path segment of the download URL.
    pub fn filename(&self) -> &str {
        self.url.split('/').next_back().unwrap_or("")
    }

    /// Check every serialization precondition, in feed-writing order.
    ///
    /// # Errors
    ///
    /// Returns the first violated check: build number, platform, URL shape,
    /// length, signature, then delta source build.
    pub fn validate(&self) -> Result<(), EnclosureError> {
        self.validated_parts().map(|_| ())
    }

    fn validated_parts(&self) -> Result<(Platform, &Signature), EnclosureError> {
        if self.version_build < 0 {
            return Err(EnclosureError::InvalidBuild(self.version_build));
        }
        let Some(platform) = self.platform else {
            return Err(EnclosureError::MissingPlatform);
        };
        if self.url.is_empty() || !self.url.starts_with("http") {
            return Err(EnclosureError::InvalidUrl(self.url.clone()));
        }
        if self.length <= 0 {
            return Err(EnclosureError::InvalidLength(self.length));
        }
        let signature = match &self.signature {
            Some(signature) if !signature.value.is_empty() => signature,
            _ => return Err(EnclosureError::MissingSignature),
        };
        if let Some(source_build) = self.delta_from
            && source_build < 0
        {
            return Err(EnclosureError::InvalidDeltaSource(source_build));
        }
        Ok((platform, signature))
    }

    /// Read an enclosure out of a start or empty element.
    ///
    /// `delta` marks elements found under `<sparkle:deltas>`; they pick up
    /// `sparkle:deltaFrom` and default to `-1` when the attribute is absent,
    /// so a malformed delta stays a delta and fails validation later instead
    /// of silently becoming a full installer.
    pub(crate) fn from_element(element: &BytesStart<'_>, delta: bool) -> Result<Self, FeedError> {
        let mut enclosure = Self {
            version_description: String::new(),
            version_build: -1,
            url: String::new(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            length: -1,
            signature: None,
            platform: None,
            installer_arguments: Vec::new(),
            delta_from: delta.then_some(-1),
        };
        let mut raw_signatures: Vec<(SignatureKind, String)> = Vec::new();

        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| FeedError::Attr(e.to_string()))?;
            let value = attribute.unescape_value()?;
            match attribute.key.as_ref() {
                b"sparkle:shortVersionString" => {
                    enclosure.version_description = value.into_owned();
                }
                b"sparkle:version" => enclosure.version_build = parse_number(&value),
                b"sparkle:os" => enclosure.platform = Platform::from_feed_value(&value),
                b"url" => enclosure.url = value.into_owned(),
                b"length" => enclosure.length = parse_number(&value),
                b"type" => enclosure.mime_type = value.into_owned(),
                b"sparkle:dsaSignature" => {
                    raw_signatures.push((SignatureKind::Dsa, value.into_owned()));
                }
                b"sparkle:edSignature" => {
                    raw_signatures.push((SignatureKind::Ed25519, value.into_owned()));
                }
                b"sparkle:installerArguments" => {
                    enclosure.installer_arguments =
                        value.split_whitespace().map(str::to_owned).collect();
                }
                b"sparkle:deltaFrom" if delta => {
                    enclosure.delta_from = Some(parse_number(&value));
                }
                _ => {}
            }
        }

        enclosure.signature = SignatureKind::priority().find_map(|kind| {
            raw_signatures
                .iter()
                .find(|(raw_kind, _)| *raw_kind == kind)
                .map(|(_, value)| Signature::new(kind, value.clone()))
        });
        if enclosure.signature.is_none() {
            warn!(url = %enclosure.url, "enclosure has no signature");
        }

        Ok(enclosure)
    }

    /// Render this enclosure as a self-contained element.
    ///
    /// Windows enclosures with no recorded installer arguments get
    /// `windows_installer_args` so silent installs keep working for feeds
    /// that predate the attribute.
    ///
    /// # Errors
    ///
    /// Any [`EnclosureError`] from [`Enclosure::validate`]; nothing is
    /// rendered for an invalid enclosure.
    pub(crate) fn to_element(
        &self,
        windows_installer_args: &str,
    ) -> Result<BytesStart<'static>, EnclosureError> {
        let (platform, signature) = self.validated_parts()?;

        let mut element = BytesStart::new("enclosure");
        element.push_attribute(("sparkle:version", self.version_build.to_string().as_str()));
        element.push_attribute((
            "sparkle:shortVersionString",
            self.version_description.as_str(),
        ));
        element.push_attribute(("sparkle:os", platform.feed_value()));
        element.push_attribute(("url", self.url.as_str()));
        element.push_attribute(("length", self.length.to_string().as_str()));
        element.push_attribute((signature.kind.feed_key(), signature.value.as_str()));
        element.push_attribute(("type", self.mime_type.as_str()));
        if let Some(source_build) = self.delta_from {
            element.push_attribute(("sparkle:deltaFrom", source_build.to_string().as_str()));
        }
        if !self.installer_arguments.is_empty() {
            element.push_attribute((
                "sparkle:installerArguments",
                self.installer_arguments.join(" ").as_str(),
            ));
        } else if platform == Platform::Windows {
            element.push_attribute(("sparkle:installerArguments", windows_installer_args));
        }
        Ok(element.into_owned())
    }
}

/// Parse a numeric attribute, `-1` for anything unparseable.
fn parse_number(value: &str) -> i64 {
    value.trim().parse().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_WINDOWS_INSTALLER_ARGS;

    fn signed(kind: SignatureKind) -> Signature {
        Signature::new(kind, "c2lnbmF0dXJl")
    }

    fn valid_enclosure() -> Enclosure {
        Enclosure::new(
            "1.2.0",
            120,
            "https://cdn.example.com/releases/App-1.2.0.dmg",
            4096,
            Platform::MacOs,
            signed(SignatureKind::Ed25519),
        )
    }

    fn element_from(enclosure: &Enclosure, windows_args: &str) -> String {
        let element = enclosure.to_element(windows_args).unwrap();
        let mut writer = quick_xml::Writer::new(Vec::new());
        writer
            .write_event(quick_xml::events::Event::Empty(element))
            .unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn valid_enclosure_passes_all_checks() {
        assert!(valid_enclosure().validate().is_ok());
    }

    #[test]
    fn validation_rejects_in_order() {
        let mut enclosure = valid_enclosure();
        enclosure.version_build = -1;
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::InvalidBuild(-1))
        ));

        let mut enclosure = valid_enclosure();
        enclosure.platform = None;
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::MissingPlatform)
        ));

        let mut enclosure = valid_enclosure();
        enclosure.url = "ftp://example.com/app.dmg".to_string();
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::InvalidUrl(_))
        ));

        let mut enclosure = valid_enclosure();
        enclosure.length = 0;
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::InvalidLength(0))
        ));

        let mut enclosure = valid_enclosure();
        enclosure.signature = None;
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::MissingSignature)
        ));

        let mut enclosure = valid_enclosure();
        enclosure.signature = Some(Signature::new(SignatureKind::Ed25519, ""));
        assert!(matches!(
            enclosure.validate(),
            Err(EnclosureError::MissingSignature)
        ));
    }

    #[test]
    fn delta_with_negative_source_is_invalid() {
        let mut delta = valid_enclosure();
        delta.delta_from = Some(-1);
        assert!(matches!(
            delta.validate(),
            Err(EnclosureError::InvalidDeltaSource(-1))
        ));
    }

    #[test]
    fn filename_is_last_url_segment() {
        assert_eq!(valid_enclosure().filename(), "App-1.2.0.dmg");
    }

    #[test]
    fn windows_enclosure_gets_default_installer_arguments() {
        let enclosure = Enclosure::new(
            "1.2.0",
            120,
            "https://cdn.example.com/releases/App-1.2.0.exe",
            4096,
            Platform::Windows,
            signed(SignatureKind::Dsa),
        );
        let rendered = element_from(&enclosure, DEFAULT_WINDOWS_INSTALLER_ARGS);
        assert!(rendered.contains(r#"sparkle:installerArguments="/SILENT /SP-""#));
    }

    #[test]
    fn explicit_installer_arguments_survive() {
        let mut enclosure = Enclosure::new(
            "1.2.0",
            120,
            "https://cdn.example.com/releases/App-1.2.0.exe",
            4096,
            Platform::Windows,
            signed(SignatureKind::Dsa),
        );
        enclosure.installer_arguments = vec!["/VERYSILENT".to_string(), "/SP-".to_string()];
        let rendered = element_from(&enclosure, DEFAULT_WINDOWS_INSTALLER_ARGS);
        assert!(rendered.contains(r#"sparkle:installerArguments="/VERYSILENT /SP-""#));
        assert!(!rendered.contains("/SILENT /SP-"));
    }

    #[test]
    fn mac_enclosure_gets_no_installer_arguments() {
        let rendered = element_from(&valid_enclosure(), DEFAULT_WINDOWS_INSTALLER_ARGS);
        assert!(!rendered.contains("sparkle:installerArguments"));
    }

    #[test]
    fn delta_serializes_its_source_build() {
        let delta = Enclosure::new_delta(
            119,
            "1.2.0",
            120,
            "https://cdn.example.com/releases/deltas/120/App.119.120.delta",
            512,
            Platform::MacOs,
            signed(SignatureKind::Ed25519),
        );
        let rendered = element_from(&delta, DEFAULT_WINDOWS_INSTALLER_ARGS);
        assert!(rendered.contains(r#"sparkle:deltaFrom="119""#));
    }
}
