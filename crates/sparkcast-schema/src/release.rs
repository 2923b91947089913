//! One published release: the `<item>` element of an appcast.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use thiserror::Error;
use tracing::warn;

use crate::enclosure::{Enclosure, EnclosureError};
use crate::feed::{FeedError, read_element_text, write_text_element};
use crate::platform::Platform;

/// Fixed `pubDate` format, RFC-822 style with a literal UTC offset:
/// `Tue, 03 Mar 2026 10:00:00 +0000`.
pub const PUBDATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

/// Errors raised when mutating or validating a [`Release`].
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The release has no title.
    #[error("release has no title")]
    MissingTitle,

    /// The release has no publish timestamp.
    #[error("release has no publish timestamp")]
    MissingTimestamp,

    /// The enclosure handed to [`Release::add_delta`] is not a delta.
    #[error("enclosure carries no delta source build")]
    NotADelta,

    /// The delta handed to [`Release::add_delta`] has no platform.
    #[error("delta has no platform")]
    UnknownDeltaPlatform,

    /// A delta for this `(source build, platform)` pair already exists.
    #[error("delta from build {source_build} for {platform} already exists")]
    DuplicateDelta {
        /// Source build of the rejected delta.
        source_build: i64,
        /// Platform of the rejected delta.
        platform: Platform,
    },

    /// The delta does not move forward to this release's build.
    #[error("delta source build {source_build} does not precede build {version_build}")]
    DeltaNotForward {
        /// Source build of the rejected delta.
        source_build: i64,
        /// Build of the release the delta was added to.
        version_build: i64,
    },

    /// An enclosure or delta failed its own validation.
    #[error(transparent)]
    Enclosure(#[from] EnclosureError),
}

/// One release of the product: title, timestamps, artifacts, deltas.
///
/// Fields stay private because the delta lookup index must track the delta
/// list; everything else is reachable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    title: String,
    description: Option<String>,
    release_notes_url: Option<String>,
    published: Option<DateTime<Utc>>,
    version_description: String,
    version_build: i64,
    enclosures: Vec<Enclosure>,
    deltas: Vec<Enclosure>,
    delta_index: HashMap<(i64, Platform), usize>,
}

impl Release {
    /// Start a release stamped with the current time.
    pub fn new(
        title: impl Into<String>,
        version_description: impl Into<String>,
        version_build: i64,
    ) -> Self {
        let mut release = Self::unparsed();
        release.title = title.into();
        release.version_description = version_description.into();
        release.version_build = version_build;
        release.published = Some(Utc::now());
        release
    }

    fn unparsed() -> Self {
        Self {
            title: String::new(),
            description: None,
            release_notes_url: None,
            published: None,
            version_description: String::new(),
            version_build: -1,
            enclosures: Vec::new(),
            deltas: Vec::new(),
            delta_index: HashMap::new(),
        }
    }

    /// Release title, normally the product name.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replace the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Free-form release notes body, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Replace the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// URL of an external release-notes page, if any.
    pub fn release_notes_url(&self) -> Option<&str> {
        self.release_notes_url.as_deref()
    }

    /// Replace the release-notes URL.
    pub fn set_release_notes_url(&mut self, url: impl Into<String>) {
        self.release_notes_url = Some(url.into());
    }

    /// Publish timestamp, `None` when the feed entry had none or it did not
    /// match [`PUBDATE_FORMAT`].
    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published
    }

    /// Publish timestamp rendered in [`PUBDATE_FORMAT`].
    pub fn published_string(&self) -> Option<String> {
        self.published
            .map(|published| published.format(PUBDATE_FORMAT).to_string())
    }

    /// Human-facing version string.
    pub fn version_description(&self) -> &str {
        &self.version_description
    }

    /// Machine-facing build number, `-1` when unset.
    pub fn version_build(&self) -> i64 {
        self.version_build
    }

    /// Full-installer artifacts in document order.
    pub fn enclosures(&self) -> &[Enclosure] {
        &self.enclosures
    }

    /// Delta artifacts in document order.
    pub fn deltas(&self) -> &[Enclosure] {
        &self.deltas
    }

    /// First full enclosure targeting `platform`.
    pub fn enclosure_for(&self, platform: Platform) -> Option<&Enclosure> {
        self.enclosures
            .iter()
            .find(|enclosure| enclosure.platform == Some(platform))
    }

    /// Whether any full enclosure targets `platform`.
    pub fn has_enclosure(&self, platform: Platform) -> bool {
        self.enclosure_for(platform).is_some()
    }

    /// Delta patching from `source_build` on `platform`, if recorded.
    pub fn delta_for(&self, source_build: i64, platform: Platform) -> Option<&Enclosure> {
        self.delta_index
            .get(&(source_build, platform))
            .map(|&position| &self.deltas[position])
    }

    /// Whether a delta from `source_build` on `platform` is recorded.
    pub fn has_delta(&self, source_build: i64, platform: Platform) -> bool {
        self.delta_index.contains_key(&(source_build, platform))
    }

    /// Attach a full-installer enclosure.
    pub fn add_enclosure(&mut self, enclosure: Enclosure) {
        self.enclosures.push(enclosure);
    }

    /// Attach a delta enclosure and index it by `(source build, platform)`.
    ///
    /// # Errors
    ///
    /// [`ReleaseError::NotADelta`] if the enclosure has no source build,
    /// [`ReleaseError::UnknownDeltaPlatform`] if it has no platform,
    /// [`ReleaseError::DeltaNotForward`] unless the source build strictly
    /// precedes this release's build, and [`ReleaseError::DuplicateDelta`]
    /// when the `(source build, platform)` pair is already taken.
    pub fn add_delta(&mut self, delta: Enclosure) -> Result<(), ReleaseError> {
        let Some(source_build) = delta.delta_from else {
            return Err(ReleaseError::NotADelta);
        };
        let Some(platform) = delta.platform else {
            return Err(ReleaseError::UnknownDeltaPlatform);
        };
        if source_build < 0 {
            return Err(EnclosureError::InvalidDeltaSource(source_build).into());
        }
        if self.version_build >= 0 && source_build >= self.version_build {
            return Err(ReleaseError::DeltaNotForward {
                source_build,
                version_build: self.version_build,
            });
        }
        if self.delta_index.contains_key(&(source_build, platform)) {
            return Err(ReleaseError::DuplicateDelta {
                source_build,
                platform,
            });
        }
        self.delta_index
            .insert((source_build, platform), self.deltas.len());
        self.deltas.push(delta);
        Ok(())
    }

    /// Lenient delta intake for parsed documents: unindexable deltas are
    /// kept (they fail validation at save time), duplicates keep the first
    /// occurrence in the index.
    fn push_parsed_delta(&mut self, delta: Enclosure) {
        let key = delta
            .delta_from
            .filter(|&source_build| source_build >= 0)
            .and_then(|source_build| delta.platform.map(|platform| (source_build, platform)));
        let position = self.deltas.len();
        self.deltas.push(delta);
        if let Some(key) = key {
            self.delta_index.entry(key).or_insert(position);
        }
    }

    /// Check everything [`crate::Feed::add_release`] requires.
    ///
    /// # Errors
    ///
    /// [`ReleaseError::MissingTitle`] or [`ReleaseError::MissingTimestamp`]
    /// for the release itself, or the first [`EnclosureError`] from any
    /// attached enclosure or delta.
    pub fn validate(&self) -> Result<(), ReleaseError> {
        if self.title.is_empty() {
            return Err(ReleaseError::MissingTitle);
        }
        if self.published.is_none() {
            return Err(ReleaseError::MissingTimestamp);
        }
        for enclosure in &self.enclosures {
            enclosure.validate()?;
        }
        for delta in &self.deltas {
            delta.validate()?;
        }
        Ok(())
    }

    /// Adopt the first real build number seen among parsed enclosures.
    fn adopt_version(&mut self, enclosure: &Enclosure) {
        if self.version_build < 0 && enclosure.version_build >= 0 {
            self.version_build = enclosure.version_build;
            self.version_description = enclosure.version_description.clone();
        }
    }

    /// Parse one `<item>`; the reader has just consumed the item start tag.
    pub(crate) fn from_xml(reader: &mut Reader<&[u8]>) -> Result<Self, FeedError> {
        let mut release = Self::unparsed();
        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"title" => release.title = read_element_text(reader, element.name())?,
                    b"description" => {
                        release.description = Some(read_element_text(reader, element.name())?);
                    }
                    b"sparkle:releaseNotesLink" => {
                        release.release_notes_url =
                            Some(read_element_text(reader, element.name())?.trim().to_string());
                    }
                    b"pubDate" => {
                        release.published =
                            parse_pubdate(&read_element_text(reader, element.name())?);
                    }
                    b"enclosure" => {
                        let enclosure = Enclosure::from_element(&element, false)?;
                        reader.read_to_end(element.name())?;
                        release.adopt_version(&enclosure);
                        release.enclosures.push(enclosure);
                    }
                    b"sparkle:deltas" => release.parse_deltas(reader)?,
                    _ => {
                        reader.read_to_end(element.name())?;
                    }
                },
                Event::Empty(element) => {
                    if element.name().as_ref() == b"enclosure" {
                        let enclosure = Enclosure::from_element(&element, false)?;
                        release.adopt_version(&enclosure);
                        release.enclosures.push(enclosure);
                    }
                }
                Event::End(element) if element.name().as_ref() == b"item" => break,
                Event::Eof => return Err(FeedError::Truncated),
                _ => {}
            }
        }
        Ok(release)
    }

    /// Parse the `<sparkle:deltas>` container the reader just entered.
    fn parse_deltas(&mut self, reader: &mut Reader<&[u8]>) -> Result<(), FeedError> {
        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    if element.name().as_ref() == b"enclosure" {
                        let delta = Enclosure::from_element(&element, true)?;
                        reader.read_to_end(element.name())?;
                        self.push_parsed_delta(delta);
                    } else {
                        reader.read_to_end(element.name())?;
                    }
                }
                Event::Empty(element) => {
                    if element.name().as_ref() == b"enclosure" {
                        self.push_parsed_delta(Enclosure::from_element(&element, true)?);
                    }
                }
                Event::End(element) if element.name().as_ref() == b"sparkle:deltas" => break,
                Event::Eof => return Err(FeedError::Truncated),
                _ => {}
            }
        }
        Ok(())
    }

    /// Serialize this release as one `<item>`.
    ///
    /// Releases without a title or timestamp are skipped with a warning, as
    /// are individual enclosures and deltas that fail validation. The rest
    /// of the document still saves.
    pub(crate) fn write_xml(
        &self,
        writer: &mut Writer<Vec<u8>>,
        windows_installer_args: &str,
    ) -> Result<(), FeedError> {
        if self.title.is_empty() {
            warn!(build = self.version_build, "skipping release with no title");
            return Ok(());
        }
        let Some(published) = self.published else {
            warn!(
                title = %self.title,
                build = self.version_build,
                "skipping release with no publish timestamp"
            );
            return Ok(());
        };

        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(writer, "title", &self.title)?;
        if let Some(description) = &self.description {
            write_text_element(writer, "description", description)?;
        }
        if let Some(notes_url) = &self.release_notes_url {
            write_text_element(writer, "sparkle:releaseNotesLink", notes_url)?;
        }
        write_text_element(
            writer,
            "pubDate",
            &published.format(PUBDATE_FORMAT).to_string(),
        )?;

        for enclosure in &self.enclosures {
            match enclosure.to_element(windows_installer_args) {
                Ok(element) => writer.write_event(Event::Empty(element))?,
                Err(error) => warn!(url = %enclosure.url, %error, "skipping invalid enclosure"),
            }
        }

        let mut delta_elements = Vec::new();
        for delta in &self.deltas {
            match delta.to_element(windows_installer_args) {
                Ok(element) => delta_elements.push(element),
                Err(error) => warn!(url = %delta.url, %error, "skipping invalid delta"),
            }
        }
        if !delta_elements.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("sparkle:deltas")))?;
            for element in delta_elements {
                writer.write_event(Event::Empty(element))?;
            }
            writer.write_event(Event::End(BytesEnd::new("sparkle:deltas")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("item")))?;
        Ok(())
    }
}

/// Parse a `pubDate` body; anything not matching [`PUBDATE_FORMAT`] is `None`.
pub(crate) fn parse_pubdate(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), PUBDATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Signature, SignatureKind};
    use chrono::TimeZone;

    fn delta(source_build: i64, version_build: i64, platform: Platform) -> Enclosure {
        Enclosure::new_delta(
            source_build,
            "1.2.0",
            version_build,
            format!("https://example.com/deltas/{version_build}/App.{source_build}.{version_build}.delta"),
            512,
            platform,
            Signature::new(SignatureKind::Ed25519, "ZWQtc2ln"),
        )
    }

    #[test]
    fn pubdate_round_trips() {
        let parsed = parse_pubdate("Tue, 03 Mar 2026 10:00:00 +0000").unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(
            parsed.format(PUBDATE_FORMAT).to_string(),
            "Tue, 03 Mar 2026 10:00:00 +0000"
        );
    }

    #[test]
    fn nonmatching_pubdate_is_none() {
        assert_eq!(parse_pubdate("2026-03-03T10:00:00Z"), None);
        assert_eq!(parse_pubdate(""), None);
        assert_eq!(parse_pubdate("Tue, 03 Mar 2026 10:00:00 +0200"), None);
    }

    #[test]
    fn new_release_is_stamped_and_valid() {
        let release = Release::new("App", "1.2.0", 120);
        assert!(release.published().is_some());
        assert!(release.validate().is_ok());
        assert_eq!(release.version_build(), 120);
    }

    #[test]
    fn validation_requires_title_and_timestamp() {
        let mut release = Release::new("App", "1.2.0", 120);
        release.set_title("");
        assert!(matches!(release.validate(), Err(ReleaseError::MissingTitle)));

        let mut release = Release::unparsed();
        release.set_title("App");
        assert!(matches!(
            release.validate(),
            Err(ReleaseError::MissingTimestamp)
        ));
    }

    #[test]
    fn invalid_enclosure_fails_release_validation() {
        let mut release = Release::new("App", "1.2.0", 120);
        release.add_enclosure(Enclosure::new(
            "1.2.0",
            120,
            "not-a-url",
            4096,
            Platform::MacOs,
            Signature::new(SignatureKind::Ed25519, "c2ln"),
        ));
        assert!(matches!(
            release.validate(),
            Err(ReleaseError::Enclosure(EnclosureError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn add_delta_indexes_by_source_and_platform() {
        let mut release = Release::new("App", "1.2.0", 120);
        release.add_delta(delta(119, 120, Platform::MacOs)).unwrap();
        release.add_delta(delta(118, 120, Platform::MacOs)).unwrap();

        assert!(release.has_delta(119, Platform::MacOs));
        assert!(release.has_delta(118, Platform::MacOs));
        assert!(!release.has_delta(119, Platform::Windows));
        assert_eq!(
            release.delta_for(119, Platform::MacOs).unwrap().delta_from,
            Some(119)
        );
    }

    #[test]
    fn duplicate_delta_is_rejected() {
        let mut release = Release::new("App", "1.2.0", 120);
        release.add_delta(delta(119, 120, Platform::MacOs)).unwrap();
        assert!(matches!(
            release.add_delta(delta(119, 120, Platform::MacOs)),
            Err(ReleaseError::DuplicateDelta {
                source_build: 119,
                platform: Platform::MacOs,
            })
        ));
        assert_eq!(release.deltas().len(), 1);
    }

    #[test]
    fn delta_must_move_forward() {
        let mut release = Release::new("App", "1.2.0", 120);
        assert!(matches!(
            release.add_delta(delta(120, 120, Platform::MacOs)),
            Err(ReleaseError::DeltaNotForward {
                source_build: 120,
                version_build: 120,
            })
        ));
        assert!(matches!(
            release.add_delta(delta(121, 120, Platform::MacOs)),
            Err(ReleaseError::DeltaNotForward { .. })
        ));
    }

    #[test]
    fn plain_enclosure_is_not_a_delta() {
        let mut release = Release::new("App", "1.2.0", 120);
        let enclosure = Enclosure::new(
            "1.2.0",
            120,
            "https://example.com/App-1.2.0.dmg",
            4096,
            Platform::MacOs,
            Signature::new(SignatureKind::Ed25519, "c2ln"),
        );
        assert!(matches!(
            release.add_delta(enclosure),
            Err(ReleaseError::NotADelta)
        ));
    }

    #[test]
    fn enclosure_lookup_is_per_platform() {
        let mut release = Release::new("App", "1.2.0", 120);
        release.add_enclosure(Enclosure::new(
            "1.2.0",
            120,
            "https://example.com/App-1.2.0.exe",
            4096,
            Platform::Windows,
            Signature::new(SignatureKind::Dsa, "ZHNh"),
        ));
        assert!(release.has_enclosure(Platform::Windows));
        assert!(!release.has_enclosure(Platform::MacOs));
        assert_eq!(
            release.enclosure_for(Platform::Windows).unwrap().filename(),
            "App-1.2.0.exe"
        );
    }
}
