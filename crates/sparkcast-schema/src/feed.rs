//! The appcast document: an RSS channel of releases.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use thiserror::Error;
use tracing::{debug, warn};

use crate::DEFAULT_WINDOWS_INSTALLER_ARGS;
use crate::platform::Platform;
use crate::release::{Release, ReleaseError};

const SPARKLE_XMLNS: &str = "http://www.andymatuschak.org/xml-namespaces/sparkle";
const DC_XMLNS: &str = "http://purl.org/dc/elements/1.1/";

/// Errors loading, mutating, or saving a [`Feed`].
#[derive(Debug, Error)]
pub enum FeedError {
    /// Reading or writing the appcast file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An element carried a malformed attribute list. Scoped to one release
    /// entry, which is skipped; the rest of the document still loads.
    #[error("malformed attribute: {0}")]
    Attr(String),

    /// The document ended in the middle of an element.
    #[error("unexpected end of document")]
    Truncated,

    /// The document is well-formed XML but not `rss > channel`.
    #[error("not an appcast document (missing <{0}> element)")]
    NotAFeed(&'static str),

    /// [`Feed::add_release`] rejected the release.
    #[error("invalid release: {0}")]
    InvalidRelease(#[from] ReleaseError),
}

/// An appcast document held in memory.
///
/// Releases live in an append-only arena so that build-number lookups stay
/// valid while the document is edited; `layout` tracks document order. The
/// build index is only rebuilt by [`Feed::reindex`] or a fresh load, never
/// by [`Feed::add_release`].
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    title: String,
    link: Option<String>,
    description: Option<String>,
    language: Option<String>,
    windows_installer_args: String,
    releases: Vec<Release>,
    layout: Vec<usize>,
    index: HashMap<i64, usize>,
}

impl Feed {
    fn empty() -> Self {
        Self {
            title: String::new(),
            link: None,
            description: None,
            language: None,
            windows_installer_args: DEFAULT_WINDOWS_INSTALLER_ARGS.to_string(),
            releases: Vec::new(),
            layout: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load and parse an appcast file.
    ///
    /// # Errors
    ///
    /// [`FeedError::Io`] when the file cannot be read, otherwise whatever
    /// [`Feed::parse`] reports.
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        debug!(path = %path.display(), "loading appcast");
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse an appcast document.
    ///
    /// Loading is lenient about content: missing attributes become unset
    /// fields, unknown elements are skipped, and a release entry with a
    /// malformed attribute list is dropped with a warning. Only a document
    /// that is not well-formed `rss > channel` XML fails outright.
    ///
    /// # Errors
    ///
    /// [`FeedError::NotAFeed`] when the document shape is wrong,
    /// [`FeedError::Xml`] or [`FeedError::Truncated`] when it is not
    /// well-formed.
    pub fn parse(xml: &str) -> Result<Self, FeedError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        expect_open(&mut reader, "rss")?;
        expect_open(&mut reader, "channel")?;

        let mut feed = Self::empty();
        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"title" => feed.title = read_element_text(&mut reader, element.name())?,
                    b"link" => {
                        feed.link = Some(read_element_text(&mut reader, element.name())?);
                    }
                    b"description" => {
                        feed.description = Some(read_element_text(&mut reader, element.name())?);
                    }
                    b"language" => {
                        feed.language = Some(read_element_text(&mut reader, element.name())?);
                    }
                    b"item" => match Release::from_xml(&mut reader) {
                        Ok(release) => feed.append_parsed(release),
                        Err(FeedError::Attr(detail)) => {
                            warn!(detail, "skipping release entry with malformed attributes");
                            reader.read_to_end(QName(b"item"))?;
                        }
                        Err(error) => return Err(error),
                    },
                    _ => {
                        reader.read_to_end(element.name())?;
                    }
                },
                Event::End(element) if element.name().as_ref() == b"channel" => break,
                Event::Eof => return Err(FeedError::Truncated),
                _ => {}
            }
        }
        debug!(releases = feed.len(), indexed = feed.index.len(), "parsed appcast");
        Ok(feed)
    }

    fn append_parsed(&mut self, release: Release) {
        let position = self.releases.len();
        let build = release.version_build();
        self.releases.push(release);
        self.layout.push(position);
        if build >= 0 {
            // first occurrence of a build number wins
            self.index.entry(build).or_insert(position);
        }
    }

    /// Channel title, normally the product name.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Channel link, if any.
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Channel description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Channel language, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Override the installer arguments written for Windows enclosures that
    /// carry none. Defaults to [`DEFAULT_WINDOWS_INSTALLER_ARGS`].
    pub fn set_windows_installer_args(&mut self, args: impl Into<String>) {
        self.windows_installer_args = args.into();
    }

    /// Releases in document order, newest first.
    pub fn releases(&self) -> impl Iterator<Item = &Release> + '_ {
        self.layout.iter().map(|&position| &self.releases[position])
    }

    /// Number of releases, including ones that would not serialize.
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Whether the feed holds no releases.
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Look up an indexed release by build number. Negative build numbers
    /// never match.
    pub fn release_for_build(&self, build: i64) -> Option<&Release> {
        if build < 0 {
            return None;
        }
        self.index.get(&build).map(|&position| &self.releases[position])
    }

    /// Whether an indexed release carries this build number.
    pub fn contains_build(&self, build: i64) -> bool {
        self.release_for_build(build).is_some()
    }

    /// Whether the indexed release for `build` has a full enclosure for
    /// `platform`.
    pub fn has_enclosure(&self, build: i64, platform: Platform) -> bool {
        self.release_for_build(build)
            .is_some_and(|release| release.has_enclosure(platform))
    }

    /// Start a new release stamped with this feed's title and the current
    /// time. The release is not part of the feed until
    /// [`Feed::add_release`].
    pub fn create_release(&self, version_description: &str, version_build: i64) -> Release {
        Release::new(&self.title, version_description, version_build)
    }

    /// Insert a release at the front of the document, right after the
    /// channel metadata.
    ///
    /// The build index is deliberately left alone: lookups keep answering
    /// from the document as last indexed until [`Feed::reindex`] or a
    /// reload.
    ///
    /// # Errors
    ///
    /// [`FeedError::InvalidRelease`] when [`Release::validate`] fails; the
    /// document is not touched.
    pub fn add_release(&mut self, release: Release) -> Result<(), FeedError> {
        if let Err(error) = release.validate() {
            warn!(%error, build = release.version_build(), "rejecting release");
            return Err(FeedError::InvalidRelease(error));
        }
        let position = self.releases.len();
        self.releases.push(release);
        self.layout.insert(0, position);
        Ok(())
    }

    /// Rebuild the build-number index from the current document order.
    ///
    /// Unlike parsing, where the first occurrence of a duplicate build wins,
    /// re-indexing lets the last write win.
    pub fn reindex(&mut self) {
        self.index.clear();
        for &position in &self.layout {
            let build = self.releases[position].version_build();
            if build >= 0 {
                self.index.insert(build, position);
            }
        }
    }

    /// Serialize the whole document.
    ///
    /// Strict where parsing was lenient: releases, enclosures, and deltas
    /// that fail validation are skipped with a warning rather than written
    /// incomplete.
    ///
    /// # Errors
    ///
    /// Only writer failures surface here; validation problems downgrade to
    /// warnings.
    pub fn to_xml(&self) -> Result<String, FeedError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:dc", DC_XMLNS));
        rss.push_attribute(("xmlns:sparkle", SPARKLE_XMLNS));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        write_text_element(&mut writer, "title", &self.title)?;
        if let Some(link) = &self.link {
            write_text_element(&mut writer, "link", link)?;
        }
        if let Some(description) = &self.description {
            write_text_element(&mut writer, "description", description)?;
        }
        if let Some(language) = &self.language {
            write_text_element(&mut writer, "language", language)?;
        }
        for release in self.releases() {
            release.write_xml(&mut writer, &self.windows_installer_args)?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
        xml.push('\n');
        Ok(xml)
    }

    /// Atomically persist the document to `path`.
    ///
    /// The file is first written to a temporary location and then renamed
    /// so that update clients polling the feed never observe a partial
    /// document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, file writing, or the rename
    /// fails.
    pub fn save(&self, path: &Path) -> Result<(), FeedError> {
        let xml = self.to_xml()?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("xml.tmp");
        fs::write(&temp_path, &xml)?;
        fs::rename(&temp_path, path)?;

        debug!(path = %path.display(), "saved appcast");
        Ok(())
    }
}

/// Skip prologue and unrelated elements until `name` opens.
fn expect_open(reader: &mut Reader<&[u8]>, name: &'static str) -> Result<(), FeedError> {
    loop {
        match reader.read_event()? {
            Event::Start(element) if element.name().as_ref() == name.as_bytes() => return Ok(()),
            Event::Start(element) => {
                reader.read_to_end(element.name())?;
            }
            Event::Eof | Event::End(_) => return Err(FeedError::NotAFeed(name)),
            _ => {}
        }
    }
}

/// Collect the text body of the element just opened, consuming through its
/// end tag. Nested markup is skipped.
pub(crate) fn read_element_text(
    reader: &mut Reader<&[u8]>,
    end: QName<'_>,
) -> Result<String, FeedError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(body) => text.push_str(&body.unescape()?),
            Event::CData(body) => text.push_str(&String::from_utf8_lossy(&body.into_inner())),
            Event::Start(element) => {
                reader.read_to_end(element.name())?;
            }
            Event::End(element) if element.name() == end => break,
            Event::Eof => return Err(FeedError::Truncated),
            _ => {}
        }
    }
    Ok(text)
}

/// Write `<name>text</name>` with escaping.
pub(crate) fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), FeedError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
