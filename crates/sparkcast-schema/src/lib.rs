//! Shared types and wire format for Sparkle appcast feeds.
//!
//! An appcast is an RSS dialect: one `<channel>` carrying one `<item>` per
//! release, each item carrying `<enclosure>` artifacts annotated with
//! `sparkle:*` attributes. This crate models that document and owns the
//! parse/serialize round trip; publishing workflows live in `sparkcast-core`.

pub mod enclosure;
pub mod feed;
pub mod platform;
pub mod release;
pub mod signature;

// Re-exports
pub use enclosure::{DEFAULT_MIME_TYPE, Enclosure, EnclosureError};
pub use feed::{Feed, FeedError};
pub use platform::Platform;
pub use release::{PUBDATE_FORMAT, Release, ReleaseError};
pub use signature::{Signature, SignatureKind};

/// Installer arguments written for Windows enclosures that carry none.
/// Sparkle for Windows passes these through to Inno Setup installers.
pub const DEFAULT_WINDOWS_INSTALLER_ARGS: &str = "/SILENT /SP-";
