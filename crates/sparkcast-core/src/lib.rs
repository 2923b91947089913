//! Publishing operations for sparkcast.
//!
//! Everything here sits between the feed model (`sparkcast-schema`) and the
//! outside world: distribution-URL derivation, external signing tools, disk
//! image mounting, binary-delta generation, and the publish workflow that
//! ties them together.

pub mod delta;
pub mod dist;
pub mod dmg;
pub mod publish;
pub mod sign;

// Re-exports
pub use delta::DeltaError;
pub use dist::{DistConfig, S3Location};
pub use dmg::DmgError;
pub use publish::{PublishError, Publisher};
pub use sign::{DsaKey, Ed25519Key, SignError, SigningCredential};
