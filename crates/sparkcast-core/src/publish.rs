//! The publish workflow: attaching signed artifacts to releases and
//! orchestrating delta generation.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};

use sparkcast_schema::{Enclosure, Feed, Platform, Release, ReleaseError, Signature};

use crate::delta;
use crate::dist::DistConfig;
use crate::dmg;
use crate::sign::{Ed25519Key, SignError, SigningCredential};

/// Errors from the publish workflow.
///
/// Delta orchestration mostly degrades instead of erroring; see
/// [`Publisher::create_delta_for_release`] for which failures are soft.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Neither a URL prefix nor a usable S3 scheme is configured.
    #[error("no distribution URL scheme configured (need a URL prefix or an S3 region and bucket)")]
    NoUrlScheme,

    /// The artifact file could not be inspected.
    #[error("cannot read artifact {path}: {source}")]
    Artifact {
        /// Artifact that could not be read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The artifact path has no usable UTF-8 file name.
    #[error("artifact path has no usable file name: {0}")]
    BadArtifactName(PathBuf),

    /// The delta output directory could not be created.
    #[error("cannot prepare delta directory {path}: {source}")]
    DeltaWorkspace {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An external signer failed.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// The release rejected the new enclosure or delta.
    #[error(transparent)]
    Release(#[from] ReleaseError),
}

/// Publishes artifacts into releases using a [`DistConfig`] for URLs and
/// external tools for signatures and deltas.
#[derive(Debug, Clone)]
pub struct Publisher {
    dist: DistConfig,
    delta_generator: PathBuf,
}

impl Publisher {
    /// Publisher with `BinaryDelta` expected next to the running executable.
    pub fn new(dist: DistConfig) -> Self {
        Self {
            dist,
            delta_generator: delta::default_generator(),
        }
    }

    /// Use an explicit `BinaryDelta` executable.
    pub fn with_delta_generator(mut self, generator: PathBuf) -> Self {
        self.delta_generator = generator;
        self
    }

    /// Distribution configuration in use.
    pub fn dist(&self) -> &DistConfig {
        &self.dist
    }

    /// Attach `file` to `release` as a full enclosure carrying an
    /// already-computed signature. The URL is derived from the configured
    /// scheme, the length from the file on disk.
    ///
    /// # Errors
    ///
    /// [`PublishError::NoUrlScheme`] with no usable URL scheme,
    /// [`PublishError::Artifact`] or [`PublishError::BadArtifactName`] when
    /// the file cannot be described. The release is untouched on error.
    pub fn add_enclosure_with_signature(
        &self,
        release: &mut Release,
        file: &Path,
        platform: Platform,
        signature: Signature,
    ) -> Result<(), PublishError> {
        let (filename, length) = describe_artifact(file)?;
        let url = self
            .dist
            .url_for_release(filename, platform)
            .ok_or(PublishError::NoUrlScheme)?;
        debug!(%url, length, %platform, "attaching enclosure");
        release.add_enclosure(Enclosure::new(
            release.version_description(),
            release.version_build(),
            url,
            length,
            platform,
            signature,
        ));
        Ok(())
    }

    /// Sign `file` with `credential`, then attach it as a full enclosure.
    ///
    /// # Errors
    ///
    /// [`PublishError::Sign`] when the signer fails, otherwise as
    /// [`Publisher::add_enclosure_with_signature`].
    pub fn add_enclosure_signed(
        &self,
        release: &mut Release,
        file: &Path,
        platform: Platform,
        credential: &SigningCredential,
    ) -> Result<(), PublishError> {
        let signature = credential.sign(file)?;
        self.add_enclosure_with_signature(release, file, platform, signature)
    }

    /// Sign a generated delta file and attach it to `release` as a delta
    /// from `source_build`. Deltas are Ed25519-only, so the credential type
    /// enforces the policy.
    ///
    /// # Errors
    ///
    /// Signing and artifact errors as for full enclosures, plus
    /// [`PublishError::Release`] when the release rejects the delta (for
    /// instance a duplicate `(source build, platform)` pair).
    pub fn add_delta_signed(
        &self,
        release: &mut Release,
        source_build: i64,
        delta_file: &Path,
        platform: Platform,
        credential: &Ed25519Key,
    ) -> Result<(), PublishError> {
        let signature = credential.sign(delta_file)?;
        let (filename, length) = describe_artifact(delta_file)?;
        let url = self
            .dist
            .url_for_delta(filename, release.version_build(), platform)
            .ok_or(PublishError::NoUrlScheme)?;
        debug!(%url, source_build, "attaching delta");
        release.add_delta(Enclosure::new_delta(
            source_build,
            release.version_description(),
            release.version_build(),
            url,
            length,
            platform,
            signature,
        ))?;
        Ok(())
    }

    /// Generate, sign, and attach one delta patching `source_build` up to
    /// `release`, diffing the bundle inside `new_artifact` against the
    /// mirror copy of the source release's artifact.
    ///
    /// Returns `Ok(true)` when a delta was attached and `Ok(false)` for the
    /// soft no-delta outcomes: non-Mac or non-dmg artifacts, an existing
    /// delta for the pair, an unknown source build, a source release with no
    /// diffable Mac artifact, a source file missing from the local mirror,
    /// or a failed mount. Mounts are only detached after a diff; earlier
    /// aborts leave them to the operating system.
    ///
    /// A diff failure terminates the process with exit code 1: half of a
    /// release's deltas published is worse than stopping the run.
    ///
    /// # Errors
    ///
    /// Only the final sign-and-attach step reports hard errors, as
    /// [`Publisher::add_delta_signed`].
    pub fn create_delta_for_release(
        &self,
        feed: &Feed,
        release: &mut Release,
        source_build: i64,
        new_artifact: &Path,
        platform: Platform,
        credential: &Ed25519Key,
    ) -> Result<bool, PublishError> {
        let new_build = release.version_build();

        // 1. policy gates, all soft
        if platform != Platform::MacOs {
            debug!(%platform, "deltas are only generated for macOS artifacts");
            return Ok(false);
        }
        if !is_dmg(new_artifact) {
            debug!(artifact = %new_artifact.display(), "deltas are only generated from .dmg artifacts");
            return Ok(false);
        }
        if release.has_delta(source_build, platform) {
            debug!(source_build, new_build, "delta already exists");
            return Ok(false);
        }

        // 2. mount the new artifact
        let new_mount = scratch_mount_dir(new_build);
        if let Err(error) = prepare_and_attach(new_artifact, &new_mount) {
            warn!(%error, "cannot mount new artifact, skipping delta");
            return Ok(false);
        }

        // 3. find a diffable source artifact
        let Some(source_release) = feed.release_for_build(source_build) else {
            debug!(source_build, "no release with this build, skipping delta");
            return Ok(false);
        };
        let Some(source_enclosure) = source_release.enclosure_for(Platform::MacOs) else {
            debug!(source_build, "source release has no macOS enclosure, skipping delta");
            return Ok(false);
        };
        if !source_enclosure.url.to_ascii_lowercase().ends_with(".dmg") {
            debug!(url = %source_enclosure.url, "source artifact is not a .dmg, skipping delta");
            return Ok(false);
        }

        // 4. locate the source bytes in the local mirror
        let Some(source_artifact) = self.dist.remote_url_to_local(&source_enclosure.url) else {
            warn!(url = %source_enclosure.url, "no local mirror configured, skipping delta");
            return Ok(false);
        };
        if !source_artifact.exists() {
            warn!(
                path = %source_artifact.display(),
                "source artifact not in local mirror, skipping delta"
            );
            return Ok(false);
        }

        // 5. mount the source artifact
        let source_mount = scratch_mount_dir(source_build);
        if let Err(error) = prepare_and_attach(&source_artifact, &source_mount) {
            warn!(%error, "cannot mount source artifact, skipping delta");
            return Ok(false);
        }

        // 6. diff the mounted bundles
        let Some(old_app) = find_app_bundle(&source_mount) else {
            warn!(mount = %source_mount.display(), "no .app bundle in source image, skipping delta");
            return Ok(false);
        };
        let Some(new_app) = find_app_bundle(&new_mount) else {
            warn!(mount = %new_mount.display(), "no .app bundle in new image, skipping delta");
            return Ok(false);
        };

        let delta_dir = new_artifact
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("deltas")
            .join(new_build.to_string());
        fs::create_dir_all(&delta_dir).map_err(|source| PublishError::DeltaWorkspace {
            path: delta_dir.clone(),
            source,
        })?;
        let delta_path = delta_dir.join(format!(
            "{}.{source_build}.{new_build}.delta",
            feed.title()
        ));

        if let Err(error) = delta::generate(&self.delta_generator, &old_app, &new_app, &delta_path)
        {
            // a partially published release is worse than stopping the run
            error!(%error, "binary delta generation failed");
            std::process::exit(1);
        }

        // 7. advisory unmounts
        if let Err(error) = dmg::detach(&source_mount) {
            warn!(%error, "could not detach source image");
        }
        if let Err(error) = dmg::detach(&new_mount) {
            warn!(%error, "could not detach new image");
        }

        // 8. sign and attach
        self.add_delta_signed(release, source_build, &delta_path, platform, credential)?;
        Ok(true)
    }
}

fn describe_artifact(file: &Path) -> Result<(&str, i64), PublishError> {
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PublishError::BadArtifactName(file.to_path_buf()))?;
    let length = fs::metadata(file)
        .map_err(|source| PublishError::Artifact {
            path: file.to_path_buf(),
            source,
        })?
        .len() as i64;
    Ok((filename, length))
}

fn is_dmg(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("dmg"))
}

/// Scratch mountpoint under the system temp dir, keyed by build number so
/// concurrent mounts of different builds cannot collide.
fn scratch_mount_dir(build: i64) -> PathBuf {
    std::env::temp_dir()
        .join("sparkcast")
        .join(format!("mount-{build}"))
}

fn prepare_and_attach(image: &Path, mountpoint: &Path) -> Result<(), dmg::DmgError> {
    fs::create_dir_all(mountpoint)?;
    dmg::attach(image, mountpoint)
}

/// First `.app` directory (alphabetically) inside a mounted image.
fn find_app_bundle(mount: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(mount).ok()?;
    let mut bundles: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".app"))
        })
        .collect();
    bundles.sort();
    bundles.into_iter().next()
}


#[cfg(all(test, unix))]
mod signer_tests {
    use super::*;
    use sparkcast_schema::SignatureKind;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn stub_ed25519(dir: &Path) -> Ed25519Key {
        let path = dir.join("sign_update");
        fs::write(
            &path,
            "#!/bin/sh\nprintf 'sparkle:edSignature=\"ZGVsdGFzaWc=\" length=\"9\"\\n'\n",
        )
        .unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        Ed25519Key {
            key: "a2V5".to_string(),
            generator: path,
        }
    }

    #[test]
    fn signed_delta_is_attached_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let delta_file = dir.path().join("Acme.119.120.delta");
        fs::write(&delta_file, b"delta bytes").unwrap();

        let publisher = Publisher::new(DistConfig {
            url_prefix: Some("https://cdn.example.com/releases".to_string()),
            ..DistConfig::default()
        });
        let credential = stub_ed25519(dir.path());

        let mut release = Release::new("Acme", "1.2.0", 120);
        publisher
            .add_delta_signed(&mut release, 119, &delta_file, Platform::MacOs, &credential)
            .unwrap();

        let delta = release.delta_for(119, Platform::MacOs).unwrap();
        assert_eq!(
            delta.url,
            "https://cdn.example.com/releases/deltas/120/Acme.119.120.delta"
        );
        assert_eq!(delta.signature.as_ref().unwrap().kind, SignatureKind::Ed25519);
        assert_eq!(delta.signature.as_ref().unwrap().value, "ZGVsdGFzaWc=");
        assert_eq!(delta.length, 11);

        // second attempt for the same pair is rejected by the release
        assert!(matches!(
            publisher.add_delta_signed(&mut release, 119, &delta_file, Platform::MacOs, &credential),
            Err(PublishError::Release(ReleaseError::DuplicateDelta { .. }))
        ));
    }

    #[test]
    fn signed_enclosure_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("Acme-1.2.0.dmg");
        fs::write(&artifact, b"artifact").unwrap();

        let publisher = Publisher::new(DistConfig {
            url_prefix: Some("https://cdn.example.com/releases".to_string()),
            ..DistConfig::default()
        });
        let credential = SigningCredential::Ed25519(stub_ed25519(dir.path()));

        let mut release = Release::new("Acme", "1.2.0", 120);
        publisher
            .add_enclosure_signed(&mut release, &artifact, Platform::MacOs, &credential)
            .unwrap();
        assert_eq!(
            release
                .enclosure_for(Platform::MacOs)
                .unwrap()
                .signature
                .as_ref()
                .unwrap()
                .value,
            "ZGVsdGFzaWc="
        );
    }
}
