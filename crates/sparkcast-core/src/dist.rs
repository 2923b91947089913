//! Distribution-URL derivation and local-mirror mapping.

use std::path::{Path, PathBuf};

use sparkcast_schema::Platform;

/// S3-style bucket location for derived URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    /// AWS region, e.g. `us-east-1`.
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Directory inside the bucket, if artifacts are not at the root.
    pub bucket_dir: Option<String>,
}

impl S3Location {
    /// Base URL of the bucket including the bucket dir, no trailing slash.
    pub fn base_url(&self) -> String {
        let mut url = format!("https://s3-{}.amazonaws.com/{}", self.region, self.bucket);
        if let Some(bucket_dir) = &self.bucket_dir {
            url.push('/');
            url.push_str(bucket_dir);
        }
        url
    }

    fn is_usable(&self) -> bool {
        !self.region.is_empty() && !self.bucket.is_empty()
    }
}

/// Where published artifacts end up, and how to find old ones locally.
///
/// Two URL schemes exist: a plain prefix, or an S3 bucket layout with one
/// path segment per platform. The prefix takes precedence when both are
/// configured. With neither, URL derivation yields `None` and publishing
/// refuses to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistConfig {
    /// Direct URL prefix; the filename is appended as the only segment.
    pub url_prefix: Option<String>,
    /// S3 scheme configuration.
    pub s3: Option<S3Location>,
    /// Local mirror of the bucket contents, for delta-source lookup.
    pub local_mirror: Option<PathBuf>,
}

impl DistConfig {
    /// Derive the download URL for a full artifact.
    ///
    /// The prefix scheme ignores platform segmenting; the S3 scheme scopes
    /// the filename under [`Platform::url_segment`].
    pub fn url_for_release(&self, filename: &str, platform: Platform) -> Option<String> {
        if let Some(prefix) = &self.url_prefix {
            return Some(format!("{prefix}/{filename}"));
        }
        let s3 = self.s3.as_ref().filter(|s3| s3.is_usable())?;
        Some(format!(
            "{}/{}/{filename}",
            s3.base_url(),
            platform.url_segment()
        ))
    }

    /// Derive the download URL for a delta artifact.
    ///
    /// Same precedence as [`DistConfig::url_for_release`], with a
    /// `deltas/{new_build}` segment inserted before the filename.
    pub fn url_for_delta(
        &self,
        filename: &str,
        new_build: i64,
        platform: Platform,
    ) -> Option<String> {
        if let Some(prefix) = &self.url_prefix {
            return Some(format!("{prefix}/deltas/{new_build}/{filename}"));
        }
        let s3 = self.s3.as_ref().filter(|s3| s3.is_usable())?;
        Some(format!(
            "{}/{}/deltas/{new_build}/{filename}",
            s3.base_url(),
            platform.url_segment()
        ))
    }

    /// Translate a URL under the S3 base into a path under the local mirror.
    ///
    /// Plain string substitution; `None` when the mirror or the S3 scheme is
    /// not configured, or the URL lives elsewhere. Not available for the
    /// prefix scheme.
    pub fn remote_url_to_local(&self, url: &str) -> Option<PathBuf> {
        let s3 = self.s3.as_ref().filter(|s3| s3.is_usable())?;
        let mirror = self.local_mirror.as_ref()?;
        let rest = url.strip_prefix(&s3.base_url())?;
        Some(mirror.join(rest.trim_start_matches('/')))
    }

    /// Inverse of [`DistConfig::remote_url_to_local`].
    pub fn local_path_to_remote(&self, path: &Path) -> Option<String> {
        let s3 = self.s3.as_ref().filter(|s3| s3.is_usable())?;
        let mirror = self.local_mirror.as_ref()?;
        let rest = path.strip_prefix(mirror).ok()?;
        Some(format!("{}/{}", s3.base_url(), rest.display()))
    }
}
