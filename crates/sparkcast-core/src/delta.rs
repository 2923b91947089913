//! Binary-delta generation via Sparkle's `BinaryDelta` tool.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

/// Errors from running `BinaryDelta`.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// The `BinaryDelta` executable does not exist.
    #[error("BinaryDelta not found: {0}")]
    GeneratorMissing(PathBuf),

    /// `BinaryDelta` could not be started.
    #[error("failed to run BinaryDelta: {0}")]
    Spawn(#[from] std::io::Error),

    /// `BinaryDelta` exited unsuccessfully.
    #[error("BinaryDelta exited with {status}: {stderr}")]
    DiffFailed {
        /// Exit status of the tool.
        status: ExitStatus,
        /// Captured stderr.
        stderr: String,
    },
}

/// Diff two unpacked application bundles into a patch file at `output`,
/// blocking until the tool exits.
///
/// # Errors
///
/// [`DeltaError::GeneratorMissing`] before anything runs, otherwise spawn
/// or diff failures.
pub fn generate(
    generator: &Path,
    old_bundle: &Path,
    new_bundle: &Path,
    output: &Path,
) -> Result<(), DeltaError> {
    if !generator.exists() {
        return Err(DeltaError::GeneratorMissing(generator.to_path_buf()));
    }

    debug!(
        old = %old_bundle.display(),
        new = %new_bundle.display(),
        output = %output.display(),
        "BinaryDelta create"
    );
    let result = Command::new(generator)
        .arg("create")
        .arg("--verbose")
        .arg(old_bundle)
        .arg(new_bundle)
        .arg(output)
        .output()?;
    if !result.status.success() {
        return Err(DeltaError::DiffFailed {
            status: result.status,
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Default `BinaryDelta` location: next to the running executable, the
/// layout release engineers get by dropping Sparkle's tools beside this one.
pub fn default_generator() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("BinaryDelta")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("BinaryDelta");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        path
    }

    #[test]
    fn missing_generator_is_rejected_without_running() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            generate(
                &dir.path().join("BinaryDelta"),
                &dir.path().join("old.app"),
                &dir.path().join("new.app"),
                &dir.path().join("out.delta"),
            ),
            Err(DeltaError::GeneratorMissing(_))
        ));
    }

    #[test]
    fn create_arguments_reach_the_tool_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(dir.path(), r#"echo "$@" > "$(dirname "$0")/argv.txt""#);

        generate(
            &generator,
            Path::new("/tmp/old.app"),
            Path::new("/tmp/new.app"),
            Path::new("/tmp/out.delta"),
        )
        .unwrap();

        let argv = fs::read_to_string(dir.path().join("argv.txt")).unwrap();
        assert_eq!(
            argv.trim(),
            "create --verbose /tmp/old.app /tmp/new.app /tmp/out.delta"
        );
    }

    #[test]
    fn diff_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(dir.path(), "echo 'not a bundle' >&2; exit 2");

        match generate(
            &generator,
            Path::new("/tmp/old.app"),
            Path::new("/tmp/new.app"),
            Path::new("/tmp/out.delta"),
        ) {
            Err(DeltaError::DiffFailed { stderr, .. }) => {
                assert!(stderr.contains("not a bundle"));
            }
            other => panic!("expected DiffFailed, got {other:?}"),
        }
    }
}
