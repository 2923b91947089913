//! Signature generation via the external Sparkle signing tools.
//!
//! sparkcast never touches key material beyond handing it to the signer and
//! never verifies signatures; it runs the tool, blocks until it exits, and
//! parses its stdout. DSA signers are invoked as `<signer> <file> <key-file>`
//! and print the signature alone; Ed25519 signers are invoked as
//! `<signer> -s <key> <file>` and print it as the second quoted token
//! (`sparkle:edSignature="..." length="..."`).

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

use sparkcast_schema::{Signature, SignatureKind};

/// Errors from running an external signer.
#[derive(Debug, Error)]
pub enum SignError {
    /// The signer executable does not exist.
    #[error("signature generator not found: {0}")]
    GeneratorMissing(PathBuf),

    /// The file to sign does not exist.
    #[error("file to sign not found: {0}")]
    InputMissing(PathBuf),

    /// The DSA key file does not exist.
    #[error("signing key file not found: {0}")]
    KeyMissing(PathBuf),

    /// The inline Ed25519 key is empty.
    #[error("signing key is empty")]
    EmptyKey,

    /// The signer could not be started.
    #[error("failed to run {generator}: {source}")]
    Spawn {
        /// Signer executable that failed to start.
        generator: PathBuf,
        /// Underlying launch error.
        source: std::io::Error,
    },

    /// The signer exited unsuccessfully.
    #[error("signature generator exited with {status}: {stderr}")]
    GeneratorFailed {
        /// Exit status of the signer.
        status: ExitStatus,
        /// Captured stderr, for the operator.
        stderr: String,
    },

    /// The signer succeeded but its stdout did not contain a signature.
    #[error("could not parse signer output: {0:?}")]
    UnparsableOutput(String),
}

/// DSA credential: a key file on disk plus the signer executable.
#[derive(Debug, Clone)]
pub struct DsaKey {
    /// Path to the DSA private key file.
    pub key_path: PathBuf,
    /// Path to the DSA signature generator.
    pub generator: PathBuf,
}

impl DsaKey {
    /// Sign `file`, returning the signature printed by the generator with
    /// all whitespace stripped.
    ///
    /// # Errors
    ///
    /// Any [`SignError`]; preconditions (generator, input, key file) are
    /// checked before the tool runs.
    pub fn sign(&self, file: &Path) -> Result<Signature, SignError> {
        if !self.generator.exists() {
            return Err(SignError::GeneratorMissing(self.generator.clone()));
        }
        if !file.exists() {
            return Err(SignError::InputMissing(file.to_path_buf()));
        }
        if !self.key_path.exists() {
            return Err(SignError::KeyMissing(self.key_path.clone()));
        }

        debug!(
            generator = %self.generator.display(),
            file = %file.display(),
            "running DSA signature generator"
        );
        let output = Command::new(&self.generator)
            .arg(file)
            .arg(&self.key_path)
            .output()
            .map_err(|source| SignError::Spawn {
                generator: self.generator.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(SignError::GeneratorFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let value: String = raw.split_whitespace().collect();
        if value.is_empty() {
            return Err(SignError::UnparsableOutput(raw.into_owned()));
        }
        Ok(Signature::new(SignatureKind::Dsa, value))
    }
}

/// Ed25519 credential: the key itself, passed inline, plus the signer
/// executable.
#[derive(Debug, Clone)]
pub struct Ed25519Key {
    /// Base64 private key, passed to the generator as an argument.
    pub key: String,
    /// Path to the Ed25519 signature generator.
    pub generator: PathBuf,
}

impl Ed25519Key {
    /// Sign `file`, extracting the signature from the generator's
    /// `sparkle:edSignature="..."` output line.
    ///
    /// # Errors
    ///
    /// Any [`SignError`]. The output must contain exactly two quoted values;
    /// anything else is [`SignError::UnparsableOutput`].
    pub fn sign(&self, file: &Path) -> Result<Signature, SignError> {
        if !self.generator.exists() {
            return Err(SignError::GeneratorMissing(self.generator.clone()));
        }
        if !file.exists() {
            return Err(SignError::InputMissing(file.to_path_buf()));
        }
        if self.key.is_empty() {
            return Err(SignError::EmptyKey);
        }

        debug!(
            generator = %self.generator.display(),
            file = %file.display(),
            "running Ed25519 signature generator"
        );
        let output = Command::new(&self.generator)
            .arg("-s")
            .arg(&self.key)
            .arg(file)
            .output()
            .map_err(|source| SignError::Spawn {
                generator: self.generator.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(SignError::GeneratorFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let parts: Vec<&str> = collapsed.split('"').collect();
        if parts.len() != 5 || parts[1].is_empty() {
            return Err(SignError::UnparsableOutput(raw.into_owned()));
        }
        Ok(Signature::new(SignatureKind::Ed25519, parts[1]))
    }
}

/// Either credential, for call sites that accept both kinds.
#[derive(Debug, Clone)]
pub enum SigningCredential {
    /// DSA key file and generator.
    Dsa(DsaKey),
    /// Inline Ed25519 key and generator.
    Ed25519(Ed25519Key),
}

impl SigningCredential {
    /// Scheme this credential produces.
    pub fn kind(&self) -> SignatureKind {
        match self {
            Self::Dsa(_) => SignatureKind::Dsa,
            Self::Ed25519(_) => SignatureKind::Ed25519,
        }
    }

    /// Sign `file` with whichever tool this credential wraps.
    ///
    /// # Errors
    ///
    /// Any [`SignError`] from the underlying signer.
    pub fn sign(&self, file: &Path) -> Result<Signature, SignError> {
        match self {
            Self::Dsa(key) => key.sign(file),
            Self::Ed25519(key) => key.sign(file),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"artifact bytes").unwrap();
        path
    }

    #[test]
    fn dsa_signature_is_stdout_with_whitespace_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(
            dir.path(),
            "sign_dsa",
            "printf ' MC0CFQ\\n CMgoM2\\n Za9zQQ== \\n'",
        );
        let key = DsaKey {
            key_path: write_file(dir.path(), "dsa_priv.pem"),
            generator,
        };

        let signature = key.sign(&write_file(dir.path(), "App.exe")).unwrap();
        assert_eq!(signature.kind, SignatureKind::Dsa);
        assert_eq!(signature.value, "MC0CFQCMgoM2Za9zQQ==");
    }

    #[test]
    fn ed25519_signature_is_the_second_quoted_token() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(
            dir.path(),
            "sign_update",
            r#"printf 'sparkle:edSignature="ZWQtc2lnbmF0dXJl" length="14"\n'"#,
        );
        let key = Ed25519Key {
            key: "a2V5".to_string(),
            generator,
        };

        let signature = key.sign(&write_file(dir.path(), "App.dmg")).unwrap();
        assert_eq!(signature.kind, SignatureKind::Ed25519);
        assert_eq!(signature.value, "ZWQtc2lnbmF0dXJl");
    }

    #[test]
    fn ed25519_rejects_output_without_two_quoted_values() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(dir.path(), "sign_update", "printf 'no quotes here\\n'");
        let key = Ed25519Key {
            key: "a2V5".to_string(),
            generator,
        };

        assert!(matches!(
            key.sign(&write_file(dir.path(), "App.dmg")),
            Err(SignError::UnparsableOutput(_))
        ));
    }

    #[test]
    fn generator_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let generator = write_script(dir.path(), "sign_update", "echo 'bad key' >&2; exit 3");
        let key = Ed25519Key {
            key: "a2V5".to_string(),
            generator,
        };

        match key.sign(&write_file(dir.path(), "App.dmg")) {
            Err(SignError::GeneratorFailed { stderr, .. }) => {
                assert!(stderr.contains("bad key"));
            }
            other => panic!("expected GeneratorFailed, got {other:?}"),
        }
    }

    #[test]
    fn preconditions_are_checked_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), "App.dmg");

        let missing_generator = Ed25519Key {
            key: "a2V5".to_string(),
            generator: dir.path().join("no-such-tool"),
        };
        assert!(matches!(
            missing_generator.sign(&input),
            Err(SignError::GeneratorMissing(_))
        ));

        let generator = write_script(dir.path(), "sign_update", "exit 0");
        let empty_key = Ed25519Key {
            key: String::new(),
            generator: generator.clone(),
        };
        assert!(matches!(empty_key.sign(&input), Err(SignError::EmptyKey)));

        let dsa = DsaKey {
            key_path: dir.path().join("no-such-key.pem"),
            generator,
        };
        assert!(matches!(dsa.sign(&input), Err(SignError::KeyMissing(_))));

        let generator = write_script(dir.path(), "sign_dsa", "exit 0");
        let dsa = DsaKey {
            key_path: write_file(dir.path(), "dsa_priv.pem"),
            generator,
        };
        assert!(matches!(
            dsa.sign(&dir.path().join("no-such-bundle.dmg")),
            Err(SignError::InputMissing(_))
        ));
    }
}
