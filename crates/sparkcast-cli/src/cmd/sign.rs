//! Sign command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use sparkcast_core::{DsaKey, Ed25519Key, SigningCredential};
use sparkcast_schema::Signature;

#[derive(Debug, Args)]
pub struct SignArgs {
    /// The local file path to the mac app/dmg/zip bundle
    #[arg(long)]
    pub mac_bundle: Option<PathBuf>,

    /// The local file path to the windows msi/exe/zip bundle
    #[arg(long)]
    pub windows_bundle: Option<PathBuf>,

    /// The Ed25519 key used for signing (passed inline, not by file path)
    #[arg(long)]
    pub eddsa_key: Option<String>,

    /// The local file path to the executable used to generate Ed25519 signatures
    #[arg(long)]
    pub eddsa_generator_path: Option<PathBuf>,

    /// The local file path to the DSA key used for signing
    #[arg(long)]
    pub dsa_key_path: Option<PathBuf>,

    /// The local file path to the executable used to generate DSA signatures
    #[arg(long)]
    pub dsa_generator_path: Option<PathBuf>,
}

/// Sign bundles and print their signatures.
pub fn sign(args: &SignArgs) -> Result<()> {
    if args.mac_bundle.is_none() && args.windows_bundle.is_none() {
        bail!("`sign` requires '--mac-bundle' and/or '--windows-bundle'");
    }
    if args.eddsa_key.is_none() && args.dsa_key_path.is_none() {
        bail!("`sign` requires either '--eddsa-key' and/or '--dsa-key-path'");
    }
    if args.windows_bundle.is_some() && args.dsa_key_path.is_none() {
        bail!("Windows bundles require a DSA signature. Please specify one with '--dsa-key-path'");
    }
    if args.dsa_key_path.is_some() && args.dsa_generator_path.is_none() {
        bail!(
            "'--dsa-key-path' requires a path to a DSA signature generator. \
             Please specify one with '--dsa-generator-path'"
        );
    }
    if args.eddsa_key.is_some() && args.eddsa_generator_path.is_none() {
        bail!(
            "'--eddsa-key' requires a path to an Ed25519 signature generator. \
             Please specify one with '--eddsa-generator-path'"
        );
    }

    if let Some(bundle) = &args.mac_bundle {
        let credential = mac_credential(args)?;
        let signature = credential
            .sign(bundle)
            .with_context(|| format!("Failed to sign {}", bundle.display()))?;
        print_signature(bundle, &signature);
    }

    if let (Some(bundle), Some(key_path), Some(generator)) = (
        &args.windows_bundle,
        &args.dsa_key_path,
        &args.dsa_generator_path,
    ) {
        let signature = DsaKey {
            key_path: key_path.clone(),
            generator: generator.clone(),
        }
        .sign(bundle)
        .with_context(|| format!("Failed to sign {}", bundle.display()))?;
        print_signature(bundle, &signature);
    }

    Ok(())
}

/// Mac bundles prefer Ed25519 and fall back to DSA.
fn mac_credential(args: &SignArgs) -> Result<SigningCredential> {
    if let (Some(key), Some(generator)) = (&args.eddsa_key, &args.eddsa_generator_path) {
        return Ok(SigningCredential::Ed25519(Ed25519Key {
            key: key.clone(),
            generator: generator.clone(),
        }));
    }
    if let (Some(key_path), Some(generator)) = (&args.dsa_key_path, &args.dsa_generator_path) {
        return Ok(SigningCredential::Dsa(DsaKey {
            key_path: key_path.clone(),
            generator: generator.clone(),
        }));
    }
    bail!("`sign` requires either '--eddsa-key' and/or '--dsa-key-path'")
}

fn print_signature(bundle: &Path, signature: &Signature) {
    let name = bundle
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    println!();
    println!(
        "{name} [{}]: {}",
        signature.kind.description(),
        signature.value
    );
}
