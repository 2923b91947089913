//! Add command

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use sparkcast_core::{DistConfig, DsaKey, Ed25519Key, Publisher, S3Location, SigningCredential};
use sparkcast_schema::{Feed, Platform};

use crate::cmd::print::print_release;
use crate::ui::Output;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// The local file path to the appcast xml
    #[arg(long)]
    pub appcast: PathBuf,

    /// The descriptive (string) version for the new bundle
    #[arg(long)]
    pub version: String,

    /// The build number for the new bundle
    #[arg(long)]
    pub build: i64,

    /// The local file path to the mac app/dmg/zip bundle
    #[arg(long)]
    pub mac_bundle: Option<PathBuf>,

    /// The local file path to the windows msi/exe/zip bundle
    #[arg(long)]
    pub windows_bundle: Option<PathBuf>,

    /// The number of delta updates to generate; without this deltas are NOT generated
    #[arg(long)]
    pub deltas: Option<u32>,

    /// The Ed25519 key used for signing, passed inline (required for mac delta updates)
    #[arg(long)]
    pub eddsa_key: Option<String>,

    /// The local file path to the executable used to generate Ed25519 signatures
    #[arg(long)]
    pub eddsa_generator_path: Option<PathBuf>,

    /// The local file path to the DSA key used for signing (required for windows bundles)
    #[arg(long)]
    pub dsa_key_path: Option<PathBuf>,

    /// The local file path to the executable used to generate DSA signatures
    #[arg(long)]
    pub dsa_generator_path: Option<PathBuf>,

    /// The s3 region (used for url generation)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// The s3 bucket (used for url generation)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// The directory inside the s3 bucket (used for url generation)
    #[arg(long)]
    pub s3_bucket_dir: Option<String>,

    /// The local mirror of the s3 bucket dir (required for automatic delta generation)
    #[arg(long)]
    pub s3_mirror_path: Option<PathBuf>,

    /// The url (without the filename) used for appcast URL generation
    #[arg(long)]
    pub url_prefix: Option<String>,

    /// The local file path to the executable used to generate binary deltas
    #[arg(long)]
    pub delta_generator_path: Option<PathBuf>,

    /// Installer arguments written for windows enclosures
    #[arg(long)]
    pub windows_installer_args: Option<String>,
}

/// Add a signed release to the appcast, optionally with delta updates.
pub fn add(args: &AddArgs) -> Result<()> {
    if args.mac_bundle.is_none() && args.windows_bundle.is_none() {
        bail!("`add` requires '--mac-bundle' and/or '--windows-bundle'");
    }
    if args.eddsa_key.is_none() && args.dsa_key_path.is_none() {
        bail!("`add` requires either '--eddsa-key' and/or '--dsa-key-path'");
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
    if args.url_prefix.is_none() && (args.s3_region.is_none() || args.s3_bucket.is_none()) {
        bail!("`add` requires either '--url-prefix' or '--s3-region' and '--s3-bucket'");
    }
    if args.deltas.is_some() {
        if args.mac_bundle.is_none() {
            bail!("'--deltas' is only available for mac bundles");
        }
        if args.eddsa_key.is_none() {
            bail!(
                "'--deltas' requires an Ed25519 signature. \
                 Please specify one with '--eddsa-key'"
            );
        }
        if args.s3_mirror_path.is_none() {
            bail!(
                "'--deltas' requires a local s3 mirror path. \
                 Please specify one with '--s3-mirror-path'"
            );
        }
    }

    let output = Output::new();

    let mut feed = Feed::load(&args.appcast)
        .with_context(|| format!("Failed to load appcast {}", args.appcast.display()))?;
    if let Some(installer_args) = &args.windows_installer_args {
        feed.set_windows_installer_args(installer_args);
    }

    // --url-prefix takes precedence; the s3 scheme (with its mirror) only
    // applies when no prefix is given
    let dist = if let Some(prefix) = &args.url_prefix {
        DistConfig {
            url_prefix: Some(prefix.clone()),
            ..DistConfig::default()
        }
    } else {
        DistConfig {
            url_prefix: None,
            s3: Some(S3Location {
                region: args.s3_region.clone().unwrap_or_default(),
                bucket: args.s3_bucket.clone().unwrap_or_default(),
                bucket_dir: args.s3_bucket_dir.clone(),
            }),
            local_mirror: args.s3_mirror_path.clone(),
        }
    };
    let publisher = match &args.delta_generator_path {
        Some(generator) => Publisher::new(dist).with_delta_generator(generator.clone()),
        None => Publisher::new(dist),
    };

    let mut release = feed.create_release(&args.version, args.build);

    if let Some(mac_bundle) = &args.mac_bundle {
        if let (Some(key), Some(generator)) = (&args.eddsa_key, &args.eddsa_generator_path) {
            let credential = Ed25519Key {
                key: key.clone(),
                generator: generator.clone(),
            };
            publisher
                .add_enclosure_signed(
                    &mut release,
                    mac_bundle,
                    Platform::MacOs,
                    &SigningCredential::Ed25519(credential.clone()),
                )
                .context("failed to add mac enclosure")?;

            let deltas = args.deltas.unwrap_or(0);
            if deltas >= 1 {
                output.info(&format!("Generating deltas for build {}...", args.build));

                let mut created: u32 = 0;
                let mut source_build = release.version_build() - 1;
                while created < deltas && source_build > 0 {
                    tracing::debug!("Trying delta from build {}", source_build);
                    let generated = publisher.create_delta_for_release(
                        &feed,
                        &mut release,
                        source_build,
                        mac_bundle,
                        Platform::MacOs,
                        &credential,
                    )?;
                    if generated {
                        created += 1;
                    }
                    source_build -= 1;
                }
                tracing::debug!("Generated {} of {} requested deltas", created, deltas);
            }
        } else if let (Some(key_path), Some(generator)) =
            (&args.dsa_key_path, &args.dsa_generator_path)
        {
            publisher
                .add_enclosure_signed(
                    &mut release,
                    mac_bundle,
                    Platform::MacOs,
                    &SigningCredential::Dsa(DsaKey {
                        key_path: key_path.clone(),
                        generator: generator.clone(),
                    }),
                )
                .context("failed to add mac enclosure")?;
        }
    }

    if let (Some(windows_bundle), Some(key_path), Some(generator)) = (
        &args.windows_bundle,
        &args.dsa_key_path,
        &args.dsa_generator_path,
    ) {
        publisher
            .add_enclosure_signed(
                &mut release,
                windows_bundle,
                Platform::Windows,
                &SigningCredential::Dsa(DsaKey {
                    key_path: key_path.clone(),
                    generator: generator.clone(),
                }),
            )
            .context("failed to add windows enclosure")?;
    }

    output.info("Saving updated appcast file...");
    feed.add_release(release)
        .context("failed to add release to appcast")?;
    feed.save(&args.appcast)
        .context("failed to save appcast xml")?;

    if let Some(added) = feed.releases().next() {
        print_release(added);
    }

    output.success(&format!(
        "Added build {} to {}",
        args.build,
        args.appcast.display()
    ));
    Ok(())
}
