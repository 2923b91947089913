//! Print command

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Table, presets};

use sparkcast_schema::{Feed, Platform, Release};

/// Print every release in an appcast.
pub fn print(appcast: &Path) -> Result<()> {
    let feed = Feed::load(appcast)
        .with_context(|| format!("Failed to load appcast {}", appcast.display()))?;

    let releases: Vec<&Release> = feed.releases().collect();
    if releases.is_empty() {
        println!();
        println!("  No releases in {}", appcast.display());
        return Ok(());
    }

    println!();
    println!("{}", feed.title());

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["Build", "Version", "Published", "Platforms", "Deltas"]);

    for release in &releases {
        let platforms: Vec<&str> = release
            .enclosures()
            .iter()
            .filter_map(|enclosure| enclosure.platform.map(Platform::description))
            .collect();

        table.add_row(vec![
            release.version_build().to_string(),
            release.version_description().to_string(),
            release
                .published_string()
                .unwrap_or_else(|| "-".to_string()),
            platforms.join(", "),
            release.deltas().len().to_string(),
        ]);
    }

    println!("{table}");

    for release in releases {
        print_release(release);
    }
    Ok(())
}

/// Plain per-release summary, also shown after `add`.
pub(crate) fn print_release(release: &Release) {
    println!();
    println!(
        "{} {} ({})",
        release.title(),
        release.version_description(),
        release.version_build()
    );
    println!(
        "  Published: {}",
        release
            .published_string()
            .unwrap_or_else(|| "unpublished".to_string())
    );
    println!("  Enclosures");
    for enclosure in release.enclosures() {
        let platform = enclosure
            .platform
            .map_or("unknown", Platform::description);
        println!("    {platform:>7}:  {}", enclosure.url);
    }
    if !release.deltas().is_empty() {
        println!("  Deltas");
        for delta in release.deltas() {
            let source = delta.delta_from.unwrap_or(-1);
            println!("    {source:>7}:  {}", delta.url);
        }
    }
}
