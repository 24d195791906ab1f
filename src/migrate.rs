//! One-shot migration of inline base64 idea images into creative_images/

use crate::config::Paths;
use crate::store::Store;
use anyhow::{bail, Context};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub fn migrate_creative_images(paths: Paths) -> anyhow::Result<MigrationReport> {
    let ideas_file = paths.creative_ideas_file();
    if !ideas_file.exists() {
        bail!("creative ideas file not found: {}", ideas_file.display());
    }
    std::fs::create_dir_all(&paths.creative_images)
        .with_context(|| format!("creating {}", paths.creative_images.display()))?;

    let store = Store::new(paths);
    info!(count = store.ideas().len(), "Migrating creative idea images");
    let (migrated, skipped, errors) = store
        .migrate_idea_images()
        .context("writing creative ideas")?;

    let report = MigrationReport {
        migrated,
        skipped,
        errors,
    };
    info!(?report, "Migration finished");
    Ok(report)
}
