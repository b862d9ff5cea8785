use anyhow::Result;

use crate::copilot::Copilot;
use crate::mirror::MirrorStatus;

pub async fn list_sources(copilot: &Copilot) -> Result<()> {
    let summaries = copilot.sources().await?;
    if summaries.is_empty() {
        println!("No sources indexed.");
        return Ok(());
    }

    println!("{:<12} {:>7}  {:<20} NAME", "TYPE", "CHUNKS", "CREATED");
    for s in summaries {
        println!(
            "{:<12} {:>7}  {:<20} {}",
            s.source_type.as_str(),
            s.chunk_count,
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            s.name
        );
    }
    Ok(())
}

pub fn print_mirror_status(copilot: &Copilot) -> Result<()> {
    match copilot.mirror_status()? {
        MirrorStatus::Unconfigured => println!("Mirror: NOT CONFIGURED (set [mirror] root)"),
        MirrorStatus::Missing { root } => {
            println!("Mirror: MISSING (root does not exist: {})", root.display())
        }
        MirrorStatus::Ready { root, assets } => {
            println!("Mirror: OK ({} assets in {})", assets, root.display())
        }
    }
    Ok(())
}
