use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use library::{ClusterStrategy, DuplicateOptions, Library, MatchPolicy, StaticRoot};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Usage: library_sync [MUSIC_ROOT] [INDEX_PATH] [THRESHOLD]
///
/// With a threshold, duplicate groups (title and artist) are printed after
/// the sync. `DUPLICATE_STRATEGY=connected` switches the grouping.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let index_path = args
        .next()
        .or_else(|| env::var("INDEX_PATH").ok())
        .unwrap_or_else(|| "data/library.redb".to_string());
    let threshold = match args.next() {
        Some(value) => Some(value.parse::<f64>()?),
        None => None,
    };

    let library = Library::open(
        &PathBuf::from(&index_path),
        Arc::new(StaticRoot::new(music_root)),
    )?;
    let report = library.sync()?;
    println!(
        "Catalog: {} records ({} new, {} skipped)",
        report.records.len(),
        report.inserted,
        report.skipped.len()
    );

    if let Some(threshold) = threshold {
        let strategy = match env::var("DUPLICATE_STRATEGY").as_deref() {
            Ok("connected") => ClusterStrategy::Connected,
            _ => ClusterStrategy::Star,
        };
        let policy = MatchPolicy {
            match_tags: true,
            match_filename: false,
        };
        let options = DuplicateOptions::new(threshold, policy).with_strategy(strategy);
        let groups = library.find_duplicates(&options)?;
        info!("Using {:?} grouping", strategy);
        for (index, group) in groups.iter().enumerate() {
            println!("Group {} ({} records)", index + 1, group.len());
            for record in &group.records {
                println!(
                    "  {} | {} | {}",
                    record.artist.as_deref().unwrap_or("-"),
                    record.title.as_deref().unwrap_or("-"),
                    record.filepath
                );
            }
        }
    }

    Ok(())
}
