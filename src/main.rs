use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use setlist_curator::catalog::CollectionStore;
use setlist_curator::config::EngineConfig;
use setlist_curator::creator::SetlistCreator;
use setlist_curator::dedup::DedupCache;
use setlist_curator::housekeeping::Housekeeper;
use setlist_curator::memory::Snapshot;
use setlist_curator::models::{ResolutionOptions, ResolutionStats, ResultKind};
use setlist_curator::progress::{create_song_bar, create_spinner, format_duration, log_progress, set_log_only};
use setlist_curator::ranking::Ranker;
use setlist_curator::retry::Cancellation;

#[derive(Parser)]
#[command(name = "setlist-curator")]
#[command(about = "Turn concert setlists into catalog collections, offline against a JSON snapshot")]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide progress bars and report progress through the log
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one setlist and create (or reuse) its collection
    Resolve(ResolveArgs),
    /// Run one housekeeping cycle: evict dead collections, rebuild the cache
    Housekeep {
        /// JSON snapshot of setlists, catalog and owned collections
        #[arg(long)]
        snapshot: PathBuf,

        /// Keep running a cycle every configured interval
        #[arg(long)]
        schedule: bool,
    },
}

#[derive(Args)]
struct ResolveArgs {
    /// JSON snapshot of setlists, catalog and owned collections
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long)]
    setlist: String,

    /// Search tapes by the performing artist
    #[arg(long)]
    include_tapes_main: bool,

    /// Search tapes by other artists
    #[arg(long)]
    include_tapes_other: bool,

    /// Search individual medley parts
    #[arg(long)]
    include_medley_parts: bool,

    /// Do not fall back to the original recording of covers
    #[arg(long)]
    no_cover_originals: bool,

    #[arg(long)]
    no_image: bool,

    /// Only issue field-scoped queries
    #[arg(long)]
    strict_only: bool,

    /// Write resolution stats as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Write the full response as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

impl ResolveArgs {
    /// Flags given on the command line switch on top of the configured defaults.
    fn options(&self, defaults: ResolutionOptions) -> ResolutionOptions {
        ResolutionOptions {
            include_tapes_main: defaults.include_tapes_main || self.include_tapes_main,
            include_tapes_other: defaults.include_tapes_other || self.include_tapes_other,
            include_medley_parts: defaults.include_medley_parts || self.include_medley_parts,
            include_cover_originals: defaults.include_cover_originals && !self.no_cover_originals,
            attach_cover_image: defaults.attach_cover_image && !self.no_image,
            strict_search_only: defaults.strict_search_only || self.strict_only,
        }
    }
}

fn resolve(config: &EngineConfig, args: &ResolveArgs) -> Result<()> {
    let start = Instant::now();
    let snapshot = Snapshot::load(&args.snapshot)?;
    let (source, catalog, store) = snapshot.into_parts();
    let store = Arc::new(store);

    let cache = Arc::new(DedupCache::new());
    cache.rebuild(&store.list_owned().context("Failed to list owned collections")?);

    let creator = SetlistCreator::new(Arc::new(source), Arc::new(catalog), Arc::clone(&store), cache)
        .with_ranker(Ranker::new(config.ranking_policy()))
        .with_retry_policy(config.retry_policy());

    let options = args.options(config.options);
    let pb = create_song_bar(0, &args.setlist);
    let response = creator
        .create_with(&args.setlist, options, &Cancellation::never(), |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            log_progress("resolve", done, total, 5);
        })
        .with_context(|| format!("Failed to create collection for setlist {}", args.setlist))?;
    pb.finish_and_clear();

    println!(
        "\n{} at {} ({})",
        response.setlist.artist_name,
        response.setlist.venue_and_city(),
        response.setlist.event_date
    );
    println!("{:-<80}", "");
    for outcome in &response.outcomes {
        let song = outcome.song();
        match outcome.track() {
            Some(track) => println!(
                "{:>3}. {:<32} → {} by {} [{:?}]",
                song.index,
                song.name,
                track.name,
                track.primary_artist(),
                outcome.kind()
            ),
            None if outcome.kind() == ResultKind::Skipped => println!("{:>3}. {:<32}   (skipped)", song.index, song.name),
            None => println!("{:>3}. {:<32}   (not found)", song.index, song.name),
        }
    }

    let mut stats = ResolutionStats::from_outcomes(&response.outcomes);
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("resolve");
    if let Some(path) = &args.stats {
        stats.write_to_file(path).context("Failed to write stats")?;
    }
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&response)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("\n{:=<60}", "");
    println!(
        "Collection {} ({})",
        response.collection_id,
        if response.reused { "reused" } else { "created" }
    );
    println!("  Matched: {}/{} ({:.1}%)", stats.resolved(), stats.total_songs, stats.match_rate());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");
    Ok(())
}

fn housekeep(config: &EngineConfig, snapshot: &Path, schedule: bool) -> Result<()> {
    let (_, _, store) = Snapshot::load(snapshot)?.into_parts();
    let keeper = Housekeeper::new(
        Arc::new(store),
        Arc::new(DedupCache::new()),
        config.quota_policy(),
        config.housekeeping.eviction_workers,
    )?;

    if schedule {
        let interval = config.housekeeping_interval();
        println!("Housekeeping every {}", format_duration(interval));
        keeper.run_schedule(interval, &Cancellation::never());
        return Ok(());
    }

    let spinner = create_spinner("Housekeeping");
    let report = keeper.run_cycle().context("Housekeeping cycle failed")?;
    spinner.finish_and_clear();

    println!("\n{:=<60}", "");
    println!("Housekeeping complete!");
    println!("  Scanned: {}", report.scanned);
    println!("  Evicted: {}", report.evicted.len());
    for failure in &report.failures {
        println!("  Failed:  {}", failure);
    }
    println!("  Cached:  {}", report.cached);
    println!("  Elapsed: {}", format_duration(report.elapsed));
    println!("{:=<60}", "");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    set_log_only(cli.log_only);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match &cli.command {
        Command::Resolve(args) => resolve(&config, args),
        Command::Housekeep { snapshot, schedule } => housekeep(&config, snapshot, *schedule),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "setlist-curator",
            "--log-only",
            "resolve",
            "--snapshot",
            "snap.json",
            "--setlist",
            "63de4613",
            "--strict-only",
            "--no-image",
        ])
        .unwrap();
        assert!(cli.log_only);
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        let options = args.options(ResolutionOptions::default());
        assert!(options.strict_search_only);
        assert!(!options.attach_cover_image);
        assert!(options.include_cover_originals);
        assert!(!options.include_tapes_main);
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
