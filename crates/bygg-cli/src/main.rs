//! `bygg` command-line binary.
//!
//! Reads `bygg.toml` (or the path given with `--config`), opens the SQLite
//! store, and runs one fusion stage per invocation. A typical run:
//!
//! ```text
//! bygg import sefrak.geojson osm.geojson ml_1880.geojson
//! bygg match --pair sefrak:osm --pair ml_1880:osm
//! bygg estimate
//! bygg heuristic
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use bygg_core::store::BuildingStore;
use bygg_fusion::{SourcePair, SourceRegistry};
use bygg_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{Settings, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Bygg building-date fusion engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "bygg.toml")]
  config: PathBuf,

  /// SQLite store path; overrides `store_path` from the configuration.
  #[arg(long)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load normalized GeoJSON feature collections.
  Import {
    #[arg(required = true)]
    files: Vec<PathBuf>,
  },
  /// Match buildings across sources and propagate evidence.
  Match {
    /// Source pair written `first:second`. May be repeated.
    #[arg(long = "pair", required = true)]
    pairs: Vec<SourcePair>,
  },
  /// Derive estimates from each building's own evidence.
  Estimate,
  /// Estimate the remaining buildings heuristically.
  Heuristic,
  /// Print store statistics as JSON.
  Stats,
  /// Print one building with its evidence and estimate as JSON.
  Show { building_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)?;
  let fusion = settings.fusion();
  let store_path = expand_tilde(cli.store.as_ref().unwrap_or(&settings.store_path));

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(path = ?store_path, "store opened");

  match cli.command {
    Command::Import { files } => {
      let registry =
        SourceRegistry::from_profiles(&fusion.sources).context("invalid source profiles")?;
      let summary = bygg_fusion::import_sources(&store, &registry, &files)
        .await
        .context("import failed")?;
      tracing::info!(%summary, "import finished");
      println!("{summary}");
    }
    Command::Match { pairs } => {
      let summary = bygg_fusion::match_sources(&store, &fusion, &pairs)
        .await
        .context("matching failed")?;
      tracing::info!(%summary, "match finished");
      println!("{summary}");
    }
    Command::Estimate => {
      let summary = bygg_fusion::calculate_estimates(&store)
        .await
        .context("estimation failed")?;
      tracing::info!(%summary, "estimate finished");
      println!("{summary}");
    }
    Command::Heuristic => {
      let summary = bygg_fusion::estimate_dates(&store, &fusion)
        .await
        .context("heuristic estimation failed")?;
      tracing::info!(%summary, "heuristic finished");
      println!("{summary}");
    }
    Command::Stats => {
      let stats = store.get_stats().await.context("failed to read statistics")?;
      println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Command::Show { building_id } => {
      let view = store
        .materialize(&building_id)
        .await
        .with_context(|| format!("failed to load {building_id}"))?
        .with_context(|| format!("no building with id {building_id}"))?;
      println!("{}", serde_json::to_string_pretty(&view)?);
    }
  }

  Ok(())
}
