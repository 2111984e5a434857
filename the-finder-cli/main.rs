//! Headless driver for the finder engine.
//!
//! Loads a folder tree from JSON, restores the previous session from the
//! state file, replays a key script and prints the resulting tabs.

mod file_store;
mod render;
mod script;

use std::path::{
  Path,
  PathBuf,
};

use anyhow::{
  Context,
  Result,
};
use clap::Parser;
use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};
use the_finder::{
  Finder,
  FinderConfig,
  FinderEvent,
  store::{
    MemoryFolderStore,
    TreeNode,
  },
};

use crate::{
  file_store::FileKeyValueStore,
  script::Replay,
};

#[derive(Debug, Parser)]
#[command(name = "finder")]
#[command(about = "Replay key scripts against a column folder browser")]
struct Cli {
  /// JSON folder tree; nodes with `children` are folders
  #[arg(long)]
  tree: PathBuf,

  /// Config file (defaults to the platform config dir)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Session state file (defaults to the platform data dir)
  #[arg(long)]
  state: Option<PathBuf>,

  /// Start from an empty session instead of restoring
  #[arg(long)]
  fresh: bool,

  /// Increase log verbosity (-v, -vv)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Keys and pointer steps, e.g. `l j ret click:0:1 crumb:0`
  script: Vec<String>,
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };
  env_logger::Builder::from_default_env()
    .filter_level(level)
    .init();
}

fn default_config_file() -> Result<PathBuf> {
  let strategy = choose_base_strategy().context("unable to find the config directory")?;
  Ok(strategy.config_dir().join("finder").join("config.toml"))
}

fn default_state_file() -> Result<PathBuf> {
  let strategy = choose_base_strategy().context("unable to find the data directory")?;
  Ok(strategy.data_dir().join("finder").join("state.json"))
}

fn load_tree(path: &Path) -> Result<MemoryFolderStore> {
  let raw =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let nodes: Vec<TreeNode> =
    serde_json::from_str(&raw).with_context(|| format!("invalid tree in {}", path.display()))?;
  Ok(MemoryFolderStore::from_tree(nodes))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let config_path = match cli.config {
    Some(path) => path,
    None => default_config_file()?,
  };
  let config = FinderConfig::load_or_default(&config_path)?;
  let state_path = match cli.state {
    Some(path) => path,
    None => default_state_file()?,
  };
  if cli.fresh && state_path.exists() {
    std::fs::remove_file(&state_path)
      .with_context(|| format!("failed to reset {}", state_path.display()))?;
  }

  let store = load_tree(&cli.tree)?;
  let kv = FileKeyValueStore::open(&state_path)?;
  log::debug!("session state in {}", kv.path().display());
  let mut finder = Finder::new(store, Box::new(kv), &config)?;

  let mut replay = Replay::new(config.preview_debounce());
  for (id, report) in finder.mount(replay.now()).await {
    if let Some(err) = report.truncated {
      log::warn!(
        "{id}: restored {}/{} levels ({err})",
        report.restored,
        report.requested
      );
    }
  }

  replay.run(&mut finder, &cli.script).await?;
  for event in &replay.events {
    match event {
      FinderEvent::OpenItem(item) => println!("open {item}"),
      FinderEvent::OpenPalette => println!("palette"),
      FinderEvent::Rejected(err) => println!("rejected: {err}"),
      _ => {},
    }
  }
  print!("{}", render::render(&finder));
  Ok(())
}
