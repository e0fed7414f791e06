use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::autopilot::Autopilot;
use crate::config::EngineConfig;
use crate::content::Catalog;
use crate::dice::Dice;
use crate::run::Rules;
use crate::save::MemoryStore;
use crate::session::{Session, SessionEnd};

const SLOT: &str = "sim";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SimConfig {
    pub runs: u32,
    /// Run `i` uses `seed + i`.
    pub seed: u64,
    /// Rooms per run before the autopilot stops.
    pub max_rooms: u64,
    pub config_path: Option<String>,
    pub content_dir: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            runs: 100,
            seed: 12345,
            max_rooms: 200,
            config_path: None,
            content_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RunSummary {
    pub seed: u64,
    pub floor: u32,
    pub rooms: u64,
    pub died: bool,
    pub coins: u64,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SimSummary {
    pub runs: u32,
    pub deaths: u32,
    pub avg_floor: f64,
    pub max_floor: u32,
    pub avg_coins: f64,
    pub avg_rooms: f64,
    /// Runs ending on each floor.
    pub floors: BTreeMap<u32, u32>,
}

/// Parse balance overrides: JSON when `path` says so, YAML otherwise.
pub fn parse_config(path: &str, text: &str) -> Result<EngineConfig> {
    let config = if path.ends_with(".json") {
        EngineConfig::from_json(text).with_context(|| format!("parsing {path}"))?
    } else {
        EngineConfig::from_yaml(text).with_context(|| format!("parsing {path}"))?
    };
    Ok(config)
}

/// Validated rules from `config` and content from `content_dir`, falling
/// back to the built-in tables.
pub fn build_rules(config: EngineConfig, content_dir: Option<&Path>) -> Result<Rules> {
    let catalog = match content_dir {
        Some(dir) => Catalog::from_yaml_dir(dir)
            .with_context(|| format!("loading content from {}", dir.display()))?,
        None => Catalog::builtin().context("loading built-in content")?,
    };
    Rules::new(config, catalog).context("invalid balance config")
}

pub fn load_rules(config_path: Option<&str>, content_dir: Option<&str>) -> Result<Rules> {
    let config = match config_path {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
            parse_config(path, &text)?
        }
        None => EngineConfig::default(),
    };
    build_rules(config, content_dir.map(Path::new))
}

/// Play one seeded run on the autopilot, in memory.
pub fn simulate_run(rules: &Rules, seed: u64, max_rooms: u64) -> Result<RunSummary> {
    let store = MemoryStore::new();
    let mut session = Session::fresh(rules, &store, SLOT, Dice::from_seed(seed))?;
    let mut pilot = Autopilot::new(Some(max_rooms));
    let end = session.play(&mut pilot)?;
    let run = session.run();
    Ok(RunSummary {
        seed,
        floor: run.floor,
        rooms: pilot.rooms,
        died: end == SessionEnd::Died,
        coins: run.coins,
        level: run.party.members.iter().map(|m| m.level).max().unwrap_or(1),
    })
}

pub fn simulate_runs(cfg: SimConfig) -> Result<SimSummary> {
    let rules = load_rules(cfg.config_path.as_deref(), cfg.content_dir.as_deref())?;
    simulate_with(&rules, &cfg)
}

/// Like `simulate_runs`, with the rules already loaded.
pub fn simulate_with(rules: &Rules, cfg: &SimConfig) -> Result<SimSummary> {
    if cfg.runs == 0 {
        bail!("runs must be at least 1");
    }
    let mut runs = Vec::with_capacity(cfg.runs as usize);
    for i in 0..cfg.runs {
        let seed = cfg.seed.wrapping_add(u64::from(i));
        let run = simulate_run(rules, seed, cfg.max_rooms)
            .with_context(|| format!("run {i} (seed {seed})"))?;
        runs.push(run);
    }
    Ok(summarize(&runs))
}

pub fn summarize(runs: &[RunSummary]) -> SimSummary {
    let n = runs.len().max(1) as f64;
    let mut floors = BTreeMap::new();
    for r in runs {
        *floors.entry(r.floor).or_insert(0) += 1;
    }
    SimSummary {
        runs: runs.len() as u32,
        deaths: runs.iter().filter(|r| r.died).count() as u32,
        avg_floor: runs.iter().map(|r| f64::from(r.floor)).sum::<f64>() / n,
        max_floor: runs.iter().map(|r| r.floor).max().unwrap_or(0),
        avg_coins: runs.iter().map(|r| r.coins as f64).sum::<f64>() / n,
        avg_rooms: runs.iter().map(|r| r.rooms as f64).sum::<f64>() / n,
        floors,
    }
}
