use anyhow::Context;
use clap::Parser;
use encoding_rs::Encoding;
use engine::api::{self, SimConfig, SimSummary};
use engine::EngineConfig;
use std::{fs, path::Path, path::PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "simulate-runs")]
#[command(about = "Monte Carlo balance sim: many autopilot runs")]
struct Args {
    /// Number of runs
    #[arg(long, default_value_t = 100)]
    runs: u32,

    /// RNG base seed (run i uses seed+i)
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Rooms per run before the autopilot stops
    #[arg(long, default_value_t = 200)]
    max_rooms: u64,

    /// Balance overrides (YAML, or JSON by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with monsters/items/skills/party YAML tables
    #[arg(long)]
    content: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log more to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_text_auto(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if let Some((enc, bom_len)) = Encoding::for_bom(&bytes) {
        let (cow, _, _) = enc.decode(&bytes[bom_len..]);
        Ok(cow.into_owned())
    } else {
        Ok(String::from_utf8(bytes)?)
    }
}

fn print_text(args: &Args, s: &SimSummary) {
    println!("simulate-runs results");
    println!("---------------------");
    println!("runs:               {}", s.runs);
    println!("base seed:          {}", args.seed);
    println!("room cap:           {}", args.max_rooms);
    println!();
    println!(
        "death rate:         {:.1}%",
        f64::from(s.deaths) / f64::from(s.runs.max(1)) * 100.0
    );
    println!("avg floor:          {:.2}", s.avg_floor);
    println!("max floor:          {}", s.max_floor);
    println!("avg rooms:          {:.1}", s.avg_rooms);
    println!("avg coins:          {:.1}", s.avg_coins);
    println!();
    println!("runs ending on each floor:");
    for (floor, count) in &s.floors {
        println!("  floor {floor:>3}: {count}");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => api::parse_config(&path.to_string_lossy(), &read_text_auto(path)?)?,
        None => EngineConfig::default(),
    };
    let rules = api::build_rules(config, args.content.as_deref())?;
    let cfg = SimConfig {
        runs: args.runs,
        seed: args.seed,
        max_rooms: args.max_rooms,
        ..SimConfig::default()
    };
    let summary = api::simulate_with(&rules, &cfg)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&args, &summary);
    }
    Ok(())
}
