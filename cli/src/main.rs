use std::fs;
use std::io::{self, BufRead, Lines, StdinLock, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use encoding_rs::Encoding;
use engine::api;
use engine::economy::ShopOffer;
use engine::session::{CombatView, ExploreCommand, ShopCommand};
use engine::{
    roll_dice, Command, ContentIssue, Dice, EngineConfig, Frontend, ItemKind, RoomEvent, Rules,
    RunState, SaveStore, Session, SessionEnd, Stat, ValidationError,
};
use tracing::Level;

#[derive(Subcommand)]
enum Cmd {
    /// Play the run in a slot, starting one if the slot is empty
    Play {
        #[arg(long, default_value = "main")]
        slot: String,
        /// Name of the character to lead with
        #[arg(long)]
        lead: Option<String>,
    },
    /// Start a fresh run in a slot, replacing what was there
    New {
        #[arg(long, default_value = "main")]
        slot: String,
    },
    /// Print a slot's save document
    Show {
        #[arg(long, default_value = "main")]
        slot: String,
    },
    /// List save slots
    List,
    /// Delete a save slot
    Delete {
        #[arg(long)]
        slot: String,
    },
    /// Roll a dice notation (NdM) several times
    Roll {
        notation: String,
        /// Number of rolls
        #[arg(long, default_value_t = 5)]
        times: u32,
    },
}

#[derive(Parser)]
#[command(name = "crawl")]
#[command(about = "Turn-based dungeon crawl")]
struct Cli {
    /// Directory holding the save slots
    #[arg(long, global = true, default_value = "saves")]
    save_dir: PathBuf,

    /// Balance overrides (YAML, or JSON by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with monsters/items/skills/party YAML tables
    #[arg(long, global = true)]
    content: Option<PathBuf>,

    /// RNG seed; `roll` defaults to 42, play and new to entropy
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_text_auto(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if let Some((enc, bom_len)) = Encoding::for_bom(&bytes) {
        let (cow, _, _) = enc.decode(&bytes[bom_len..]);
        Ok(cow.into_owned())
    } else {
        Ok(String::from_utf8(bytes)?)
    }
}

fn load_rules(cli: &Cli) -> Result<Rules> {
    let config = match &cli.config {
        Some(path) => api::parse_config(&path.to_string_lossy(), &read_text_auto(path)?)?,
        None => EngineConfig::default(),
    };
    api::build_rules(config, cli.content.as_deref())
}

fn dice(seed: Option<u64>) -> Dice {
    seed.map_or_else(Dice::from_entropy, Dice::from_seed)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.cmd {
        Cmd::Roll { notation, times } => {
            let mut dice = Dice::from_seed(cli.seed.unwrap_or(42));
            for _ in 0..*times {
                let total =
                    roll_dice(&mut dice, notation).with_context(|| format!("rolling {notation}"))?;
                println!("{total}");
            }
        }
        Cmd::List => {
            let store = SaveStore::open(&cli.save_dir)?;
            for slot in store.list()? {
                println!("{slot}");
            }
        }
        Cmd::Delete { slot } => {
            let store = SaveStore::open(&cli.save_dir)?;
            if store.delete(slot)? {
                println!("deleted {slot}");
            } else {
                bail!("slot {slot} does not exist");
            }
        }
        Cmd::Show { slot } => {
            let store = SaveStore::open(&cli.save_dir)?;
            match store.read_raw(slot)? {
                Some(text) => println!("{text}"),
                None => bail!("slot {slot} is empty"),
            }
        }
        Cmd::New { slot } => {
            let rules = load_rules(&cli)?;
            let store = SaveStore::open(&cli.save_dir)?;
            let session = Session::fresh(&rules, &store, slot.as_str(), dice(cli.seed))
                .with_context(|| format!("creating slot {slot}"))?;
            println!("new run in slot {slot}");
            print_party(session.run());
        }
        Cmd::Play { slot, lead } => {
            let rules = load_rules(&cli)?;
            let store = SaveStore::open(&cli.save_dir)?;
            let mut session = Session::open(&rules, &store, slot.as_str(), dice(cli.seed))
                .with_context(|| format!("opening slot {slot}"))?;
            let pending = match lead {
                Some(name) => {
                    let Some(character) = session.run().party.index_of(name) else {
                        bail!("no party member named {name}");
                    };
                    Some(Command::Select { character })
                }
                None => None,
            };
            let mut term = Terminal::new(pending);
            match session.play(&mut term)? {
                SessionEnd::Exited => println!("run suspended mid-fight in slot {slot}"),
                SessionEnd::Quit => println!("run saved in slot {slot}"),
                SessionEnd::Died => println!(
                    "the run ended on floor {}, room {}",
                    session.run().floor,
                    session.run().room
                ),
            }
        }
    }
    Ok(())
}

fn print_party(run: &RunState) {
    for (i, m) in run.party.members.iter().enumerate() {
        let lead = if i == run.party.active { '*' } else { ' ' };
        println!("{lead}[{i}] {}", m.status_line());
    }
}

const HELP: &str = "\
commands:
  attack N | skill N [T] | retreat | exit        (combat)
  go | quit                                      (between rooms)
  buy N | leave                                  (shop)
  up hp|mp|dmg | upskill N | equip N | unequip KIND | drink N | lead N
  inv | help";

/// Line-oriented frontend on stdin/stdout. End of input exits or quits.
struct Terminal {
    lines: Lines<StdinLock<'static>>,
    pending: Option<Command>,
}

enum Parsed<T> {
    Command(T),
    /// Handled locally; ask again.
    Again,
    /// Stop asking and take the prompt's default.
    Stop,
}

impl Terminal {
    fn new(pending: Option<Command>) -> Self {
        Self {
            lines: io::stdin().lock().lines(),
            pending,
        }
    }

    fn read(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}> ");
        let _ = io::stdout().flush();
        match self.lines.next() {
            Some(Ok(line)) => Some(line.trim().to_lowercase()),
            _ => None,
        }
    }

    fn ask<T>(&mut self, prompt: &str, mut parse: impl FnMut(&[&str]) -> Parsed<T>) -> Option<T> {
        loop {
            let line = self.read(prompt)?;
            let words: Vec<&str> = line.split_whitespace().collect();
            match parse(&words) {
                Parsed::Command(c) => return Some(c),
                Parsed::Again => {}
                Parsed::Stop => return None,
            }
        }
    }
}

fn stat(word: &str) -> Option<Stat> {
    match word {
        "hp" | "health" => Some(Stat::MaxHealth),
        "mp" | "mana" => Some(Stat::MaxMana),
        "dmg" | "damage" => Some(Stat::Damage),
        _ => None,
    }
}

fn kind(word: &str) -> Option<ItemKind> {
    ItemKind::EQUIPPABLE
        .into_iter()
        .find(|k| k.to_string() == word)
}

fn index(word: &str) -> Option<usize> {
    word.parse().ok()
}

/// Submenu commands shared by every prompt.
fn manage(words: &[&str], run: &RunState) -> Option<Command> {
    let active = run.party.active;
    match words {
        ["up", s] => stat(s).map(|stat| Command::UpgradeStat { stat }),
        ["upskill", n] => index(n).map(|skill| Command::UpgradeSkill { skill }),
        ["equip", n] => index(n).map(|item| Command::Equip {
            character: active,
            item,
        }),
        ["unequip", k] => kind(k).map(|kind| Command::Unequip {
            character: active,
            kind,
        }),
        ["drink", n] => index(n).map(|item| Command::DrinkPotion {
            character: active,
            item,
        }),
        ["lead", n] => index(n).map(|character| Command::Select { character }),
        _ => None,
    }
}

/// Local views that never reach the engine.
fn local(words: &[&str], run: &RunState) -> bool {
    match words {
        ["help"] | ["?"] => println!("{HELP}"),
        ["inv"] => print_inventory(run),
        ["party"] => print_party(run),
        _ => return false,
    }
    true
}

fn print_inventory(run: &RunState) {
    println!("coins: {}", run.coins);
    if run.inventory.items.is_empty() {
        println!("(no items)");
    }
    for (i, item) in run.inventory.items.iter().enumerate() {
        match &item.owner {
            Some(owner) => println!("[{i}] {} - worn by {owner}", item.describe()),
            None => println!("[{i}] {}", item.describe()),
        }
    }
}

fn print_combat(view: &CombatView<'_>) {
    print_party(view.run);
    for (i, m) in view.group.monsters.iter().enumerate() {
        if m.is_alive() {
            println!("  <{i}> {} {}/{} (dmg {})", m.name, m.health, m.max_health, m.damage);
        } else {
            println!("  <{i}> {} defeated", m.name);
        }
    }
    for (i, s) in view.run.party.active().skills.iter().enumerate() {
        println!("  skill {i}: {}", s.summary());
    }
}

fn print_shop(shop: &ShopOffer, coins: u64) {
    println!("shop (floor {}), you have {coins} coins:", shop.floor);
    for (i, offer) in shop.offers.iter().enumerate() {
        println!("  [{i}] {} - {} coins", offer.label(), offer.price());
    }
}

impl Frontend for Terminal {
    fn show_room(&mut self, run: &RunState, event: &RoomEvent) {
        let place = format!("floor {} room {}", run.floor, run.room);
        match event {
            RoomEvent::Combat { resumed: true } => println!("== {place}: the fight goes on =="),
            RoomEvent::Combat { resumed: false } => println!("== {place}: monsters! =="),
            RoomEvent::Boss { resumed: true } => println!("== {place}: the boss is still here =="),
            RoomEvent::Boss { resumed: false } => println!("== {place}: the floor boss! =="),
            RoomEvent::Shop(_) => println!("== {place}: a merchant =="),
            RoomEvent::Treasure(report) => {
                println!("== {place}: treasure! {} coins ==", report.coins);
                if let Some(item) = &report.item {
                    println!("found {item}");
                }
                if let Some((skill, who)) = &report.skill {
                    println!("{who} learns {skill}");
                }
            }
        }
    }

    fn show_log(&mut self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    fn reject(&mut self, error: &ValidationError) {
        println!("! {error}");
    }

    fn show_issues(&mut self, issues: &[ContentIssue]) {
        for issue in issues {
            println!("warning: {issue}");
        }
    }

    fn combat_command(&mut self, view: &CombatView<'_>) -> Command {
        if let Some(command) = self.pending.take() {
            return command;
        }
        print_combat(view);
        let run = view.run;
        self.ask("fight", |words| {
            if local(words, run) {
                return Parsed::Again;
            }
            if let Some(command) = manage(words, run) {
                return Parsed::Command(command);
            }
            let command = match words {
                ["attack" | "a", t] => index(t).map(|target| Command::Attack { target }),
                ["skill" | "s", n] => index(n).map(|skill| Command::Skill { skill, target: None }),
                ["skill" | "s", n, t] => index(n).zip(index(t)).map(|(skill, target)| {
                    Command::Skill {
                        skill,
                        target: Some(target),
                    }
                }),
                ["retreat" | "r"] => Some(Command::Retreat),
                ["exit" | "x"] => Some(Command::Exit),
                _ => None,
            };
            match command {
                Some(c) => Parsed::Command(c),
                None => {
                    println!("{HELP}");
                    Parsed::Again
                }
            }
        })
        .unwrap_or(Command::Exit)
    }

    fn shop_command(&mut self, run: &RunState, shop: &ShopOffer) -> ShopCommand {
        print_shop(shop, run.coins);
        self.ask("shop", |words| {
            if local(words, run) {
                return Parsed::Again;
            }
            if let Some(command) = manage(words, run) {
                return Parsed::Command(ShopCommand::Manage(command));
            }
            match words {
                ["buy" | "b", n] => match index(n) {
                    Some(i) => Parsed::Command(ShopCommand::Buy(i)),
                    None => Parsed::Again,
                },
                [] | ["leave" | "l"] => Parsed::Command(ShopCommand::Leave),
                ["quit" | "q"] => Parsed::Stop,
                _ => {
                    println!("{HELP}");
                    Parsed::Again
                }
            }
        })
        .unwrap_or(ShopCommand::Leave)
    }

    fn explore_command(&mut self, run: &RunState) -> ExploreCommand {
        if let Some(command) = self.pending.take() {
            return ExploreCommand::Manage(command);
        }
        self.ask("explore", |words| {
            if local(words, run) {
                return Parsed::Again;
            }
            if let Some(command) = manage(words, run) {
                return Parsed::Command(ExploreCommand::Manage(command));
            }
            match words {
                [] | ["go" | "g"] => Parsed::Command(ExploreCommand::Continue),
                ["quit" | "q"] => Parsed::Command(ExploreCommand::Quit),
                _ => {
                    println!("{HELP}");
                    Parsed::Again
                }
            }
        })
        .unwrap_or(ExploreCommand::Quit)
    }
}
