//! Turn-based dungeon crawl: a party fights generated monster groups floor
//! by floor, levels up, shops, and keeps the whole run in one save document.

pub mod api;
pub mod autopilot;
pub mod combat;
pub mod config;
pub mod content;
pub mod dice;
pub mod economy;
pub mod encounter;
pub mod error;
pub mod items;
pub mod party;
pub mod progression;
pub mod run;
pub mod save;
pub mod session;

pub use combat::{resolve_turn, CombatAction, Outcome, Phase, TurnReport};
pub use config::EngineConfig;
pub use content::Catalog;
pub use dice::{roll_dice, Dice, DiceError, DiceSpec, Notation};
pub use encounter::{generate_boss, generate_group, rotate_window, Monster, MonsterGroup};
pub use error::{ConfigError, ContentError, ContentIssue, PersistenceError, ValidationError};
pub use items::{Bonus, Inventory, Item, ItemKind, LegacyEffect};
pub use party::{Character, IdleProfile, Party, Skill};
pub use progression::Stat;
pub use run::{Command, RoomEvent, Rules, RunState};
pub use save::{Loaded, MemoryStore, RunStore, SaveDocument, SaveStore, FORMAT_VERSION};
pub use session::{Frontend, Session, SessionEnd};
