use std::path::PathBuf;

use thiserror::Error;

use crate::dice::DiceError;
use crate::items::ItemKind;

/// A rejected player command. Returned before any state is touched, so the
/// caller can report it and prompt again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no monster at position {0} can be targeted")]
    InvalidTarget(usize),
    #[error("this skill needs a target")]
    TargetRequired,
    #[error("there are no living monsters to target")]
    NoLivingTargets,
    #[error("no skill at position {0}")]
    UnknownSkill(usize),
    #[error("not enough mana: need {need}, have {have}")]
    InsufficientMana { need: u32, have: u32 },
    #[error("not enough coins: price {price}, have {coins}")]
    InsufficientCoins { price: u64, coins: u64 },
    #[error("not enough skill points: cost {cost}, have {have}")]
    InsufficientSkillPoints { cost: u32, have: u32 },
    #[error("{0} is already at max level")]
    SkillAtMaxLevel(String),
    #[error("cannot upgrade non-standard dice notation '{0}'")]
    UnsupportedNotation(String),
    #[error("no character at position {0}")]
    UnknownCharacter(usize),
    #[error("{0} has fallen")]
    CharacterDown(String),
    #[error("no inventory item at position {0}")]
    UnknownItem(usize),
    #[error("{0} items cannot be equipped")]
    NotEquippable(ItemKind),
    #[error("only potions can be drunk")]
    NotAPotion,
    #[error("{0} has nothing equipped in that slot")]
    NothingEquipped(String),
    #[error("no shop offer at position {0}")]
    UnknownOffer(usize),
    #[error("that skill is already known")]
    SkillAlreadyKnown,
    #[error("there is no fight in progress")]
    NoEncounter,
    #[error("finish the current fight first")]
    EncounterInProgress,
    #[error("the run is over")]
    RunOver,
}

/// Failure reading or writing a save slot. Fatal to the session, but the
/// previous good save is never overwritten by a failed write.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid save slot name '{0}'")]
    InvalidSlot(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode save: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("save {0} has no party members")]
    EmptyParty(PathBuf),
    #[error("failed to decode save {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Problems in the static content tables.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to parse {table}: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} table is empty")]
    Empty(&'static str),
    #[error("{character} starts with unknown skill '{skill}'")]
    UnknownSkill { character: String, skill: String },
    #[error("skill '{skill}' has bad {field} notation: {source}")]
    Notation {
        skill: String,
        field: &'static str,
        #[source]
        source: DiceError,
    },
}

/// Rejected balance configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a probability in [0, 1], got {value}")]
    Probability { field: &'static str, value: f64 },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} range is inverted ({low} > {high})")]
    Range {
        field: &'static str,
        low: f64,
        high: f64,
    },
    #[error("{field} must be at least {min}")]
    TooSmall { field: &'static str, min: f64 },
}

/// Something the loader had to repair. Reported next to the restored run;
/// never a reason to refuse a save.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIssue {
    #[error("save format {found} differs from {expected}")]
    VersionMismatch { found: String, expected: String },
    #[error("{character}: skill table columns disagree (names={names}, {column}={len})")]
    SkillTableMisaligned {
        character: String,
        column: &'static str,
        names: usize,
        len: usize,
    },
    #[error("{item} was equipped by unknown character {owner}; returned to inventory")]
    OrphanedEquip { item: String, owner: String },
    #[error("{owner} had two {kind} items; {item} returned to inventory")]
    DuplicateEquip {
        owner: String,
        kind: ItemKind,
        item: String,
    },
    #[error("{item} cannot be equipped; returned to inventory")]
    UnequippableEquip { item: String },
    #[error("{character}: {stat} was out of range and has been clamped")]
    ClampedStat {
        character: String,
        stat: &'static str,
    },
    #[error("{item}: migrated legacy effect '{effect}'")]
    MigratedEffect { item: String, effect: String },
    #[error("active character index {0} is out of range; reset to 0")]
    ActiveOutOfRange(usize),
    #[error("{item} has unknown kind '{kind}'; dropped from inventory")]
    UnknownItemKind { item: String, kind: String },
    #[error("the saved fight had no living monsters; dropped")]
    ClearedEncounter,
}
