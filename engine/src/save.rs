use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::dice::Notation;
use crate::encounter::MonsterGroup;
use crate::error::{ContentIssue, PersistenceError};
use crate::items::{Inventory, Item, ItemKind};
use crate::party::{BaseStats, Character, IdleProfile, Party, Skill, UpgradeCosts};
use crate::run::RunState;

pub const FORMAT_VERSION: &str = "0.2";

fn legacy_version() -> String {
    "0.1".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCounters {
    pub floor: u32,
    pub room: u32,
    pub rotation: usize,
    pub rooms_since_shop: u32,
    pub rooms_since_treasure: u32,
    pub dead: bool,
    pub active: usize,
}

/// Skills as stored: one column per field, indexed together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillTable {
    pub names: Vec<String>,
    pub damage: Vec<Notation>,
    pub attacks: Vec<u32>,
    pub healing: Vec<Notation>,
    pub mana_costs: Vec<u32>,
    pub level: Vec<u32>,
    pub max_level: Vec<u32>,
    pub upgrade_costs: Vec<u32>,
}

fn align<T: Clone>(
    column: &mut Vec<T>,
    name: &'static str,
    len: usize,
    fill: T,
    character: &str,
    issues: &mut Vec<ContentIssue>,
) {
    if column.len() != len {
        issues.push(ContentIssue::SkillTableMisaligned {
            character: character.to_string(),
            column: name,
            names: len,
            len: column.len(),
        });
        column.resize(len, fill);
    }
}

impl SkillTable {
    pub fn from_skills(skills: &[Skill]) -> Self {
        Self {
            names: skills.iter().map(|s| s.name.clone()).collect(),
            damage: skills.iter().map(|s| s.damage.clone()).collect(),
            attacks: skills.iter().map(|s| s.hits).collect(),
            healing: skills.iter().map(|s| s.healing.clone()).collect(),
            mana_costs: skills.iter().map(|s| s.mana_cost).collect(),
            level: skills.iter().map(|s| s.level).collect(),
            max_level: skills.iter().map(|s| s.max_level).collect(),
            upgrade_costs: skills.iter().map(|s| s.upgrade_cost).collect(),
        }
    }

    /// Pad or cut every column to the names column, then zip into records.
    pub fn into_skills(mut self, character: &str, issues: &mut Vec<ContentIssue>) -> Vec<Skill> {
        let n = self.names.len();
        align(&mut self.damage, "damage", n, Notation::None, character, issues);
        align(&mut self.attacks, "attacks", n, 1, character, issues);
        align(&mut self.healing, "healing", n, Notation::None, character, issues);
        align(&mut self.mana_costs, "mana_costs", n, 0, character, issues);
        align(&mut self.level, "level", n, 1, character, issues);
        align(&mut self.max_level, "max_level", n, 10, character, issues);
        align(&mut self.upgrade_costs, "upgrade_costs", n, 1, character, issues);

        (0..n)
            .map(|i| Skill {
                name: self.names[i].clone(),
                damage: self.damage[i].clone(),
                hits: self.attacks[i],
                healing: self.healing[i].clone(),
                mana_cost: self.mana_costs[i],
                level: self.level[i].max(1),
                max_level: self.max_level[i].max(1),
                upgrade_cost: self.upgrade_costs[i].max(1),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub name: String,
    #[serde(default = "one")]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "starting_xp_to_next")]
    pub xp_to_next: u64,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub damage: u32,
    #[serde(default)]
    pub skill_points: u32,
    /// Missing in older saves; rebuilt from the stored stats then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseStats>,
    #[serde(default)]
    pub costs: UpgradeCosts,
    #[serde(default)]
    pub idle: IdleProfile,
    #[serde(default)]
    pub skills: SkillTable,
}

fn one() -> u32 {
    1
}

fn starting_xp_to_next() -> u64 {
    Character::STARTING_XP_TO_NEXT
}

impl CharacterRecord {
    fn capture(c: &Character) -> Self {
        Self {
            name: c.name.clone(),
            level: c.level,
            xp: c.xp,
            xp_to_next: c.xp_to_next,
            health: c.health,
            max_health: c.max_health,
            mana: c.mana,
            max_mana: c.max_mana,
            damage: c.damage,
            skill_points: c.skill_points,
            base: Some(c.base),
            costs: c.costs,
            idle: c.idle,
            skills: SkillTable::from_skills(&c.skills),
        }
    }
}

/// The whole run as one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDocument {
    #[serde(default = "legacy_version")]
    pub version: String,
    #[serde(default)]
    pub counters: RunCounters,
    pub party: Vec<CharacterRecord>,
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub inventory: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<MonsterGroup>,
}

/// A restored run and whatever the loader had to repair on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub run: RunState,
    pub issues: Vec<ContentIssue>,
}

impl SaveDocument {
    pub fn capture(run: &RunState) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            counters: RunCounters {
                floor: run.floor,
                room: run.room,
                rotation: run.rotation,
                rooms_since_shop: run.rooms_since_shop,
                rooms_since_treasure: run.rooms_since_treasure,
                dead: run.dead,
                active: run.party.active,
            },
            party: run.party.members.iter().map(CharacterRecord::capture).collect(),
            coins: run.coins,
            inventory: run.inventory.items.clone(),
            encounter: run.encounter.clone(),
        }
    }

    /// Rebuild the run. Derived stats come from base stats plus equipment,
    /// not from the stored values. A document without party members cannot
    /// be played and is refused.
    pub fn restore(self, origin: &Path) -> Result<Loaded, PersistenceError> {
        if self.party.is_empty() {
            return Err(PersistenceError::EmptyParty(origin.to_path_buf()));
        }
        let mut issues = Vec::new();
        if self.version != FORMAT_VERSION {
            issues.push(ContentIssue::VersionMismatch {
                found: self.version.clone(),
                expected: FORMAT_VERSION.to_string(),
            });
        }

        let mut inventory = Inventory {
            items: self.inventory,
        };
        for item in &mut inventory.items {
            if item.migrate_legacy() {
                issues.push(ContentIssue::MigratedEffect {
                    item: item.name.clone(),
                    effect: item.effect.clone().unwrap_or_default(),
                });
            }
        }
        let names: Vec<String> = self.party.iter().map(|r| r.name.clone()).collect();
        normalize_equipment(&mut inventory, &names, &mut issues);

        let members = self
            .party
            .into_iter()
            .map(|record| restore_character(record, &inventory, &mut issues))
            .collect::<Vec<_>>();

        let mut party = Party::new(members);
        let c = self.counters;
        if c.active < party.members.len() {
            party.active = c.active;
        } else {
            issues.push(ContentIssue::ActiveOutOfRange(c.active));
        }

        let encounter = self.encounter.and_then(|mut group| {
            for m in &mut group.monsters {
                if m.max_health == 0 {
                    m.max_health = m.health;
                }
                m.health = m.health.min(m.max_health);
            }
            if group.is_cleared() {
                if !group.monsters.is_empty() {
                    issues.push(ContentIssue::ClearedEncounter);
                }
                return None;
            }
            Some(group)
        });

        for issue in &issues {
            warn!(%issue, "save repaired on load");
        }
        Ok(Loaded {
            run: RunState {
                floor: c.floor.max(1),
                room: c.room,
                rotation: c.rotation,
                rooms_since_shop: c.rooms_since_shop,
                rooms_since_treasure: c.rooms_since_treasure,
                dead: c.dead,
                party,
                coins: self.coins,
                inventory,
                encounter,
            },
            issues,
        })
    }
}

/// Owners must exist, potions are never worn, and each owner wears at
/// most one item per kind (the first one listed wins).
fn normalize_equipment(inventory: &mut Inventory, names: &[String], issues: &mut Vec<ContentIssue>) {
    let mut worn: HashSet<(String, ItemKind)> = HashSet::new();
    for item in &mut inventory.items {
        let Some(owner) = item.owner.clone() else {
            continue;
        };
        if !names.contains(&owner) {
            issues.push(ContentIssue::OrphanedEquip {
                item: item.name.clone(),
                owner,
            });
            item.owner = None;
        } else if !item.kind.is_equippable() {
            issues.push(ContentIssue::UnequippableEquip {
                item: item.name.clone(),
            });
            item.owner = None;
        } else if !worn.insert((owner.clone(), item.kind)) {
            issues.push(ContentIssue::DuplicateEquip {
                owner,
                kind: item.kind,
                item: item.name.clone(),
            });
            item.owner = None;
        }
    }
}

fn restore_character(
    record: CharacterRecord,
    inventory: &Inventory,
    issues: &mut Vec<ContentIssue>,
) -> Character {
    let bonus = inventory.bonus_for(&record.name);
    let base = record.base.unwrap_or_else(|| BaseStats {
        max_health: strip(record.max_health, bonus.max_health).max(1),
        max_mana: strip(record.max_mana, bonus.max_mana),
        damage: strip(record.damage, bonus.damage),
    });
    let skills = record.skills.into_skills(&record.name, issues);
    let mut character = Character {
        name: record.name,
        level: record.level.max(1),
        xp: record.xp,
        xp_to_next: record.xp_to_next.max(1),
        health: record.health,
        max_health: record.max_health,
        mana: record.mana,
        max_mana: record.max_mana,
        damage: record.damage,
        skill_points: record.skill_points,
        base,
        costs: record.costs,
        idle: record.idle,
        skills,
    };
    character.apply_equipment(bonus);
    if record.health > character.max_health {
        issues.push(ContentIssue::ClampedStat {
            character: character.name.clone(),
            stat: "health",
        });
    }
    if record.mana > character.max_mana {
        issues.push(ContentIssue::ClampedStat {
            character: character.name.clone(),
            stat: "mana",
        });
    }
    character
}

fn strip(stored: u32, delta: i32) -> u32 {
    (i64::from(stored) - i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32
}

pub fn encode(run: &RunState) -> Result<String, PersistenceError> {
    serde_json::to_string_pretty(&SaveDocument::capture(run)).map_err(PersistenceError::Encode)
}

pub fn decode(text: &str, origin: &Path) -> Result<Loaded, PersistenceError> {
    let failed = |source: serde_json::Error| PersistenceError::Decode {
        path: origin.to_path_buf(),
        source,
    };
    let mut value: Value = serde_json::from_str(text).map_err(failed)?;
    let mut issues = value
        .get_mut("inventory")
        .and_then(Value::as_array_mut)
        .map(drop_unknown_items)
        .unwrap_or_default();
    let doc: SaveDocument = serde_json::from_value(value).map_err(failed)?;
    let mut loaded = doc.restore(origin)?;
    issues.append(&mut loaded.issues);
    loaded.issues = issues;
    Ok(loaded)
}

/// Items whose row no longer reads as an `Item` (usually a kind that was
/// removed) are dropped. Their owners lose the bonus on restore.
fn drop_unknown_items(items: &mut Vec<Value>) -> Vec<ContentIssue> {
    let mut issues = Vec::new();
    items.retain(|raw| {
        if Item::deserialize(raw).is_ok() {
            return true;
        }
        let field = |key: &str| match raw.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "?".to_string(),
        };
        let issue = ContentIssue::UnknownItemKind {
            item: field("name"),
            kind: field("kind"),
        };
        warn!(%issue, "save repaired on load");
        issues.push(issue);
        false
    });
    issues
}

/// Where a session keeps its run.
pub trait RunStore {
    fn save(&self, slot: &str, run: &RunState) -> Result<(), PersistenceError>;

    /// `Ok(None)` when the slot has never been written.
    fn load(&self, slot: &str) -> Result<Option<Loaded>, PersistenceError>;

    /// Keep a copy of the run as it stood when `floor` began.
    fn backup(&self, _slot: &str, _run: &RunState, _floor: u32) -> Result<(), PersistenceError> {
        Ok(())
    }
}

fn check_slot(slot: &str) -> Result<(), PersistenceError> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PersistenceError::InvalidSlot(slot.to_string()))
    }
}

fn backup_name(slot: &str, floor: u32) -> String {
    format!("{slot}_backup_floor{floor}")
}

/// One pretty-printed JSON file per slot.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path(&self, slot: &str) -> Result<PathBuf, PersistenceError> {
        check_slot(slot)?;
        Ok(self.dir.join(format!("{slot}.json")))
    }

    pub fn exists(&self, slot: &str) -> Result<bool, PersistenceError> {
        Ok(self.path(slot)?.is_file())
    }

    pub fn delete(&self, slot: &str) -> Result<bool, PersistenceError> {
        let path = self.path(slot)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// Slot names in the directory, backups excluded, sorted.
    pub fn list(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        let mut slots = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PersistenceError::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.contains("_backup_floor") && check_slot(stem).is_ok() {
                    slots.push(stem.to_string());
                }
            }
        }
        slots.sort();
        Ok(slots)
    }

    /// The raw document text of a slot, for inspection.
    pub fn read_raw(&self, slot: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path(slot)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    fn write_atomic(&self, path: &Path, text: &str) -> Result<(), PersistenceError> {
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| PersistenceError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| PersistenceError::io(path, e.error))?;
        Ok(())
    }
}

impl RunStore for SaveStore {
    fn save(&self, slot: &str, run: &RunState) -> Result<(), PersistenceError> {
        let path = self.path(slot)?;
        let text = encode(run)?;
        self.write_atomic(&path, &text)?;
        info!(slot, floor = run.floor, room = run.room, "saved");
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<Loaded>, PersistenceError> {
        let path = self.path(slot)?;
        match self.read_raw(slot)? {
            Some(text) => decode(&text, &path).map(Some),
            None => Ok(None),
        }
    }

    fn backup(&self, slot: &str, run: &RunState, floor: u32) -> Result<(), PersistenceError> {
        check_slot(slot)?;
        let path = self.dir.join(format!("{}.json", backup_name(slot, floor)));
        self.write_atomic(&path, &encode(run)?)?;
        info!(slot, floor, "floor backup written");
        Ok(())
    }
}

/// Keeps encoded documents in memory. Goes through the same JSON codec as
/// `SaveStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots.borrow().get(slot).cloned()
    }

    pub fn slots(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl RunStore for MemoryStore {
    fn save(&self, slot: &str, run: &RunState) -> Result<(), PersistenceError> {
        check_slot(slot)?;
        let text = encode(run)?;
        self.slots.borrow_mut().insert(slot.to_string(), text);
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<Loaded>, PersistenceError> {
        check_slot(slot)?;
        match self.slots.borrow().get(slot) {
            Some(text) => decode(text, Path::new(slot)).map(Some),
            None => Ok(None),
        }
    }

    fn backup(&self, slot: &str, run: &RunState, floor: u32) -> Result<(), PersistenceError> {
        self.save(&backup_name(slot, floor), run)
    }
}
