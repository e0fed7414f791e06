use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dice::{DiceError, Notation};
use crate::error::ContentError;
use crate::items::Item;
use crate::party::{Character, IdleProfile, Party, Skill};

const MONSTERS: &str = include_str!("../content/monsters.yaml");
const ITEMS: &str = include_str!("../content/items.yaml");
const SKILLS: &str = include_str!("../content/skills.yaml");
const PARTY: &str = include_str!("../content/party.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub name: String,
    pub health: u32,
    /// Rolled as this many d2 per hit.
    pub damage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SkillTemplate {
    /// Filled from the table key.
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub damage: Notation,
    #[serde(default = "one")]
    pub hits: u32,
    #[serde(default)]
    pub healing: Notation,
    #[serde(default)]
    pub mana_cost: u32,
    #[serde(default = "ten")]
    pub max_level: u32,
    /// Rarity weight, 1 (rare) to 10 (common).
    #[serde(default = "five")]
    pub weight: u32,
}

fn one() -> u32 {
    1
}

fn five() -> u32 {
    5
}

fn ten() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTemplate {
    pub name: String,
    pub max_health: u32,
    pub max_mana: u32,
    pub damage: u32,
    #[serde(default)]
    pub idle: IdleProfile,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Every static table the game reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Weakest first; the rotation window slides over this order.
    pub monsters: Vec<MonsterTemplate>,
    pub items: Vec<Item>,
    pub skills: IndexMap<String, SkillTemplate>,
    pub roster: Vec<CharacterTemplate>,
}

fn parse_table<T: DeserializeOwned>(table: &'static str, text: &str) -> Result<T, ContentError> {
    serde_yaml::from_str(text).map_err(|source| ContentError::Parse { table, source })
}

impl Catalog {
    pub fn builtin() -> Result<Self, ContentError> {
        Self::from_tables(MONSTERS, ITEMS, SKILLS, PARTY)
    }

    /// Load `monsters.yaml`, `items.yaml`, `skills.yaml` and `party.yaml`
    /// from `dir`.
    pub fn from_yaml_dir(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path).map_err(|source| ContentError::Io { path, source })
        };
        Self::from_tables(
            &read("monsters.yaml")?,
            &read("items.yaml")?,
            &read("skills.yaml")?,
            &read("party.yaml")?,
        )
    }

    pub fn from_tables(
        monsters: &str,
        items: &str,
        skills: &str,
        party: &str,
    ) -> Result<Self, ContentError> {
        let monsters: Vec<MonsterTemplate> = parse_table("monsters", monsters)?;
        let mut items: Vec<Item> = parse_table("items", items)?;
        let mut skills: IndexMap<String, SkillTemplate> = parse_table("skills", skills)?;
        let roster: Vec<CharacterTemplate> = parse_table("party", party)?;

        if monsters.is_empty() {
            return Err(ContentError::Empty("monsters"));
        }
        if roster.is_empty() {
            return Err(ContentError::Empty("party"));
        }

        for (name, skill) in skills.iter_mut() {
            skill.name = name.clone();
            for (field, notation) in [("damage", &skill.damage), ("healing", &skill.healing)] {
                if let Notation::Raw(text) = notation {
                    return Err(ContentError::Notation {
                        skill: name.clone(),
                        field,
                        source: DiceError::Malformed(text.clone()),
                    });
                }
            }
        }
        for member in &roster {
            if let Some(missing) = member.skills.iter().find(|s| !skills.contains_key(*s)) {
                return Err(ContentError::UnknownSkill {
                    character: member.name.clone(),
                    skill: missing.clone(),
                });
            }
        }
        for item in &mut items {
            item.owner = None;
            if item.migrate_legacy() {
                warn!(item = %item.name, "item row had no structured bonus; parsed its effect text");
            }
        }

        debug!(
            monsters = monsters.len(),
            items = items.len(),
            skills = skills.len(),
            roster = roster.len(),
            "content loaded"
        );
        Ok(Self {
            monsters,
            items,
            skills,
            roster,
        })
    }

    pub fn skill(&self, name: &str) -> Option<&SkillTemplate> {
        self.skills.get(name)
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    /// A fresh party at level 1 with full health and mana.
    pub fn starting_party(&self) -> Party {
        let members = self
            .roster
            .iter()
            .map(|template| {
                let skills = template
                    .skills
                    .iter()
                    .filter_map(|name| self.skill(name))
                    .map(Skill::from_template)
                    .collect();
                Character::from_template(template, skills)
            })
            .collect();
        Party::new(members)
    }
}
