use serde::{Deserialize, Serialize};

use crate::content::{CharacterTemplate, SkillTemplate};
use crate::dice::{DiceSpec, Notation};
use crate::error::ValidationError;
use crate::items::Bonus;

/// Stats before equipment. Level-ups and stat upgrades change these; the
/// live stats are always `base + equipped bonuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseStats {
    pub max_health: u32,
    pub max_mana: u32,
    pub damage: u32,
}

/// Skill-point price of the next purchase of each stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeCosts {
    pub max_health: u32,
    pub max_mana: u32,
    pub damage: u32,
}

impl Default for UpgradeCosts {
    fn default() -> Self {
        Self {
            max_health: 1,
            max_mana: 1,
            damage: 1,
        }
    }
}

/// What a character does on their own while someone else is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdleProfile {
    /// Strike one random living monster.
    Melee { dice: DiceSpec },
    /// Hit every living monster.
    Area { dice: DiceSpec },
    /// Heal every living ally.
    Support { dice: DiceSpec },
    #[default]
    Passive,
}

impl IdleProfile {
    /// Dice for this profile at `level`: one extra die per level past 1.
    pub fn scaled(&self, level: u32) -> Option<DiceSpec> {
        let extra = level.saturating_sub(1);
        match self {
            IdleProfile::Melee { dice }
            | IdleProfile::Area { dice }
            | IdleProfile::Support { dice } => Some(dice.plus_dice(extra)),
            IdleProfile::Passive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub damage: Notation,
    /// 0 for pure heals. Above 1, each hit picks its own target.
    pub hits: u32,
    pub healing: Notation,
    pub mana_cost: u32,
    pub level: u32,
    pub max_level: u32,
    pub upgrade_cost: u32,
}

impl Skill {
    pub fn from_template(template: &SkillTemplate) -> Self {
        Self {
            name: template.name.clone(),
            damage: template.damage.clone(),
            hits: template.hits,
            healing: template.healing.clone(),
            mana_cost: template.mana_cost,
            level: 1,
            max_level: template.max_level.max(1),
            upgrade_cost: 1,
        }
    }

    pub fn deals_damage(&self) -> bool {
        self.hits > 0 && !self.damage.is_none()
    }

    /// Single-hit damage skills need the player to pick the target.
    pub fn needs_target(&self) -> bool {
        self.hits == 1 && !self.damage.is_none()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.deals_damage() {
            parts.push(format!("{} x{}", self.damage, self.hits));
        }
        if !self.healing.is_none() {
            parts.push(format!("heal {}", self.healing));
        }
        format!(
            "{} L{}/{} [{}] {} mp",
            self.name,
            self.level,
            self.max_level,
            parts.join(", "),
            self.mana_cost
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub level: u32,
    pub xp: u64,
    pub xp_to_next: u64,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    /// Basic attacks roll this many d2.
    pub damage: u32,
    pub skill_points: u32,
    pub base: BaseStats,
    pub costs: UpgradeCosts,
    pub idle: IdleProfile,
    pub skills: Vec<Skill>,
}

impl Character {
    pub const STARTING_XP_TO_NEXT: u64 = 10;

    pub fn from_template(template: &CharacterTemplate, skills: Vec<Skill>) -> Self {
        let base = BaseStats {
            max_health: template.max_health.max(1),
            max_mana: template.max_mana,
            damage: template.damage,
        };
        Self {
            name: template.name.clone(),
            level: 1,
            xp: 0,
            xp_to_next: Self::STARTING_XP_TO_NEXT,
            health: base.max_health,
            max_health: base.max_health,
            mana: base.max_mana,
            max_mana: base.max_mana,
            damage: base.damage,
            skill_points: 0,
            base,
            costs: UpgradeCosts::default(),
            idle: template.idle,
            skills,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn missing_health(&self) -> u32 {
        self.max_health.saturating_sub(self.health)
    }

    /// Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.health);
        self.health -= dealt;
        dealt
    }

    /// Returns the healing actually applied.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let healed = amount.min(self.missing_health());
        self.health += healed;
        healed
    }

    pub fn restore_mana(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max_mana.saturating_sub(self.mana));
        self.mana += restored;
        restored
    }

    pub fn spend_mana(&mut self, cost: u32) -> Result<(), ValidationError> {
        if self.mana < cost {
            return Err(ValidationError::InsufficientMana {
                need: cost,
                have: self.mana,
            });
        }
        self.mana -= cost;
        Ok(())
    }

    pub fn restore_full(&mut self) {
        self.health = self.max_health;
        self.mana = self.max_mana;
    }

    /// Pull health and mana back into range. Returns the names of the
    /// stats that had to move.
    pub fn clamp_vitals(&mut self) -> Vec<&'static str> {
        let mut clamped = Vec::new();
        if self.health > self.max_health {
            self.health = self.max_health;
            clamped.push("health");
        }
        if self.mana > self.max_mana {
            self.mana = self.max_mana;
            clamped.push("mana");
        }
        clamped
    }

    /// Recompute live maxima and damage from base stats plus `bonus`.
    pub fn apply_equipment(&mut self, bonus: Bonus) {
        self.max_health = offset(self.base.max_health, bonus.max_health).max(1);
        self.max_mana = offset(self.base.max_mana, bonus.max_mana);
        self.damage = offset(self.base.damage, bonus.damage);
        self.clamp_vitals();
    }

    pub fn knows(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s.name == skill)
    }

    pub fn learn_skill(&mut self, skill: Skill) -> Result<(), ValidationError> {
        if self.knows(&skill.name) {
            return Err(ValidationError::SkillAlreadyKnown);
        }
        self.skills.push(skill);
        Ok(())
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} L{} HP {}/{} MP {}/{} DMG {} XP {}/{} SP {}",
            self.name,
            self.level,
            self.health,
            self.max_health,
            self.mana,
            self.max_mana,
            self.damage,
            self.xp,
            self.xp_to_next,
            self.skill_points
        )
    }
}

fn offset(base: u32, delta: i32) -> u32 {
    (i64::from(base) + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32
}

/// The whole roster plus which member the player controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub members: Vec<Character>,
    pub active: usize,
}

impl Party {
    pub fn new(members: Vec<Character>) -> Self {
        Self { members, active: 0 }
    }

    pub fn member(&self, index: usize) -> Result<&Character, ValidationError> {
        self.members
            .get(index)
            .ok_or(ValidationError::UnknownCharacter(index))
    }

    pub fn member_mut(&mut self, index: usize) -> Result<&mut Character, ValidationError> {
        self.members
            .get_mut(index)
            .ok_or(ValidationError::UnknownCharacter(index))
    }

    pub fn active(&self) -> &Character {
        &self.members[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Character {
        &mut self.members[self.active]
    }

    /// Switch the controlled character. Fallen characters cannot be picked.
    pub fn select(&mut self, index: usize) -> Result<(), ValidationError> {
        let member = self.member(index)?;
        if !member.is_alive() {
            return Err(ValidationError::CharacterDown(member.name.clone()));
        }
        self.active = index;
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    pub fn living(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_alive())
            .map(|(i, _)| i)
    }

    pub fn knows(&self, skill: &str) -> bool {
        self.members.iter().any(|m| m.knows(skill))
    }
}
