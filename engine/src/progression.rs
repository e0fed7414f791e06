use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dice::Notation;
use crate::error::ValidationError;
use crate::items::Bonus;
use crate::party::Character;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    MaxHealth,
    MaxMana,
    Damage,
}

impl Stat {
    pub const ALL: [Stat; 3] = [Stat::MaxHealth, Stat::MaxMana, Stat::Damage];
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stat::MaxHealth => "max health",
            Stat::MaxMana => "max mana",
            Stat::Damage => "damage",
        })
    }
}

/// Next price after a purchase: scaled and rounded, always at least one more.
pub fn grow_cost(cost: u32, factor: f64) -> u32 {
    let scaled = (f64::from(cost) * factor).round();
    let scaled = if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    };
    scaled.max(cost.saturating_add(1))
}

fn scale(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).floor() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelUps {
    pub levels: u32,
    pub skill_points: u32,
}

/// Add `amount` xp, levelling as many times as it pays for. `bonus` is the
/// character's current equipment total, re-applied on top of the new base.
pub fn gain_xp(
    character: &mut Character,
    amount: u64,
    floor: u32,
    bonus: Bonus,
    config: &EngineConfig,
    mut log: impl FnMut(String),
) -> LevelUps {
    let mut ups = LevelUps::default();
    character.xp = character.xp.saturating_add(amount);
    character.xp_to_next = character.xp_to_next.max(1);

    while character.xp >= character.xp_to_next {
        character.xp -= character.xp_to_next;
        character.level += 1;
        let points = floor.max(1);
        character.skill_points = character.skill_points.saturating_add(points);
        character.xp_to_next =
            ((character.xp_to_next as f64 * config.xp_growth).floor() as u64).max(1);
        character.base.max_mana = scale(character.base.max_mana, config.level_mana_growth);
        character.base.max_health = scale(character.base.max_health, config.level_health_growth);

        ups.levels += 1;
        ups.skill_points += points;
    }

    if ups.levels > 0 {
        character.apply_equipment(bonus);
        character.restore_full();
        log(format!(
            "[LEVEL][{}] reaches level {} (+{} skill points, next at {} xp)",
            character.name, character.level, ups.skill_points, character.xp_to_next
        ));
        debug!(character = %character.name, level = character.level, "level up");
    }
    ups
}

pub fn stat_cost(character: &Character, stat: Stat) -> u32 {
    match stat {
        Stat::MaxHealth => character.costs.max_health,
        Stat::MaxMana => character.costs.max_mana,
        Stat::Damage => character.costs.damage,
    }
}

/// Spend skill points on one permanent stat increase.
pub fn upgrade_stat(
    character: &mut Character,
    stat: Stat,
    bonus: Bonus,
    config: &EngineConfig,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let cost = stat_cost(character, stat);
    if character.skill_points < cost {
        return Err(ValidationError::InsufficientSkillPoints {
            cost,
            have: character.skill_points,
        });
    }

    character.skill_points -= cost;
    let next = grow_cost(cost, config.stat_cost_growth);
    match stat {
        Stat::MaxHealth => {
            character.base.max_health = character.base.max_health.saturating_add(config.health_upgrade);
            character.costs.max_health = next;
        }
        Stat::MaxMana => {
            character.base.max_mana = character.base.max_mana.saturating_add(config.mana_upgrade);
            character.costs.max_mana = next;
        }
        Stat::Damage => {
            character.base.damage = character.base.damage.saturating_add(config.damage_upgrade);
            character.costs.damage = next;
        }
    }
    character.apply_equipment(bonus);
    match stat {
        Stat::MaxHealth => character.health = character.max_health,
        Stat::MaxMana => character.mana = character.max_mana,
        Stat::Damage => {}
    }
    log(format!(
        "[UPGRADE][{}] {} raised for {} sp (next costs {})",
        character.name, stat, cost, next
    ));
    Ok(())
}

fn upgradable(notation: &Notation) -> Result<(), ValidationError> {
    match notation {
        Notation::Raw(text) => Err(ValidationError::UnsupportedNotation(text.clone())),
        _ => Ok(()),
    }
}

/// One more die on damage and healing, one more hit on multi-hit skills.
pub fn upgrade_skill(
    character: &mut Character,
    index: usize,
    config: &EngineConfig,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let points = character.skill_points;
    let skill = character
        .skills
        .get_mut(index)
        .ok_or(ValidationError::UnknownSkill(index))?;
    if skill.level >= skill.max_level {
        return Err(ValidationError::SkillAtMaxLevel(skill.name.clone()));
    }
    if points < skill.upgrade_cost {
        return Err(ValidationError::InsufficientSkillPoints {
            cost: skill.upgrade_cost,
            have: points,
        });
    }
    upgradable(&skill.damage)?;
    upgradable(&skill.healing)?;

    let cost = skill.upgrade_cost;
    if let Notation::Dice(spec) = &mut skill.damage {
        *spec = spec.plus_dice(1);
    }
    if skill.hits > 1 {
        skill.hits += 1;
    }
    if let Notation::Dice(spec) = &mut skill.healing {
        *spec = spec.plus_dice(1);
    }
    skill.level += 1;
    skill.upgrade_cost = grow_cost(cost, config.skill_cost_growth);
    let summary = skill.summary();
    character.skill_points -= cost;
    log(format!(
        "[UPGRADE][{}] {} for {} sp",
        character.name, summary, cost
    ));
    Ok(())
}
