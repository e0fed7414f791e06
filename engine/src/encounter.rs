use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::content::MonsterTemplate;
use crate::dice::Dice;

/// Templates in the difficulty window.
pub const WINDOW: usize = 3;
pub const MAX_GROUP: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub name: String,
    pub health: u32,
    pub max_health: u32,
    pub damage: u32,
}

impl Monster {
    pub fn spawn(template: &MonsterTemplate) -> Self {
        Self {
            name: template.name.clone(),
            health: template.health,
            max_health: template.health,
            damage: template.damage,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Returns the damage actually dealt.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.health);
        self.health -= dealt;
        dealt
    }
}

/// One combat room's monsters. Defeated monsters stay in place at zero
/// health so indices never shift mid-fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterGroup {
    pub monsters: Vec<Monster>,
    #[serde(default)]
    pub boss: bool,
}

impl MonsterGroup {
    pub fn living(&self) -> impl Iterator<Item = usize> + '_ {
        self.monsters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_alive())
            .map(|(i, _)| i)
    }

    pub fn is_cleared(&self) -> bool {
        self.monsters.iter().all(|m| !m.is_alive())
    }

    pub fn is_target(&self, index: usize) -> bool {
        self.monsters.get(index).is_some_and(Monster::is_alive)
    }

    /// A living monster chosen uniformly, if any remain.
    pub fn random_living(&self, dice: &mut Dice) -> Option<usize> {
        let living: Vec<usize> = self.living().collect();
        dice.index(living.len()).map(|i| living[i])
    }
}

/// Catalog slice for `rotation`, shifted back so it stays inside the
/// catalog when the rotation runs near the end.
pub fn window(catalog_len: usize, rotation: usize) -> Range<usize> {
    let start = rotation.min(catalog_len.saturating_sub(WINDOW));
    start..(start + WINDOW).min(catalog_len)
}

/// Weighted draws from the window; one monster always, more through the
/// growth cascade.
pub fn generate_group(
    catalog: &[MonsterTemplate],
    rotation: usize,
    config: &EngineConfig,
    dice: &mut Dice,
) -> MonsterGroup {
    let slice = &catalog[window(catalog.len(), rotation)];
    let weights: Vec<u32> = (0..slice.len())
        .map(|i| config.window_weights.get(i).copied().unwrap_or(1))
        .collect();
    let draw = |dice: &mut Dice| {
        let pick = dice.weighted(&weights).unwrap_or(0);
        Monster::spawn(&slice[pick])
    };

    let mut monsters = vec![draw(dice)];
    for &p in config.group_growth.iter().take(MAX_GROUP - 1) {
        if !dice.chance(p) {
            break;
        }
        monsters.push(draw(dice));
    }
    debug!(rotation, size = monsters.len(), "generated group");
    MonsterGroup {
        monsters,
        boss: false,
    }
}

/// The template one tier beyond the window, alone.
pub fn generate_boss(catalog: &[MonsterTemplate], rotation: usize) -> MonsterGroup {
    let index = (rotation + WINDOW).min(catalog.len().saturating_sub(1));
    MonsterGroup {
        monsters: catalog.get(index).map(Monster::spawn).into_iter().collect(),
        boss: true,
    }
}

/// Slide the window forward one template unless it would run off the end.
/// Returns whether it moved.
pub fn rotate_window(rotation: &mut usize, catalog_len: usize) -> bool {
    if *rotation + WINDOW < catalog_len {
        *rotation += 1;
        true
    } else {
        false
    }
}
