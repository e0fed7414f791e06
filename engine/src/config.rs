use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Balance knobs. Every field has a default, so a config file only needs
/// the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    pub rooms_per_floor: u32,

    /// Selection weights across the difficulty window, weakest first.
    pub window_weights: Vec<u32>,
    /// Chance to add each further monster, given the previous one was added.
    pub group_growth: Vec<f64>,

    pub retreat_chance: f64,
    /// Multiplicative jitter on basic attacks.
    pub attack_jitter: (f64, f64),
    pub active_target_weight: u32,
    pub ally_target_weight: u32,
    /// Send healing beyond the caster's missing health to injured allies.
    pub overflow_heal: bool,
    /// Coin reward multiplier range on victory.
    pub coin_jitter: (f64, f64),
    pub xp_multiplier: f64,

    pub shop_chance: f64,
    pub treasure_chance: f64,
    /// Rooms without a shop after which the next room is a shop.
    pub shop_guarantee: u32,
    /// Rooms without treasure after which the next room is treasure.
    pub treasure_guarantee: u32,

    pub shop_items: (usize, usize),
    pub shop_skill_chance: f64,
    pub treasure_coins: (u64, u64),
    pub treasure_coins_per_floor: u64,
    pub treasure_item_chance: f64,
    pub treasure_skill_chance: f64,

    pub xp_growth: f64,
    pub level_health_growth: f64,
    pub level_mana_growth: f64,
    pub stat_cost_growth: f64,
    pub skill_cost_growth: f64,

    pub health_upgrade: u32,
    pub mana_upgrade: u32,
    pub damage_upgrade: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rooms_per_floor: 10,
            window_weights: vec![10, 7, 3],
            group_growth: vec![0.30, 0.15, 0.10, 0.05],
            retreat_chance: 0.75,
            attack_jitter: (0.9, 1.2),
            active_target_weight: 5,
            ally_target_weight: 1,
            overflow_heal: true,
            coin_jitter: (0.75, 1.25),
            xp_multiplier: 1.5,
            shop_chance: 0.12,
            treasure_chance: 0.10,
            shop_guarantee: 10,
            treasure_guarantee: 20,
            shop_items: (2, 5),
            shop_skill_chance: 0.20,
            treasure_coins: (10, 30),
            treasure_coins_per_floor: 5,
            treasure_item_chance: 0.25,
            treasure_skill_chance: 0.10,
            xp_growth: 1.5,
            level_health_growth: 1.1,
            level_mana_growth: 1.2,
            stat_cost_growth: 1.2,
            skill_cost_growth: 2.0,
            health_upgrade: 5,
            mana_upgrade: 3,
            damage_upgrade: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("retreat_chance", self.retreat_chance),
            ("shop_chance", self.shop_chance),
            ("treasure_chance", self.treasure_chance),
            ("shop_skill_chance", self.shop_skill_chance),
            ("treasure_item_chance", self.treasure_item_chance),
            ("treasure_skill_chance", self.treasure_skill_chance),
        ];
        for (field, value) in probabilities {
            check_probability(field, value)?;
        }
        for &p in &self.group_growth {
            check_probability("group_growth", p)?;
        }
        if self.shop_chance + self.treasure_chance > 1.0 {
            return Err(ConfigError::Probability {
                field: "shop_chance + treasure_chance",
                value: self.shop_chance + self.treasure_chance,
            });
        }
        if self.window_weights.is_empty() || self.window_weights.iter().all(|&w| w == 0) {
            return Err(ConfigError::Empty("window_weights"));
        }
        if self.rooms_per_floor == 0 {
            return Err(ConfigError::TooSmall {
                field: "rooms_per_floor",
                min: 1.0,
            });
        }
        check_range("attack_jitter", self.attack_jitter)?;
        check_range("coin_jitter", self.coin_jitter)?;
        check_range(
            "shop_items",
            (self.shop_items.0 as f64, self.shop_items.1 as f64),
        )?;
        check_range(
            "treasure_coins",
            (self.treasure_coins.0 as f64, self.treasure_coins.1 as f64),
        )?;
        let growths = [
            ("xp_growth", self.xp_growth),
            ("level_health_growth", self.level_health_growth),
            ("level_mana_growth", self.level_mana_growth),
            ("stat_cost_growth", self.stat_cost_growth),
            ("skill_cost_growth", self.skill_cost_growth),
        ];
        for (field, value) in growths {
            if value < 1.0 {
                return Err(ConfigError::TooSmall { field, min: 1.0 });
            }
        }
        Ok(())
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { field, value })
    }
}

fn check_range(field: &'static str, (low, high): (f64, f64)) -> Result<(), ConfigError> {
    if low > high {
        Err(ConfigError::Range { field, low, high })
    } else {
        Ok(())
    }
}
