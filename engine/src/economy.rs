use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::content::{Catalog, SkillTemplate};
use crate::dice::Dice;
use crate::encounter::MonsterGroup;
use crate::error::ValidationError;
use crate::items::{Inventory, Item};
use crate::party::{Party, Skill};

/// Price of `item` at `floor`. Never below 5.
pub fn item_price(item: &Item, floor: u32) -> u64 {
    let floor = i64::from(floor.max(1));
    let bonus = item.bonus;
    let mut price = 10 * floor
        + i64::from(bonus.damage) * 5 * floor
        + i64::from(bonus.max_health) * 2
        + i64::from(bonus.max_mana) * 3;
    if item.restore_full {
        price += 25 * floor;
    }
    price.max(5) as u64
}

/// Rarer skills cost more.
pub fn skill_price(skill: &SkillTemplate, floor: u32) -> u64 {
    let rarity = 10 - u64::from(skill.weight.clamp(1, 10));
    (20 + rarity * 3) * u64::from(floor.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rewards {
    pub xp: u64,
    pub coins: u64,
}

/// Victory payout, scaled by how tough the group was.
pub fn combat_rewards(group: &MonsterGroup, config: &EngineConfig, dice: &mut Dice) -> Rewards {
    let worth: f64 = group
        .monsters
        .iter()
        .map(|m| f64::from(m.damage) + f64::from(m.max_health) / 2.0)
        .sum();
    let xp_base: f64 = group
        .monsters
        .iter()
        .map(|m| f64::from(m.damage) * 2.0 + 2.0)
        .sum();
    let (lo, hi) = config.coin_jitter;
    Rewards {
        xp: (xp_base * config.xp_multiplier).floor() as u64,
        coins: (worth * dice.uniform(lo, hi)).round() as u64,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Offer {
    Item { item: Item, price: u64 },
    Skill { skill: String, price: u64 },
}

impl Offer {
    pub fn price(&self) -> u64 {
        match self {
            Offer::Item { price, .. } | Offer::Skill { price, .. } => *price,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Offer::Item { item, price } => format!("{} - {} coins", item.describe(), price),
            Offer::Skill { skill, price } => format!("Skill: {} - {} coins", skill, price),
        }
    }
}

/// Stock of one shop visit. Bought offers are removed; the player may keep
/// buying until they leave.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShopOffer {
    pub floor: u32,
    pub offers: Vec<Offer>,
}

pub fn open_shop(
    catalog: &Catalog,
    party: &Party,
    floor: u32,
    config: &EngineConfig,
    dice: &mut Dice,
) -> ShopOffer {
    let (lo, hi) = config.shop_items;
    let count = dice.range(lo as u64, hi as u64) as usize;
    let mut offers: Vec<Offer> = dice
        .sample(catalog.items.len(), count)
        .into_iter()
        .map(|i| {
            let item = catalog.items[i].clone();
            let price = item_price(&item, floor);
            Offer::Item { item, price }
        })
        .collect();

    if dice.chance(config.shop_skill_chance) {
        let unseen: Vec<&SkillTemplate> = catalog
            .skills
            .values()
            .filter(|s| !party.knows(&s.name))
            .collect();
        if let Some(pick) = dice.index(unseen.len()) {
            let skill = unseen[pick];
            offers.push(Offer::Skill {
                skill: skill.name.clone(),
                price: skill_price(skill, floor),
            });
        }
    }
    debug!(floor, offers = offers.len(), "shop stocked");
    ShopOffer { floor, offers }
}

/// Buy offer `index`. Skills go to the active character.
pub fn purchase(
    shop: &mut ShopOffer,
    index: usize,
    coins: &mut u64,
    party: &mut Party,
    inventory: &mut Inventory,
    catalog: &Catalog,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let offer = shop
        .offers
        .get(index)
        .ok_or(ValidationError::UnknownOffer(index))?;
    let price = offer.price();
    if *coins < price {
        return Err(ValidationError::InsufficientCoins {
            price,
            coins: *coins,
        });
    }
    if let Offer::Skill { skill, .. } = offer {
        if party.active().knows(skill) {
            return Err(ValidationError::SkillAlreadyKnown);
        }
        if catalog.skill(skill).is_none() {
            return Err(ValidationError::UnknownOffer(index));
        }
    }

    *coins -= price;
    match shop.offers.remove(index) {
        Offer::Item { item, .. } => {
            log(format!("[SHOP] bought {} for {} coins", item.name, price));
            inventory.add(item);
        }
        Offer::Skill { skill, .. } => {
            if let Some(template) = catalog.skill(&skill) {
                let buyer = party.active_mut();
                buyer.learn_skill(Skill::from_template(template))?;
                log(format!("[SHOP][{}] learns {} for {} coins", buyer.name, skill, price));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreasureReport {
    pub coins: u64,
    pub item: Option<String>,
    /// Skill learned, and who learned it.
    pub skill: Option<(String, String)>,
}

/// Roll and grant a treasure room's contents.
#[allow(clippy::too_many_arguments)]
pub fn open_treasure(
    catalog: &Catalog,
    party: &mut Party,
    inventory: &mut Inventory,
    coins: &mut u64,
    floor: u32,
    config: &EngineConfig,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) -> TreasureReport {
    let (lo, hi) = config.treasure_coins;
    let found = dice.range(lo, hi) + config.treasure_coins_per_floor * u64::from(floor);
    *coins = coins.saturating_add(found);
    log(format!("[TREASURE] found {} coins", found));
    let mut report = TreasureReport {
        coins: found,
        ..TreasureReport::default()
    };

    if dice.chance(config.treasure_item_chance) {
        let unowned: Vec<&Item> = catalog
            .items
            .iter()
            .filter(|i| !inventory.contains(&i.name))
            .collect();
        if let Some(pick) = dice.index(unowned.len()) {
            let item = unowned[pick].clone();
            log(format!("[TREASURE] found {}", item.describe()));
            report.item = Some(item.name.clone());
            inventory.add(item);
        }
    }

    if dice.chance(config.treasure_skill_chance) {
        let unknown: Vec<&SkillTemplate> = catalog
            .skills
            .values()
            .filter(|s| !party.knows(&s.name))
            .collect();
        if let Some(pick) = dice.index(unknown.len()) {
            let template = unknown[pick];
            let learner = party.active_mut();
            if learner.learn_skill(Skill::from_template(template)).is_ok() {
                log(format!("[TREASURE][{}] learns {}", learner.name, template.name));
                report.skill = Some((template.name.clone(), learner.name.clone()));
            }
        }
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Combat,
    Shop,
    Treasure,
}

/// Pick the next regular room. A counter at its threshold forces that room
/// (treasure first); otherwise one roll splits treasure, shop and combat.
pub fn next_room_kind(
    rooms_since_shop: u32,
    rooms_since_treasure: u32,
    config: &EngineConfig,
    dice: &mut Dice,
) -> RoomKind {
    if rooms_since_treasure >= config.treasure_guarantee {
        return RoomKind::Treasure;
    }
    if rooms_since_shop >= config.shop_guarantee {
        return RoomKind::Shop;
    }
    let roll = dice.uniform(0.0, 1.0);
    if roll < config.treasure_chance {
        RoomKind::Treasure
    } else if roll < config.treasure_chance + config.shop_chance {
        RoomKind::Shop
    } else {
        RoomKind::Combat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Bonus, ItemKind};

    fn item(bonus: Bonus, restore_full: bool) -> Item {
        Item {
            name: "X".into(),
            kind: ItemKind::Relic,
            bonus,
            restore_full,
            effect: None,
            owner: None,
        }
    }

    #[test]
    fn price_scales_with_floor_and_bonus() {
        let sword = item(
            Bonus {
                damage: 1,
                ..Bonus::default()
            },
            false,
        );
        assert_eq!(item_price(&sword, 1), 15);
        assert_eq!(item_price(&sword, 3), 45);
        let potion = item(Bonus::default(), true);
        assert_eq!(item_price(&potion, 2), 70);
    }

    #[test]
    fn price_has_a_floor() {
        let cursed = item(
            Bonus {
                damage: -10,
                ..Bonus::default()
            },
            false,
        );
        assert_eq!(item_price(&cursed, 1), 5);
    }

    #[test]
    fn guarantees_win_over_the_roll() {
        let cfg = EngineConfig::default();
        let mut dice = Dice::from_seed(9);
        assert_eq!(next_room_kind(10, 20, &cfg, &mut dice), RoomKind::Treasure);
        assert_eq!(next_room_kind(10, 3, &cfg, &mut dice), RoomKind::Shop);
    }
}
