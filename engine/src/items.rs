use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::party::Party;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Magic,
    Relic,
    Potion,
}

impl ItemKind {
    pub const EQUIPPABLE: [ItemKind; 4] = [
        ItemKind::Weapon,
        ItemKind::Armor,
        ItemKind::Magic,
        ItemKind::Relic,
    ];

    pub fn is_equippable(self) -> bool {
        self != ItemKind::Potion
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Armor => "armor",
            ItemKind::Magic => "magic",
            ItemKind::Relic => "relic",
            ItemKind::Potion => "potion",
        })
    }
}

/// Signed stat deltas granted while an item is equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bonus {
    pub damage: i32,
    pub max_health: i32,
    pub max_mana: i32,
}

impl Bonus {
    pub fn is_zero(&self) -> bool {
        *self == Bonus::default()
    }

    pub fn all(amount: i32) -> Self {
        Self {
            damage: amount,
            max_health: amount,
            max_mana: amount,
        }
    }
}

impl Add for Bonus {
    type Output = Bonus;

    fn add(self, rhs: Bonus) -> Bonus {
        Bonus {
            damage: self.damage.saturating_add(rhs.damage),
            max_health: self.max_health.saturating_add(rhs.max_health),
            max_mana: self.max_mana.saturating_add(rhs.max_mana),
        }
    }
}

impl AddAssign for Bonus {
    fn add_assign(&mut self, rhs: Bonus) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Bonus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.damage, "damage"),
            (self.max_health, "health"),
            (self.max_mana, "mana"),
        ]
        .into_iter()
        .filter(|(v, _)| *v != 0)
        .map(|(v, label)| format!("{v:+} {label}"))
        .collect();
        if parts.is_empty() {
            f.write_str("no bonus")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Bonus recovered from a descriptive effect string such as
/// "+1 damage, +3 mana" or "+5 all stats".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegacyEffect {
    pub bonus: Bonus,
    pub restore_full: bool,
}

impl LegacyEffect {
    /// `None` when no clause names a known stat or "restore".
    pub fn parse(effect: &str) -> Option<Self> {
        let lowered = effect.to_ascii_lowercase();
        let mut parsed = LegacyEffect::default();
        let mut recognized = false;

        for clause in lowered.split([',', ';']).flat_map(|c| c.split(" and ")) {
            if clause.contains("restore") {
                parsed.restore_full = true;
                recognized = true;
                continue;
            }
            let words: Vec<&str> = clause
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '+' || c == '-'))
                .filter(|w| !w.is_empty())
                .collect();
            let Some(amount) = words
                .iter()
                .find_map(|w| w.trim_start_matches('+').parse::<i32>().ok())
            else {
                continue;
            };
            if clause.contains("all stats") {
                parsed.bonus += Bonus::all(amount);
                recognized = true;
                continue;
            }
            for word in &words {
                let slot = match *word {
                    "damage" | "dmg" => &mut parsed.bonus.damage,
                    "health" | "hp" => &mut parsed.bonus.max_health,
                    "mana" | "mp" => &mut parsed.bonus.max_mana,
                    _ => continue,
                };
                *slot = slot.saturating_add(amount);
                recognized = true;
            }
        }
        recognized.then_some(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub bonus: Bonus,
    #[serde(default)]
    pub restore_full: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Name of the character wearing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Item {
    /// Fill the structured fields from `effect` when the row has none.
    /// Returns true when something was migrated.
    pub fn migrate_legacy(&mut self) -> bool {
        if !self.bonus.is_zero() || self.restore_full {
            return false;
        }
        let Some(parsed) = self.effect.as_deref().and_then(LegacyEffect::parse) else {
            return false;
        };
        self.bonus = parsed.bonus;
        self.restore_full = parsed.restore_full;
        true
    }

    pub fn describe(&self) -> String {
        if self.restore_full {
            format!("{} ({}, restores health and mana)", self.name, self.kind)
        } else {
            format!("{} ({}, {})", self.name, self.kind, self.bonus)
        }
    }
}

/// The party's shared item list. Equipped items stay in the list and carry
/// their owner's name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inventory {
    pub items: Vec<Item>,
}

impl Inventory {
    pub fn add(&mut self, mut item: Item) {
        item.owner = None;
        self.items.push(item);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|i| i.name == name)
    }

    pub fn equipped_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |i| i.owner.as_deref() == Some(owner))
    }

    pub fn slot(&self, owner: &str, kind: ItemKind) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.kind == kind && i.owner.as_deref() == Some(owner))
    }

    pub fn bonus_for(&self, owner: &str) -> Bonus {
        self.equipped_by(owner)
            .fold(Bonus::default(), |acc, item| acc + item.bonus)
    }

    /// Items nobody is wearing, with their list positions.
    pub fn pool(&self) -> impl Iterator<Item = (usize, &Item)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.owner.is_none())
    }
}

fn pooled(inventory: &Inventory, item: usize) -> Result<&Item, ValidationError> {
    inventory
        .items
        .get(item)
        .filter(|i| i.owner.is_none())
        .ok_or(ValidationError::UnknownItem(item))
}

/// Put pool item `item` on `character`, sending any item of the same kind
/// they already wear back to the pool.
pub fn equip(
    party: &mut Party,
    inventory: &mut Inventory,
    character: usize,
    item: usize,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let name = party.member(character)?.name.clone();
    let kind = pooled(inventory, item)?.kind;
    if !kind.is_equippable() {
        return Err(ValidationError::NotEquippable(kind));
    }

    if let Some(old) = inventory.slot(&name, kind) {
        inventory.items[old].owner = None;
        log(format!(
            "[EQUIP][{}] removes {} (back to inventory)",
            name, inventory.items[old].name
        ));
    }
    inventory.items[item].owner = Some(name.clone());
    log(format!("[EQUIP][{}] equips {}", name, inventory.items[item].describe()));

    let bonus = inventory.bonus_for(&name);
    party.members[character].apply_equipment(bonus);
    Ok(())
}

pub fn unequip(
    party: &mut Party,
    inventory: &mut Inventory,
    character: usize,
    kind: ItemKind,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let name = party.member(character)?.name.clone();
    let slot = inventory
        .slot(&name, kind)
        .ok_or_else(|| ValidationError::NothingEquipped(name.clone()))?;
    inventory.items[slot].owner = None;
    log(format!("[EQUIP][{}] removes {}", name, inventory.items[slot].name));

    let bonus = inventory.bonus_for(&name);
    party.members[character].apply_equipment(bonus);
    Ok(())
}

/// Drink pool potion `item`: full health and mana, potion consumed.
pub fn use_potion(
    party: &mut Party,
    inventory: &mut Inventory,
    character: usize,
    item: usize,
    mut log: impl FnMut(String),
) -> Result<(), ValidationError> {
    let target = party.member(character)?;
    if !target.is_alive() {
        return Err(ValidationError::CharacterDown(target.name.clone()));
    }
    let potion = pooled(inventory, item)?;
    if potion.kind != ItemKind::Potion {
        return Err(ValidationError::NotAPotion);
    }

    let potion = inventory.items.remove(item);
    let member = &mut party.members[character];
    if potion.restore_full {
        member.restore_full();
    }
    log(format!(
        "[POTION][{}] drinks {} (HP {}/{}, MP {}/{})",
        member.name, potion.name, member.health, member.max_health, member.mana, member.max_mana
    ));
    Ok(())
}
