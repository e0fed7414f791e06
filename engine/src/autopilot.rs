//! A fixed policy that plays the game without input. Used for balance
//! simulations and end-to-end tests.

use crate::economy::{Offer, ShopOffer};
use crate::error::ValidationError;
use crate::items::ItemKind;
use crate::party::Character;
use crate::progression::{stat_cost, Stat};
use crate::run::{Command, RoomEvent, RunState};
use crate::session::{CombatView, ExploreCommand, Frontend, ShopCommand};

#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    /// Stop between rooms after this many rooms.
    pub max_rooms: Option<u64>,
    pub rooms: u64,
    pub rejections: u64,
    pub log: Vec<String>,
    /// Keep every log line instead of only counting rooms.
    pub record: bool,
    rejected: bool,
}

impl Autopilot {
    pub fn new(max_rooms: Option<u64>) -> Self {
        Self {
            max_rooms,
            ..Self::default()
        }
    }

    pub fn recording(mut self) -> Self {
        self.record = true;
        self
    }

    fn take_rejection(&mut self) -> bool {
        std::mem::take(&mut self.rejected)
    }

    fn stop_or_continue(&self) -> ExploreCommand {
        match self.max_rooms {
            Some(max) if self.rooms >= max => ExploreCommand::Quit,
            _ => ExploreCommand::Continue,
        }
    }
}

fn below(c: &Character, percent: u32) -> bool {
    c.health * 100 < c.max_health * percent
}

fn weakest(view: &CombatView<'_>) -> usize {
    view.group
        .living()
        .min_by_key(|&i| view.group.monsters[i].health)
        .unwrap_or(0)
}

fn potion_in_pool(run: &RunState) -> Option<usize> {
    run.inventory
        .pool()
        .find(|(_, i)| i.kind == ItemKind::Potion)
        .map(|(i, _)| i)
}

/// Expected damage of one cast, for ranking skills.
fn expected_damage(c: &Character, skill: usize) -> u32 {
    let s = &c.skills[skill];
    s.damage
        .spec()
        .map(|d| (d.min() + d.max()) / 2 * s.hits)
        .unwrap_or(0)
}

impl Frontend for Autopilot {
    fn show_room(&mut self, _run: &RunState, event: &RoomEvent) {
        let resumed = matches!(
            event,
            RoomEvent::Combat { resumed: true } | RoomEvent::Boss { resumed: true }
        );
        if !resumed {
            self.rooms += 1;
        }
    }

    fn show_log(&mut self, lines: &[String]) {
        if self.record {
            self.log.extend_from_slice(lines);
        }
    }

    fn reject(&mut self, _error: &ValidationError) {
        self.rejections += 1;
        self.rejected = true;
    }

    fn combat_command(&mut self, view: &CombatView<'_>) -> Command {
        let target = weakest(view);
        if self.take_rejection() {
            return Command::Attack { target };
        }
        let run = view.run;
        let me = run.party.active();

        if below(me, 25) {
            if let Some(item) = potion_in_pool(run) {
                return Command::DrinkPotion {
                    character: run.party.active,
                    item,
                };
            }
        }
        let affordable = |i: &usize| me.skills[*i].mana_cost <= me.mana;
        if below(me, 40) {
            if let Some(skill) = (0..me.skills.len())
                .filter(affordable)
                .find(|&i| !me.skills[i].healing.is_none())
            {
                return Command::Skill {
                    skill,
                    target: Some(target),
                };
            }
        }
        let best = (0..me.skills.len())
            .filter(affordable)
            .filter(|&i| me.skills[i].deals_damage())
            .max_by_key(|&i| expected_damage(me, i));
        match best {
            Some(skill) if expected_damage(me, skill) > me.damage * 3 / 2 => Command::Skill {
                skill,
                target: Some(target),
            },
            _ => Command::Attack { target },
        }
    }

    fn shop_command(&mut self, run: &RunState, shop: &ShopOffer) -> ShopCommand {
        if self.take_rejection() {
            return ShopCommand::Leave;
        }
        shop.offers
            .iter()
            .enumerate()
            .filter(|(_, o)| o.price() <= run.coins)
            .filter(|(_, o)| match o {
                Offer::Item { item, .. } => !run.inventory.contains(&item.name),
                Offer::Skill { skill, .. } => !run.party.active().knows(skill),
            })
            .min_by_key(|(_, o)| o.price())
            .map_or(ShopCommand::Leave, |(i, _)| ShopCommand::Buy(i))
    }

    fn explore_command(&mut self, run: &RunState) -> ExploreCommand {
        if self.take_rejection() {
            return self.stop_or_continue();
        }
        let active = run.party.active;
        let me = run.party.active();

        if below(me, 50) {
            if let Some(item) = potion_in_pool(run) {
                return ExploreCommand::Manage(Command::DrinkPotion {
                    character: active,
                    item,
                });
            }
        }
        for (item, row) in run.inventory.pool() {
            if row.kind.is_equippable() && run.inventory.slot(&me.name, row.kind).is_none() {
                return ExploreCommand::Manage(Command::Equip {
                    character: active,
                    item,
                });
            }
        }
        let cheapest = Stat::ALL
            .into_iter()
            .min_by_key(|&stat| stat_cost(me, stat));
        if let Some(stat) = cheapest.filter(|&stat| stat_cost(me, stat) <= me.skill_points) {
            return ExploreCommand::Manage(Command::UpgradeStat { stat });
        }
        self.stop_or_continue()
    }
}
