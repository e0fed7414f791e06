use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::combat::{self, CombatAction, Outcome, Phase, TurnReport};
use crate::config::EngineConfig;
use crate::content::Catalog;
use crate::dice::Dice;
use crate::economy::{self, Rewards, RoomKind, ShopOffer, TreasureReport};
use crate::encounter::{self, MonsterGroup};
use crate::error::{ConfigError, ContentError, ValidationError};
use crate::items::{self, Bonus, Inventory, ItemKind};
use crate::party::Party;
use crate::progression::{self, Stat};

/// Content plus balance: everything a run reads but never changes.
#[derive(Debug, Clone)]
pub struct Rules {
    pub config: EngineConfig,
    pub catalog: Catalog,
}

impl Rules {
    pub fn new(config: EngineConfig, catalog: Catalog) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, catalog })
    }

    pub fn builtin() -> Result<Self, ContentError> {
        Ok(Self {
            config: EngineConfig::default(),
            catalog: Catalog::builtin()?,
        })
    }
}

/// Every player decision the run accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Attack { target: usize },
    Skill { skill: usize, target: Option<usize> },
    Retreat,
    /// Suspend; an in-flight fight is kept for resume.
    Exit,
    UpgradeStat { stat: Stat },
    UpgradeSkill { skill: usize },
    Equip { character: usize, item: usize },
    Unequip { character: usize, kind: ItemKind },
    DrinkPotion { character: usize, item: usize },
    Select { character: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Combat { resumed: bool },
    Boss { resumed: bool },
    Shop(ShopOffer),
    Treasure(TreasureReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub floor: u32,
    /// Regular rooms cleared on this floor.
    pub room: u32,
    pub rotation: usize,
    pub rooms_since_shop: u32,
    pub rooms_since_treasure: u32,
    pub dead: bool,
    pub party: Party,
    pub coins: u64,
    pub inventory: Inventory,
    /// A fight in progress, kept across saves.
    pub encounter: Option<MonsterGroup>,
}

impl RunState {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            floor: 1,
            room: 0,
            rotation: 0,
            rooms_since_shop: 0,
            rooms_since_treasure: 0,
            dead: false,
            party: catalog.starting_party(),
            coins: 0,
            inventory: Inventory::default(),
            encounter: None,
        }
    }

    pub fn bonus_for(&self, character: usize) -> Bonus {
        self.party
            .members
            .get(character)
            .map(|m| self.inventory.bonus_for(&m.name))
            .unwrap_or_default()
    }

    pub fn in_combat(&self) -> bool {
        self.encounter.is_some()
    }

    /// Resume the fight in flight, or move on and roll the next room.
    pub fn enter_room(&mut self, rules: &Rules, dice: &mut Dice) -> Result<RoomEvent, ValidationError> {
        if self.dead {
            return Err(ValidationError::RunOver);
        }
        if let Some(group) = &self.encounter {
            return Ok(if group.boss {
                RoomEvent::Boss { resumed: true }
            } else {
                RoomEvent::Combat { resumed: true }
            });
        }

        let config = &rules.config;
        let monsters = &rules.catalog.monsters;
        if self.room >= config.rooms_per_floor {
            self.room = config.rooms_per_floor + 1;
            self.encounter = Some(encounter::generate_boss(monsters, self.rotation));
            info!(floor = self.floor, "boss room");
            return Ok(RoomEvent::Boss { resumed: false });
        }

        self.room += 1;
        let kind = economy::next_room_kind(
            self.rooms_since_shop,
            self.rooms_since_treasure,
            config,
            dice,
        );
        debug!(floor = self.floor, room = self.room, ?kind, "entering room");
        match kind {
            RoomKind::Treasure => {
                self.rooms_since_treasure = 0;
                self.rooms_since_shop += 1;
                let report = economy::open_treasure(
                    &rules.catalog,
                    &mut self.party,
                    &mut self.inventory,
                    &mut self.coins,
                    self.floor,
                    config,
                    dice,
                    |line| debug!("{line}"),
                );
                Ok(RoomEvent::Treasure(report))
            }
            RoomKind::Shop => {
                self.rooms_since_shop = 0;
                self.rooms_since_treasure += 1;
                let shop = economy::open_shop(&rules.catalog, &self.party, self.floor, config, dice);
                Ok(RoomEvent::Shop(shop))
            }
            RoomKind::Combat => {
                self.rooms_since_shop += 1;
                self.rooms_since_treasure += 1;
                self.encounter = Some(encounter::generate_group(monsters, self.rotation, config, dice));
                Ok(RoomEvent::Combat { resumed: false })
            }
        }
    }

    /// Apply one command. Errors leave the run untouched.
    pub fn act(
        &mut self,
        rules: &Rules,
        dice: &mut Dice,
        command: Command,
    ) -> Result<TurnReport, ValidationError> {
        if self.dead {
            return Err(ValidationError::RunOver);
        }
        let action = match command {
            Command::Attack { target } => CombatAction::Attack { target },
            Command::Skill { skill, target } => CombatAction::Skill { skill, target },
            Command::Retreat => CombatAction::Retreat,
            Command::Exit => {
                let mut report = TurnReport::note("[EXIT] run suspended".to_string());
                report.outcome = Some(Outcome::Exit);
                return Ok(report);
            }
            other => return self.manage(rules, other),
        };
        self.fight(rules, dice, action)
    }

    fn fight(
        &mut self,
        rules: &Rules,
        dice: &mut Dice,
        action: CombatAction,
    ) -> Result<TurnReport, ValidationError> {
        let group = self.encounter.as_mut().ok_or(ValidationError::NoEncounter)?;
        let mut report = combat::resolve_turn(&mut self.party, group, &rules.config, dice, action)?;
        match report.outcome {
            Some(Outcome::Victory(rewards)) => self.claim_victory(rules, rewards, &mut report.log),
            Some(Outcome::Defeat) => {
                self.dead = true;
                self.encounter = None;
                info!(floor = self.floor, room = self.room, "run lost");
            }
            Some(Outcome::Retreat) => self.encounter = None,
            Some(Outcome::Exit) | None => {}
        }
        Ok(report)
    }

    fn claim_victory(&mut self, rules: &Rules, rewards: Rewards, log: &mut Vec<String>) {
        let boss = self.encounter.take().is_some_and(|g| g.boss);
        self.coins = self.coins.saturating_add(rewards.coins);
        let active = self.party.active;
        let bonus = self.bonus_for(active);
        progression::gain_xp(
            self.party.active_mut(),
            rewards.xp,
            self.floor,
            bonus,
            &rules.config,
            |line| log.push(line),
        );
        if boss {
            self.advance_floor(rules, log);
        }
    }

    fn advance_floor(&mut self, rules: &Rules, log: &mut Vec<String>) {
        self.floor += 1;
        self.room = 0;
        let rotated = encounter::rotate_window(&mut self.rotation, rules.catalog.monsters.len());
        log.push(format!("[FLOOR] descending to floor {}", self.floor));
        info!(floor = self.floor, rotation = self.rotation, rotated, "floor cleared");
    }

    /// Submenu commands: never spend the turn.
    fn manage(&mut self, rules: &Rules, command: Command) -> Result<TurnReport, ValidationError> {
        let mut lines = Vec::new();
        let log = |line: String| lines.push(line);
        let config = &rules.config;
        let active = self.party.active;
        match command {
            Command::UpgradeStat { stat } => {
                let bonus = self.bonus_for(active);
                progression::upgrade_stat(self.party.active_mut(), stat, bonus, config, log)?;
            }
            Command::UpgradeSkill { skill } => {
                progression::upgrade_skill(self.party.active_mut(), skill, config, log)?;
            }
            Command::Equip { character, item } => {
                items::equip(&mut self.party, &mut self.inventory, character, item, log)?;
            }
            Command::Unequip { character, kind } => {
                items::unequip(&mut self.party, &mut self.inventory, character, kind, log)?;
            }
            Command::DrinkPotion { character, item } => {
                items::use_potion(&mut self.party, &mut self.inventory, character, item, log)?;
            }
            Command::Select { character } => {
                self.party.select(character)?;
                lines.push(format!("[PARTY] {} takes the lead", self.party.active().name));
            }
            Command::Attack { .. } | Command::Skill { .. } | Command::Retreat | Command::Exit => {}
        }
        let phases = if self.in_combat() {
            vec![Phase::AwaitingAction]
        } else {
            Vec::new()
        };
        Ok(TurnReport {
            log: lines,
            phases,
            ..TurnReport::default()
        })
    }

    /// Buy from the shop currently open. The turn and room do not change.
    pub fn buy(
        &mut self,
        rules: &Rules,
        shop: &mut ShopOffer,
        index: usize,
    ) -> Result<TurnReport, ValidationError> {
        if self.dead {
            return Err(ValidationError::RunOver);
        }
        if self.in_combat() {
            return Err(ValidationError::EncounterInProgress);
        }
        let mut lines = Vec::new();
        economy::purchase(
            shop,
            index,
            &mut self.coins,
            &mut self.party,
            &mut self.inventory,
            &rules.catalog,
            |line| lines.push(line),
        )?;
        Ok(TurnReport {
            log: lines,
            ..TurnReport::default()
        })
    }
}
