//! Drives one run for one save slot against a `Frontend`.
//!
//! The run is saved after every transition that changes it, so a process
//! killed at any prompt resumes at that prompt.

use tracing::{debug, info};

use crate::combat::Outcome;
use crate::dice::Dice;
use crate::economy::ShopOffer;
use crate::encounter::MonsterGroup;
use crate::error::{ContentIssue, PersistenceError, ValidationError};
use crate::run::{Command, RoomEvent, RunState, Rules};
use crate::save::RunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Suspended mid-fight; the fight resumes on the next session.
    Exited,
    Died,
    /// Stopped between rooms.
    Quit,
}

/// Moments a frontend may want to linger on. Never affects the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Turn,
    Room,
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Attack,
    Skill,
    Retreat,
    Upgrade,
    Equipment,
    Exit,
}

pub const COMBAT_ACTIONS: [ActionKind; 6] = [
    ActionKind::Attack,
    ActionKind::Skill,
    ActionKind::Retreat,
    ActionKind::Upgrade,
    ActionKind::Equipment,
    ActionKind::Exit,
];

/// What the player sees when asked for a combat command.
#[derive(Debug, Clone, Copy)]
pub struct CombatView<'a> {
    pub run: &'a RunState,
    pub group: &'a MonsterGroup,
    pub actions: &'a [ActionKind],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopCommand {
    Buy(usize),
    Manage(Command),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreCommand {
    Continue,
    Manage(Command),
    Quit,
}

pub trait Frontend {
    fn show_room(&mut self, run: &RunState, event: &RoomEvent);
    fn show_log(&mut self, lines: &[String]);
    fn reject(&mut self, error: &ValidationError);
    fn show_issues(&mut self, _issues: &[ContentIssue]) {}

    fn combat_command(&mut self, view: &CombatView<'_>) -> Command;
    fn shop_command(&mut self, run: &RunState, shop: &ShopOffer) -> ShopCommand;
    /// Asked between rooms.
    fn explore_command(&mut self, run: &RunState) -> ExploreCommand;

    fn pace(&mut self, _beat: Beat) {}
}

pub struct Session<'a, S: RunStore + ?Sized> {
    rules: &'a Rules,
    store: &'a S,
    slot: String,
    dice: Dice,
    run: RunState,
    issues: Vec<ContentIssue>,
}

impl<'a, S: RunStore + ?Sized> Session<'a, S> {
    /// Resume the slot, or start a new run there if it is empty.
    pub fn open(
        rules: &'a Rules,
        store: &'a S,
        slot: impl Into<String>,
        dice: Dice,
    ) -> Result<Self, PersistenceError> {
        let slot = slot.into();
        match store.load(&slot)? {
            Some(loaded) => {
                info!(slot = %slot, floor = loaded.run.floor, "resuming run");
                Ok(Self {
                    rules,
                    store,
                    slot,
                    dice,
                    run: loaded.run,
                    issues: loaded.issues,
                })
            }
            None => Self::fresh(rules, store, slot, dice),
        }
    }

    /// Start over in `slot`, replacing whatever was there.
    pub fn fresh(
        rules: &'a Rules,
        store: &'a S,
        slot: impl Into<String>,
        dice: Dice,
    ) -> Result<Self, PersistenceError> {
        let slot = slot.into();
        let run = RunState::new(&rules.catalog);
        store.save(&slot, &run)?;
        info!(slot = %slot, "new run");
        Ok(Self {
            rules,
            store,
            slot,
            dice,
            run,
            issues: Vec::new(),
        })
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn issues(&self) -> &[ContentIssue] {
        &self.issues
    }

    fn save(&self) -> Result<(), PersistenceError> {
        self.store.save(&self.slot, &self.run)
    }

    /// Play until the player stops or the run ends.
    pub fn play(&mut self, frontend: &mut impl Frontend) -> Result<SessionEnd, PersistenceError> {
        if !self.issues.is_empty() {
            frontend.show_issues(&self.issues);
        }
        loop {
            if self.run.dead {
                return Ok(SessionEnd::Died);
            }
            if !self.run.in_combat() {
                match frontend.explore_command(&self.run) {
                    ExploreCommand::Quit => {
                        self.save()?;
                        return Ok(SessionEnd::Quit);
                    }
                    ExploreCommand::Manage(command) => {
                        self.manage(command, frontend)?;
                        continue;
                    }
                    ExploreCommand::Continue => {}
                }
            }

            let floor = self.run.floor;
            let event = match self.run.enter_room(self.rules, &mut self.dice) {
                Ok(event) => event,
                Err(err) => {
                    frontend.reject(&err);
                    return Ok(SessionEnd::Died);
                }
            };
            self.save()?;
            frontend.show_room(&self.run, &event);
            frontend.pace(Beat::Room);

            match event {
                RoomEvent::Combat { .. } | RoomEvent::Boss { .. } => {
                    if let Some(end) = self.fight(frontend)? {
                        return Ok(end);
                    }
                }
                RoomEvent::Shop(mut shop) => self.shop(&mut shop, frontend)?,
                RoomEvent::Treasure(_) => {}
            }

            if self.run.floor != floor {
                self.store.backup(&self.slot, &self.run, self.run.floor)?;
                frontend.pace(Beat::Floor);
            }
        }
    }

    fn manage(&mut self, command: Command, frontend: &mut impl Frontend) -> Result<(), PersistenceError> {
        match self.run.act(self.rules, &mut self.dice, command) {
            Ok(report) => {
                frontend.show_log(&report.log);
                self.save()
            }
            Err(err) => {
                frontend.reject(&err);
                Ok(())
            }
        }
    }

    fn fight(&mut self, frontend: &mut impl Frontend) -> Result<Option<SessionEnd>, PersistenceError> {
        loop {
            let command = {
                let Some(group) = self.run.encounter.as_ref() else {
                    return Ok(None);
                };
                let view = CombatView {
                    run: &self.run,
                    group,
                    actions: &COMBAT_ACTIONS,
                };
                frontend.combat_command(&view)
            };
            let report = match self.run.act(self.rules, &mut self.dice, command) {
                Ok(report) => report,
                Err(err) => {
                    debug!(%err, "command rejected");
                    frontend.reject(&err);
                    continue;
                }
            };
            frontend.show_log(&report.log);
            self.save()?;
            match report.outcome {
                Some(Outcome::Exit) => return Ok(Some(SessionEnd::Exited)),
                Some(Outcome::Defeat) => return Ok(Some(SessionEnd::Died)),
                Some(Outcome::Victory(_)) | Some(Outcome::Retreat) => return Ok(None),
                None if report.turn_taken => frontend.pace(Beat::Turn),
                None => {}
            }
        }
    }

    fn shop(&mut self, shop: &mut ShopOffer, frontend: &mut impl Frontend) -> Result<(), PersistenceError> {
        loop {
            match frontend.shop_command(&self.run, shop) {
                ShopCommand::Leave => return Ok(()),
                ShopCommand::Manage(command) => self.manage(command, frontend)?,
                ShopCommand::Buy(index) => match self.run.buy(self.rules, shop, index) {
                    Ok(report) => {
                        frontend.show_log(&report.log);
                        self.save()?;
                    }
                    Err(err) => frontend.reject(&err),
                },
            }
        }
    }
}
