//! One encounter, one turn at a time.
//!
//! A turn runs the player's action, then every idle ally, then every living
//! monster, then checks for victory or defeat. Victory is also checked right
//! after the player and after the allies, so a cleared group never strikes
//! back.

pub mod actions;
pub mod allies;
pub mod enemy;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dice::Dice;
use crate::economy::{combat_rewards, Rewards};
use crate::encounter::MonsterGroup;
use crate::error::ValidationError;
use crate::party::Party;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingAction,
    ResolvingAction,
    EnemyTurn,
    CheckOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatAction {
    Attack { target: usize },
    Skill { skill: usize, target: Option<usize> },
    Retreat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory(Rewards),
    Defeat,
    Retreat,
    /// Suspended by the player; the group stays in flight.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnReport {
    pub log: Vec<String>,
    /// Phases visited, in order.
    pub phases: Vec<Phase>,
    pub outcome: Option<Outcome>,
    /// False for submenu commands that leave the fight untouched.
    pub turn_taken: bool,
    /// Party members who dropped to zero this turn.
    pub fallen: Vec<String>,
}

impl TurnReport {
    pub fn note(line: String) -> Self {
        Self {
            log: vec![line],
            ..Self::default()
        }
    }
}

/// Reject the action before anything is rolled or spent.
pub fn validate(party: &Party, group: &MonsterGroup, action: CombatAction) -> Result<(), ValidationError> {
    let actor = party.active();
    if !actor.is_alive() {
        return Err(ValidationError::CharacterDown(actor.name.clone()));
    }
    if group.is_cleared() {
        return Err(ValidationError::NoLivingTargets);
    }
    match action {
        CombatAction::Attack { target } => {
            if !group.is_target(target) {
                return Err(ValidationError::InvalidTarget(target));
            }
        }
        CombatAction::Skill { skill, target } => {
            let skill_def = actor
                .skills
                .get(skill)
                .ok_or(ValidationError::UnknownSkill(skill))?;
            if actor.mana < skill_def.mana_cost {
                return Err(ValidationError::InsufficientMana {
                    need: skill_def.mana_cost,
                    have: actor.mana,
                });
            }
            if skill_def.needs_target() {
                let target = target.ok_or(ValidationError::TargetRequired)?;
                if !group.is_target(target) {
                    return Err(ValidationError::InvalidTarget(target));
                }
            }
        }
        CombatAction::Retreat => {}
    }
    Ok(())
}

/// Resolve one full turn. On `Err` nothing has changed.
pub fn resolve_turn(
    party: &mut Party,
    group: &mut MonsterGroup,
    config: &EngineConfig,
    dice: &mut Dice,
    action: CombatAction,
) -> Result<TurnReport, ValidationError> {
    validate(party, group, action)?;

    let standing: Vec<bool> = party.members.iter().map(|m| m.is_alive()).collect();
    let mut report = TurnReport {
        turn_taken: true,
        phases: vec![Phase::ResolvingAction],
        ..TurnReport::default()
    };
    let mut lines = Vec::new();
    let mut log = |line: String| lines.push(line);

    let mut retreat_failed = false;
    match action {
        CombatAction::Attack { target } => {
            actions::attack(party.active_mut(), group, target, config, dice, &mut log);
        }
        CombatAction::Skill { skill, target } => {
            actions::use_skill(party, group, skill, target, config, dice, &mut log);
        }
        CombatAction::Retreat => {
            let name = party.active().name.clone();
            if actions::attempt_retreat(&name, config.retreat_chance, dice, &mut log) {
                report.phases.push(Phase::CheckOutcome);
                report.outcome = Some(Outcome::Retreat);
                report.log = lines;
                return Ok(report);
            }
            retreat_failed = true;
        }
    }

    if !group.is_cleared() && !retreat_failed {
        allies::idle_turn(party, group, dice, &mut log);
    }
    if !group.is_cleared() {
        report.phases.push(Phase::EnemyTurn);
        enemy::enemy_turn(party, group, config, dice, &mut log);
    }

    report.phases.push(Phase::CheckOutcome);
    for (member, was_standing) in party.members.iter().zip(standing) {
        if was_standing && !member.is_alive() {
            log(format!("[DOWN][{}] has fallen", member.name));
            report.fallen.push(member.name.clone());
        }
    }

    if group.is_cleared() {
        let rewards = combat_rewards(group, config, dice);
        log(format!(
            "[VICTORY] the party wins ({} xp, {} coins)",
            rewards.xp, rewards.coins
        ));
        report.outcome = Some(Outcome::Victory(rewards));
    } else if !party.active().is_alive() {
        log(format!("[DEFEAT][{}] the run is over", party.active().name));
        report.outcome = Some(Outcome::Defeat);
    } else {
        report.phases.push(Phase::AwaitingAction);
    }
    debug!(outcome = ?report.outcome, phases = ?report.phases, "turn resolved");
    report.log = lines;
    Ok(report)
}
