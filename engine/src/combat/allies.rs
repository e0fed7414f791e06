use crate::combat::actions::strike;
use crate::dice::Dice;
use crate::encounter::MonsterGroup;
use crate::party::{IdleProfile, Party};

/// Every living member other than the active one acts on their profile.
pub fn idle_turn(
    party: &mut Party,
    group: &mut MonsterGroup,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) {
    for i in 0..party.members.len() {
        if group.is_cleared() {
            break;
        }
        let ally = &party.members[i];
        if i == party.active || !ally.is_alive() {
            continue;
        }
        let Some(spec) = ally.idle.scaled(ally.level) else {
            continue;
        };
        let name = ally.name.clone();
        let profile = ally.idle;
        match profile {
            IdleProfile::Melee { .. } => {
                if let Some(target) = group.random_living(dice) {
                    let amount = dice.roll(spec);
                    strike(&name, group, target, amount, "ALLY", &mut log);
                }
            }
            IdleProfile::Area { .. } => {
                let targets: Vec<usize> = group.living().collect();
                for target in targets {
                    let amount = dice.roll(spec);
                    strike(&name, group, target, amount, "ALLY", &mut log);
                }
            }
            IdleProfile::Support { .. } => {
                let amount = dice.roll(spec);
                for member in party.members.iter_mut().filter(|m| m.is_alive()) {
                    let healed = member.heal(amount);
                    if healed > 0 {
                        log(format!(
                            "[ALLY][{}] heals {} for {} (HP {}/{})",
                            name, member.name, healed, member.health, member.max_health
                        ));
                    }
                }
            }
            IdleProfile::Passive => {}
        }
    }
}
