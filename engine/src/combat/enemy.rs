use crate::config::EngineConfig;
use crate::dice::{Dice, DiceSpec};
use crate::encounter::MonsterGroup;
use crate::party::Party;

/// Weighted pick among living members, favouring the active one.
pub fn pick_target(party: &Party, config: &EngineConfig, dice: &mut Dice) -> Option<usize> {
    let living: Vec<usize> = party.living().collect();
    let weights: Vec<u32> = living
        .iter()
        .map(|&i| {
            if i == party.active {
                config.active_target_weight
            } else {
                config.ally_target_weight
            }
        })
        .collect();
    let pick = dice
        .weighted(&weights)
        .or_else(|| dice.index(living.len()))?;
    Some(living[pick])
}

/// Each living monster strikes once.
pub fn enemy_turn(
    party: &mut Party,
    group: &MonsterGroup,
    config: &EngineConfig,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) {
    for monster in group.monsters.iter().filter(|m| m.is_alive()) {
        let Some(target) = pick_target(party, config, dice) else {
            break;
        };
        let amount = dice.roll(DiceSpec::new(monster.damage, 2));
        let member = &mut party.members[target];
        let before = member.health;
        let taken = member.take_damage(amount);
        log(format!(
            "[ENEMY][{}] hits {} for {} ({} → {})",
            monster.name, member.name, taken, before, member.health
        ));
    }
}
