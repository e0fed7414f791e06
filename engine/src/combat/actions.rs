use crate::config::EngineConfig;
use crate::dice::{Dice, DiceSpec, Notation};
use crate::encounter::MonsterGroup;
use crate::party::{Character, Party};

/// Roll a skill's notation; unusable text rolls nothing and is reported.
pub(crate) fn roll_or_report(
    dice: &mut Dice,
    notation: &Notation,
    what: &str,
    log: &mut impl FnMut(String),
) -> u32 {
    match dice.roll_notation(notation) {
        Ok(total) => total,
        Err(err) => {
            log(format!("[DICE] {what}: {err}"));
            0
        }
    }
}

pub(crate) fn strike(
    attacker: &str,
    group: &mut MonsterGroup,
    target: usize,
    amount: u32,
    tag: &str,
    log: &mut impl FnMut(String),
) {
    let monster = &mut group.monsters[target];
    let before = monster.health;
    let dealt = monster.take_damage(amount);
    log(format!(
        "[{tag}][{attacker}] hits {} for {} ({} → {})",
        monster.name, dealt, before, monster.health
    ));
    if !monster.is_alive() {
        log(format!("[KILL][{attacker}] {} is defeated", monster.name));
    }
}

/// Basic attack: `damage` d2, jittered, then a little mana back.
pub fn attack(
    attacker: &mut Character,
    group: &mut MonsterGroup,
    target: usize,
    config: &EngineConfig,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) {
    let raw = dice.roll(DiceSpec::new(attacker.damage, 2));
    let (lo, hi) = config.attack_jitter;
    let amount = (f64::from(raw) * dice.uniform(lo, hi)).round() as u32;
    strike(&attacker.name, group, target, amount, "ATTACK", &mut log);

    let regen = (attacker.max_mana / 10).max(1);
    let restored = attacker.restore_mana(regen);
    if restored > 0 {
        log(format!(
            "[MANA][{}] +{} ({}/{})",
            attacker.name, restored, attacker.mana, attacker.max_mana
        ));
    }
}

/// Cast the active character's skill `index`. The caller has already
/// checked mana and the target.
pub fn use_skill(
    party: &mut Party,
    group: &mut MonsterGroup,
    index: usize,
    target: Option<usize>,
    config: &EngineConfig,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) {
    let active = party.active;
    let caster = &mut party.members[active];
    let Some(skill) = caster.skills.get(index).cloned() else {
        return;
    };
    if caster.spend_mana(skill.mana_cost).is_err() {
        return;
    }
    let caster_name = caster.name.clone();
    log(format!(
        "[SKILL][{}] casts {} (-{} mp, {}/{})",
        caster_name, skill.name, skill.mana_cost, caster.mana, caster.max_mana
    ));

    if skill.deals_damage() {
        let picks: Vec<Option<usize>> = if skill.needs_target() {
            vec![target.filter(|&t| group.is_target(t))]
        } else {
            (0..skill.hits).map(|_| None).collect()
        };
        for pick in picks {
            let Some(t) = pick.or_else(|| group.random_living(dice)) else {
                break;
            };
            let amount = roll_or_report(dice, &skill.damage, &skill.name, &mut log);
            strike(&caster_name, group, t, amount, "SKILL", &mut log);
        }
    }

    if !skill.healing.is_none() {
        let rolled = roll_or_report(dice, &skill.healing, &skill.name, &mut log);
        let caster = &mut party.members[active];
        let healed = caster.heal(rolled);
        log(format!(
            "[HEAL][{}] heals self for {} (HP {}/{})",
            caster_name, healed, caster.health, caster.max_health
        ));
        let overflow = rolled - healed;
        if overflow > 0 && config.overflow_heal {
            spread_overflow(party, active, overflow, &caster_name, &mut log);
        }
    }
}

/// Hand leftover healing to injured living allies in party order.
fn spread_overflow(
    party: &mut Party,
    caster: usize,
    mut overflow: u32,
    caster_name: &str,
    log: &mut impl FnMut(String),
) {
    for (i, ally) in party.members.iter_mut().enumerate() {
        if overflow == 0 {
            break;
        }
        if i == caster || !ally.is_alive() {
            continue;
        }
        let healed = ally.heal(overflow);
        if healed > 0 {
            overflow -= healed;
            log(format!(
                "[HEAL][{}] overflow heals {} for {} (HP {}/{})",
                caster_name, ally.name, healed, ally.health, ally.max_health
            ));
        }
    }
}

/// Returns true when the party gets away.
pub fn attempt_retreat(
    name: &str,
    chance: f64,
    dice: &mut Dice,
    mut log: impl FnMut(String),
) -> bool {
    if dice.chance(chance) {
        log(format!("[RETREAT][{}] the party escapes", name));
        true
    } else {
        log(format!("[RETREAT][{}] fails to escape", name));
        false
    }
}
