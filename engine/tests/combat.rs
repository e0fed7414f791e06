use engine::combat::actions::attempt_retreat;
use engine::{
    resolve_turn, Catalog, CombatAction, Command, Dice, EngineConfig, IdleProfile, Monster,
    MonsterGroup, Notation, Outcome, Party, Phase, Rules, RunState, ValidationError,
};

fn noop_log(_: String) {}

fn monster(name: &str, health: u32, damage: u32) -> Monster {
    Monster {
        name: name.to_string(),
        health,
        max_health: health,
        damage,
    }
}

fn group(monsters: Vec<Monster>) -> MonsterGroup {
    MonsterGroup {
        monsters,
        boss: false,
    }
}

fn party() -> Party {
    Catalog::builtin().expect("content").starting_party()
}

#[test]
fn big_hit_kills_but_keeps_the_slot() {
    let mut party = party();
    party.members[0].damage = 10;
    let mut g = group(vec![monster("Slime", 6, 0), monster("Troll", 100, 0)]);
    let config = EngineConfig::default();
    let mut dice = Dice::from_seed(7);

    let report = resolve_turn(&mut party, &mut g, &config, &mut dice, CombatAction::Attack { target: 0 })
        .expect("valid attack");
    assert!(report.turn_taken);
    assert_eq!(g.monsters[0].health, 0);
    assert_eq!(g.monsters.len(), 2);
    assert!(report.log.iter().any(|l| l.starts_with("[KILL][Lucian] Slime")));
    assert_eq!(report.outcome, None);

    let again = resolve_turn(&mut party, &mut g, &config, &mut dice, CombatAction::Attack { target: 0 });
    assert_eq!(again, Err(ValidationError::InvalidTarget(0)));
    assert_eq!(g.monsters.len(), 2);
}

#[test]
fn rejected_actions_change_nothing() {
    let mut party = party();
    let mut g = group(vec![monster("Slime", 6, 2)]);
    let config = EngineConfig::default();
    let mut dice = Dice::from_seed(1);
    party.members[0].mana = 5;
    let (party_before, group_before) = (party.clone(), g.clone());

    let cases = [
        (
            CombatAction::Skill {
                skill: 1,
                target: Some(0),
            },
            ValidationError::InsufficientMana { need: 8, have: 5 },
        ),
        (
            CombatAction::Skill {
                skill: 7,
                target: None,
            },
            ValidationError::UnknownSkill(7),
        ),
        (
            CombatAction::Attack { target: 3 },
            ValidationError::InvalidTarget(3),
        ),
    ];
    for (action, expected) in cases {
        assert_eq!(
            resolve_turn(&mut party, &mut g, &config, &mut dice, action),
            Err(expected)
        );
        assert_eq!(party, party_before);
        assert_eq!(g, group_before);
    }

    party.members[0].mana = 10;
    let missing_target = CombatAction::Skill {
        skill: 1,
        target: None,
    };
    assert_eq!(
        resolve_turn(&mut party, &mut g, &config, &mut dice, missing_target),
        Err(ValidationError::TargetRequired)
    );
    assert_eq!(party.members[0].mana, 10);
}

#[test]
fn phases_run_in_order() {
    let mut party = party();
    let mut g = group(vec![monster("Troll", 100, 1)]);
    let report = resolve_turn(
        &mut party,
        &mut g,
        &EngineConfig::default(),
        &mut Dice::from_seed(3),
        CombatAction::Attack { target: 0 },
    )
    .expect("valid");
    assert_eq!(
        report.phases,
        [
            Phase::ResolvingAction,
            Phase::EnemyTurn,
            Phase::CheckOutcome,
            Phase::AwaitingAction
        ]
    );
    let ally = report.log.iter().position(|l| l.starts_with("[ALLY]"));
    let enemy = report.log.iter().position(|l| l.starts_with("[ENEMY]"));
    assert!(ally.expect("ally acted") < enemy.expect("enemy acted"));
}

#[test]
fn failed_retreat_still_takes_a_beating() {
    let mut party = party();
    let mut g = group(vec![monster("Troll", 100, 3)]);
    let config = EngineConfig {
        retreat_chance: 0.0,
        ..EngineConfig::default()
    };
    let report = resolve_turn(&mut party, &mut g, &config, &mut Dice::from_seed(2), CombatAction::Retreat)
        .expect("valid");
    assert_eq!(report.outcome, None);
    assert!(report.phases.contains(&Phase::EnemyTurn));
    assert!(report.log.iter().any(|l| l.starts_with("[ENEMY][Troll]")));
    assert!(!report.log.iter().any(|l| l.starts_with("[ALLY]")));
    assert_eq!(g.monsters[0].health, 100);

    let config = EngineConfig {
        retreat_chance: 1.0,
        ..EngineConfig::default()
    };
    let report = resolve_turn(&mut party, &mut g, &config, &mut Dice::from_seed(2), CombatAction::Retreat)
        .expect("valid");
    assert_eq!(report.outcome, Some(Outcome::Retreat));
    assert!(!report.phases.contains(&Phase::EnemyTurn));
}

#[test]
fn retreat_rate_matches_chance() {
    let mut pooled = 0;
    for seed in 0..5 {
        let mut dice = Dice::from_seed(seed);
        let wins = (0..1000)
            .filter(|_| attempt_retreat("Lucian", 0.75, &mut dice, noop_log))
            .count();
        let rate = wins as f64 / 1000.0;
        assert!((rate - 0.75).abs() < 0.06, "seed {seed}: {rate}");
        pooled += wins;
    }
    let rate = pooled as f64 / 5000.0;
    assert!((rate - 0.75).abs() < 0.03, "pooled {rate}");
}

#[test]
fn victory_pays_out_before_enemies_act() {
    let mut party = party();
    party.members[0].damage = 10;
    let mut g = group(vec![monster("Slime", 6, 2)]);
    let report = resolve_turn(
        &mut party,
        &mut g,
        &EngineConfig::default(),
        &mut Dice::from_seed(5),
        CombatAction::Attack { target: 0 },
    )
    .expect("valid");
    let Some(Outcome::Victory(rewards)) = report.outcome else {
        panic!("expected victory, got {:?}", report.outcome);
    };
    // (2*2 + 2) * 1.5
    assert_eq!(rewards.xp, 9);
    // (2 + 6/2) * [0.75, 1.25]
    assert!((4..=6).contains(&rewards.coins), "{}", rewards.coins);
    assert!(!report.phases.contains(&Phase::EnemyTurn));
    assert!(!report.log.iter().any(|l| l.starts_with("[ALLY]")));
}

#[test]
fn overflow_heal_reaches_injured_allies() {
    let mut party = party();
    party.select(1).expect("Ilana stands");
    party.members[0].health = 17;
    let g = group(vec![monster("Troll", 100, 0)]);
    // Necro Blast: 1d4 damage, then 1d4 heal.
    let necro = CombatAction::Skill {
        skill: 0,
        target: Some(0),
    };

    let mut on = party.clone();
    let mut g_on = g.clone();
    let report = resolve_turn(&mut on, &mut g_on, &EngineConfig::default(), &mut Dice::from_scripted(vec![2, 4]), necro)
        .expect("valid");
    assert_eq!(on.members[0].health, 20);
    assert!(report
        .log
        .iter()
        .any(|l| l == "[HEAL][Ilana] overflow heals Lucian for 3 (HP 20/20)"));

    let config = EngineConfig {
        overflow_heal: false,
        ..EngineConfig::default()
    };
    let mut off = party.clone();
    let mut g_off = g.clone();
    resolve_turn(&mut off, &mut g_off, &config, &mut Dice::from_scripted(vec![2, 4]), necro).expect("valid");
    assert_eq!(off.members[0].health, 17);
}

#[test]
fn bad_skill_notation_rolls_nothing() {
    let mut party = party();
    party.members[0].skills[0].damage = Notation::Raw("3 fire".into());
    party.members[1].idle = IdleProfile::Passive;
    party.members[2].idle = IdleProfile::Passive;
    let mut g = group(vec![monster("Troll", 100, 0)]);
    let report = resolve_turn(
        &mut party,
        &mut g,
        &EngineConfig::default(),
        &mut Dice::from_seed(4),
        CombatAction::Skill {
            skill: 0,
            target: None,
        },
    )
    .expect("mana and target are fine");
    assert_eq!(g.monsters[0].health, 100);
    assert!(report.log.iter().any(|l| l.starts_with("[DICE] Fireblast")));
    assert_eq!(party.members[0].mana, 6);
}

#[test]
fn enemies_skip_the_fallen() {
    let mut party = party();
    party.members[1].health = 0;
    party.members[2].health = 0;
    let mut g = group(vec![monster("Wolf", 100, 1), monster("Wolf", 100, 1)]);
    let report = resolve_turn(
        &mut party,
        &mut g,
        &EngineConfig::default(),
        &mut Dice::from_seed(6),
        CombatAction::Attack { target: 0 },
    )
    .expect("valid");
    let hits: Vec<&String> = report.log.iter().filter(|l| l.starts_with("[ENEMY]")).collect();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|l| l.contains("hits Lucian")));
}

#[test]
fn active_death_ends_the_run() {
    let rules = Rules::builtin().expect("rules");
    let rules = Rules {
        config: EngineConfig {
            active_target_weight: 1,
            ally_target_weight: 0,
            ..rules.config
        },
        ..rules
    };
    let mut run = RunState::new(&rules.catalog);
    run.party.members[0].health = 1;
    run.encounter = Some(group(vec![monster("Ogre", 1000, 20)]));
    let mut dice = Dice::from_seed(9);

    let report = run
        .act(&rules, &mut dice, Command::Attack { target: 0 })
        .expect("valid");
    assert_eq!(report.outcome, Some(Outcome::Defeat));
    assert_eq!(report.fallen, ["Lucian"]);
    assert!(run.dead);
    assert!(run.encounter.is_none());
    assert_eq!(
        run.act(&rules, &mut dice, Command::Retreat),
        Err(ValidationError::RunOver)
    );
    assert_eq!(
        run.enter_room(&rules, &mut dice),
        Err(ValidationError::RunOver)
    );
}

#[test]
fn ally_death_is_reported_but_not_fatal() {
    let rules = Rules::builtin().expect("rules");
    let rules = Rules {
        config: EngineConfig {
            active_target_weight: 0,
            ally_target_weight: 1,
            ..rules.config
        },
        ..rules
    };
    let mut run = RunState::new(&rules.catalog);
    run.party.members[1].health = 1;
    run.party.members[2].health = 1;
    run.encounter = Some(group(vec![monster("Ogre", 1000, 20), monster("Ogre", 1000, 20)]));
    let report = run
        .act(&rules, &mut Dice::from_seed(10), Command::Attack { target: 0 })
        .expect("valid");
    assert_eq!(report.outcome, None);
    assert_eq!(report.fallen, ["Ilana", "George"]);
    assert!(!run.dead);
    assert!(run.party.members[0].is_alive());
}
