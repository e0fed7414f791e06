use engine::encounter::{generate_boss, generate_group, rotate_window, window};
use engine::{Catalog, Dice, EngineConfig};

#[test]
fn group_size_follows_growth_cascade() {
    let catalog = Catalog::builtin().expect("content");
    let config = EngineConfig::default();
    let mut dice = Dice::from_seed(2024);
    let n = 10_000;
    let mut sizes = [0usize; 6];
    for _ in 0..n {
        let group = generate_group(&catalog.monsters, 0, &config, &mut dice);
        assert!((1..=5).contains(&group.monsters.len()));
        assert!(!group.boss);
        sizes[group.monsters.len()] += 1;
    }

    let single = sizes[1] as f64 / n as f64;
    assert!((single - 0.70).abs() < 0.02, "P(1) = {single}");

    let two_plus: usize = sizes[2..].iter().sum();
    let three_plus: usize = sizes[3..].iter().sum();
    let third = three_plus as f64 / two_plus as f64;
    assert!((third - 0.15).abs() < 0.03, "P(3+|2+) = {third}");
}

#[test]
fn monsters_come_from_the_window() {
    let catalog = Catalog::builtin().expect("content");
    let config = EngineConfig::default();
    let mut dice = Dice::from_seed(8);
    let allowed: Vec<&str> = catalog.monsters[window(catalog.monsters.len(), 4)]
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(allowed, ["Bandit", "Ghoul", "Orc"]);
    for _ in 0..500 {
        for m in generate_group(&catalog.monsters, 4, &config, &mut dice).monsters {
            assert!(allowed.contains(&m.name.as_str()), "{}", m.name);
        }
    }
}

#[test]
fn weakest_template_dominates() {
    let catalog = Catalog::builtin().expect("content");
    let config = EngineConfig::default();
    let mut dice = Dice::from_seed(31);
    let mut slimes = 0;
    let mut total = 0;
    for _ in 0..4000 {
        for m in generate_group(&catalog.monsters, 0, &config, &mut dice).monsters {
            total += 1;
            if m.name == "Slime" {
                slimes += 1;
            }
        }
    }
    // weights 10:7:3
    let share = slimes as f64 / total as f64;
    assert!((share - 0.5).abs() < 0.04, "{share}");
}

#[test]
fn boss_is_one_tier_past_the_window() {
    let catalog = Catalog::builtin().expect("content");
    let boss = generate_boss(&catalog.monsters, 0);
    assert!(boss.boss);
    assert_eq!(boss.monsters.len(), 1);
    assert_eq!(boss.monsters[0].name, "Skeleton");
    let last = generate_boss(&catalog.monsters, 50);
    assert_eq!(last.monsters[0].name, "Dragon");
}

#[test]
fn window_walks_to_the_end_and_stops() {
    let catalog = Catalog::builtin().expect("content");
    let len = catalog.monsters.len();
    let mut rotation = 0;
    let mut steps = 0;
    while rotate_window(&mut rotation, len) {
        steps += 1;
    }
    assert_eq!(steps, len - 3);
    assert_eq!(window(len, rotation), len - 3..len);
    assert!(!rotate_window(&mut rotation, len));
}
