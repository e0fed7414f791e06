use std::fs;
use std::path::Path;

use engine::economy::ShopOffer;
use engine::autopilot::Autopilot;
use engine::save::{decode, encode};
use engine::session::{CombatView, ExploreCommand, ShopCommand};
use engine::{
    items, Command, ContentIssue, Dice, EngineConfig, Frontend, ItemKind, MemoryStore, Monster,
    MonsterGroup, PersistenceError, RoomEvent, Rules, RunState, RunStore, SaveStore, Session,
    SessionEnd, ValidationError, FORMAT_VERSION,
};
use tempfile::tempdir;

fn noop_log(_: String) {}

fn mid_fight(rules: &Rules) -> RunState {
    let mut run = RunState::new(&rules.catalog);
    run.floor = 3;
    run.room = 4;
    run.rotation = 2;
    run.coins = 41;
    run.rooms_since_shop = 2;
    run.rooms_since_treasure = 7;
    run.inventory
        .add(rules.catalog.item("Iron Sword").expect("sword").clone());
    run.inventory
        .add(rules.catalog.item("Healing Potion").expect("potion").clone());
    items::equip(&mut run.party, &mut run.inventory, 2, 0, noop_log).expect("equip");
    run.party.members[0].health = 11;
    run.party.members[0].skill_points = 4;
    run.party.members[0].skills[0].level = 3;
    run.party.select(1).expect("select");
    run.encounter = Some(MonsterGroup {
        monsters: vec![
            Monster {
                name: "Goblin".into(),
                health: 0,
                max_health: 10,
                damage: 3,
            },
            Monster {
                name: "Ghoul".into(),
                health: 9,
                max_health: 18,
                damage: 5,
            },
        ],
        boss: false,
    });
    run
}

#[test]
fn file_round_trip_keeps_the_whole_run() {
    let rules = Rules::builtin().expect("rules");
    let dir = tempdir().expect("tempdir");
    let store = SaveStore::open(dir.path().join("saves")).expect("open");
    let run = mid_fight(&rules);

    store.save("hero", &run).expect("save");
    let loaded = store.load("hero").expect("load").expect("slot exists");
    assert!(loaded.issues.is_empty(), "{:?}", loaded.issues);
    assert_eq!(loaded.run, run);

    let raw = store.read_raw("hero").expect("read").expect("text");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(doc["version"], FORMAT_VERSION);
    assert_eq!(doc["counters"]["floor"], 3);
    assert_eq!(doc["party"][0]["skills"]["names"][0], "Fireblast");
    assert_eq!(doc["inventory"][0]["owner"], "George");
}

#[test]
fn slots_list_exist_and_delete() {
    let rules = Rules::builtin().expect("rules");
    let dir = tempdir().expect("tempdir");
    let store = SaveStore::open(dir.path()).expect("open");
    let run = RunState::new(&rules.catalog);

    assert!(store.load("missing").expect("load").is_none());
    store.save("b", &run).expect("save b");
    store.save("a", &run).expect("save a");
    store.backup("a", &run, 2).expect("backup");
    assert!(dir.path().join("a_backup_floor2.json").is_file());

    assert_eq!(store.list().expect("list"), ["a", "b"]);
    assert!(store.exists("a").expect("exists"));
    assert!(store.delete("a").expect("delete"));
    assert!(!store.delete("a").expect("delete twice"));
    assert!(!store.exists("a").expect("exists"));
    assert_eq!(store.list().expect("list"), ["b"]);

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .filter(|name| !name.ends_with(".json"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn bad_slot_names_and_corrupt_files_are_errors() {
    let rules = Rules::builtin().expect("rules");
    let dir = tempdir().expect("tempdir");
    let store = SaveStore::open(dir.path()).expect("open");
    let run = RunState::new(&rules.catalog);

    assert!(matches!(
        store.save("../escape", &run),
        Err(PersistenceError::InvalidSlot(_))
    ));
    assert!(matches!(store.load(""), Err(PersistenceError::InvalidSlot(_))));

    fs::write(dir.path().join("broken.json"), "{ not json").expect("write");
    assert!(matches!(
        store.load("broken"),
        Err(PersistenceError::Decode { .. })
    ));
}

#[test]
fn memory_store_uses_the_same_codec() {
    let rules = Rules::builtin().expect("rules");
    let store = MemoryStore::new();
    let run = mid_fight(&rules);
    store.save("mem", &run).expect("save");
    assert_eq!(store.raw("mem"), Some(encode(&run).expect("encode")));
    assert_eq!(store.load("mem").expect("load").expect("slot").run, run);
    assert_eq!(store.slots(), ["mem"]);
}

const LEGACY: &str = r#"{
  "party": [
    {
      "name": "Lucian",
      "health": 99,
      "max_health": 25,
      "mana": 4,
      "max_mana": 10,
      "damage": 1,
      "skills": {
        "names": ["Fireblast", "Firebolt"],
        "damage": ["1d2", "2d8"],
        "attacks": [2],
        "healing": ["None", "None"],
        "mana_costs": [4, 8],
        "level": [1, 1],
        "max_level": [10, 10],
        "upgrade_costs": [1, 1]
      }
    }
  ],
  "coins": 12,
  "inventory": [
    { "name": "Chainmail", "kind": "armor", "effect": "+5 hp", "owner": "Lucian" },
    { "name": "Tower Shield", "kind": "armor", "bonus": { "max_health": 15 }, "owner": "Lucian" },
    { "name": "Healing Potion", "kind": "potion", "effect": "restore full health", "owner": "Lucian" },
    { "name": "Iron Sword", "kind": "weapon", "bonus": { "damage": 1 }, "owner": "Nobody" }
  ]
}"#;

#[test]
fn legacy_document_is_repaired_with_warnings() {
    let loaded = decode(LEGACY, Path::new("legacy.json")).expect("decode");
    let issues = &loaded.issues;
    assert!(issues.contains(&ContentIssue::VersionMismatch {
        found: "0.1".into(),
        expected: FORMAT_VERSION.into(),
    }));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ContentIssue::MigratedEffect { item, .. } if item == "Chainmail")));
    assert!(issues.iter().any(
        |i| matches!(i, ContentIssue::DuplicateEquip { item, kind: ItemKind::Armor, .. } if item == "Tower Shield")
    ));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ContentIssue::UnequippableEquip { item } if item == "Healing Potion")));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ContentIssue::OrphanedEquip { owner, .. } if owner == "Nobody")));
    assert!(issues.iter().any(
        |i| matches!(i, ContentIssue::SkillTableMisaligned { column: "attacks", .. })
    ));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ContentIssue::ClampedStat { stat: "health", .. })));

    let run = &loaded.run;
    assert_eq!(run.floor, 1);
    assert_eq!(run.coins, 12);
    let owners: Vec<Option<&str>> = run.inventory.items.iter().map(|i| i.owner.as_deref()).collect();
    assert_eq!(owners, [Some("Lucian"), None, None, None]);

    // Chainmail's migrated +5 is the only bonus left; base was stored stats minus it.
    let lucian = &run.party.members[0];
    assert_eq!(lucian.base.max_health, 20);
    assert_eq!(lucian.max_health, 25);
    assert_eq!(lucian.health, 25);
    assert_eq!(lucian.skills[1].hits, 1);
    assert_eq!(lucian.level, 1);
    assert_eq!(lucian.xp_to_next, 10);
}

#[test]
fn items_of_a_removed_kind_are_dropped_on_load() {
    let rules = Rules::builtin().expect("rules");
    let run = mid_fight(&rules);
    let text = encode(&run).expect("encode");
    assert!(text.contains(r#""kind": "weapon""#));
    let text = text.replace(r#""kind": "weapon""#, r#""kind": "amulet""#);

    let loaded = decode(&text, Path::new("amulet.json")).expect("decode");
    assert!(loaded.issues.contains(&ContentIssue::UnknownItemKind {
        item: "Iron Sword".into(),
        kind: "amulet".into(),
    }));
    let names: Vec<&str> = loaded.run.inventory.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Healing Potion"]);
    // The sword's wearer is back to base stats.
    let wearer = &loaded.run.party.members[2];
    assert_eq!(wearer.damage, wearer.base.damage);
    assert_eq!(loaded.run.encounter, run.encounter);
}

#[test]
fn save_without_party_is_refused() {
    let rules = Rules::builtin().expect("rules");
    let run = RunState::new(&rules.catalog);
    let mut doc: serde_json::Value =
        serde_json::from_str(&encode(&run).expect("encode")).expect("json");
    doc["party"] = serde_json::json!([]);

    let result = decode(&doc.to_string(), Path::new("empty.json"));
    assert!(matches!(result, Err(PersistenceError::EmptyParty(_))));

    let dir = tempdir().expect("tempdir");
    let store = SaveStore::open(dir.path()).expect("open");
    fs::write(dir.path().join("empty.json"), doc.to_string()).expect("write");
    assert!(matches!(
        Session::open(&rules, &store, "empty", Dice::from_seed(1)),
        Err(PersistenceError::EmptyParty(_))
    ));
}

#[test]
fn finished_fight_in_a_save_is_dropped() {
    let rules = Rules::builtin().expect("rules");
    let mut run = mid_fight(&rules);
    if let Some(group) = run.encounter.as_mut() {
        for m in &mut group.monsters {
            m.health = 0;
        }
    }
    let store = MemoryStore::new();
    store.save("won", &run).expect("save");

    let loaded = store.load("won").expect("load").expect("slot");
    assert_eq!(loaded.run.encounter, None);
    assert!(loaded.issues.contains(&ContentIssue::ClearedEncounter));

    let mut session = Session::open(&rules, &store, "won", Dice::from_seed(4)).expect("open");
    let mut pilot = Autopilot::new(Some(2));
    let end = session.play(&mut pilot).expect("play");
    assert!(matches!(end, SessionEnd::Quit | SessionEnd::Died), "{end:?}");
    assert!(pilot.rooms >= 1);
}

#[test]
fn memory_store_checks_slot_names_too() {
    let rules = Rules::builtin().expect("rules");
    let saved = MemoryStore::new().save("a/b", &RunState::new(&rules.catalog));
    assert!(matches!(saved, Err(PersistenceError::InvalidSlot(_))));
}

/// Attacks once, then suspends.
struct AttackThenExit {
    turns: u32,
}

impl Frontend for AttackThenExit {
    fn show_room(&mut self, _run: &RunState, _event: &RoomEvent) {}
    fn show_log(&mut self, _lines: &[String]) {}
    fn reject(&mut self, error: &ValidationError) {
        panic!("unexpected rejection: {error}");
    }
    fn combat_command(&mut self, view: &CombatView<'_>) -> Command {
        self.turns += 1;
        if self.turns > 1 {
            return Command::Exit;
        }
        let target = view.group.living().next().expect("living monster");
        Command::Attack { target }
    }
    fn shop_command(&mut self, _run: &RunState, _shop: &ShopOffer) -> ShopCommand {
        ShopCommand::Leave
    }
    fn explore_command(&mut self, _run: &RunState) -> ExploreCommand {
        ExploreCommand::Continue
    }
}

#[derive(Default)]
struct Observer {
    events: Vec<RoomEvent>,
}

impl Frontend for Observer {
    fn show_room(&mut self, _run: &RunState, event: &RoomEvent) {
        self.events.push(event.clone());
    }
    fn show_log(&mut self, _lines: &[String]) {}
    fn reject(&mut self, _error: &ValidationError) {}
    fn combat_command(&mut self, _view: &CombatView<'_>) -> Command {
        Command::Exit
    }
    fn shop_command(&mut self, _run: &RunState, _shop: &ShopOffer) -> ShopCommand {
        ShopCommand::Leave
    }
    fn explore_command(&mut self, _run: &RunState) -> ExploreCommand {
        ExploreCommand::Quit
    }
}

#[test]
fn exit_mid_fight_resumes_the_same_fight() {
    let base = Rules::builtin().expect("rules");
    // Every room is a fight.
    let rules = Rules::new(
        EngineConfig {
            shop_chance: 0.0,
            treasure_chance: 0.0,
            shop_guarantee: 1000,
            treasure_guarantee: 1000,
            ..base.config
        },
        base.catalog,
    )
    .expect("valid config");
    let dir = tempdir().expect("tempdir");
    let store = SaveStore::open(dir.path()).expect("open");

    let mut session = Session::open(&rules, &store, "resume", Dice::from_seed(21)).expect("open");
    let mut first = AttackThenExit { turns: 0 };
    let end = session.play(&mut first).expect("play");
    assert_eq!(end, SessionEnd::Exited);
    let suspended = session.run().clone();
    let in_flight = suspended.encounter.clone();
    assert!(in_flight.is_some());

    let mut second = Session::open(&rules, &store, "resume", Dice::from_seed(99)).expect("reopen");
    assert_eq!(second.run(), &suspended);
    let mut observer = Observer::default();
    assert_eq!(second.play(&mut observer).expect("play"), SessionEnd::Exited);
    assert_eq!(observer.events, [RoomEvent::Combat { resumed: true }]);
    assert_eq!(second.run().encounter, in_flight);
    assert_eq!(second.run().room, suspended.room);
}
