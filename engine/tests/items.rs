use engine::items::{equip, unequip, use_potion};
use engine::{Catalog, Inventory, Item, ItemKind, LegacyEffect, Party, ValidationError};

fn noop_log(_: String) {}

fn setup(names: &[&str]) -> (Party, Inventory) {
    let catalog = Catalog::builtin().expect("content");
    let mut inventory = Inventory::default();
    for name in names {
        inventory.add(catalog.item(name).expect("known item").clone());
    }
    (catalog.starting_party(), inventory)
}

#[test]
fn equipping_replaces_the_same_kind() {
    let (mut party, mut inv) = setup(&["Iron Sword", "Steel Blade", "Chainmail"]);
    equip(&mut party, &mut inv, 0, 0, noop_log).expect("sword");
    assert_eq!(party.members[0].damage, 2);

    let mut lines = Vec::new();
    equip(&mut party, &mut inv, 0, 1, |l| lines.push(l)).expect("blade");
    assert_eq!(party.members[0].damage, 4);
    assert_eq!(inv.items[0].owner, None);
    assert_eq!(inv.items[1].owner.as_deref(), Some("Lucian"));
    assert_eq!(lines[0], "[EQUIP][Lucian] removes Iron Sword (back to inventory)");

    equip(&mut party, &mut inv, 0, 2, noop_log).expect("armor");
    assert_eq!(inv.equipped_by("Lucian").count(), 2);
    assert_eq!(party.members[0].max_health, 30);
    assert_eq!(party.members[0].health, 20);
}

#[test]
fn only_pool_items_of_equippable_kinds() {
    let (mut party, mut inv) = setup(&["Iron Sword", "Healing Potion"]);
    equip(&mut party, &mut inv, 0, 0, noop_log).expect("sword");

    assert_eq!(
        equip(&mut party, &mut inv, 2, 0, noop_log),
        Err(ValidationError::UnknownItem(0))
    );
    assert_eq!(
        equip(&mut party, &mut inv, 0, 1, noop_log),
        Err(ValidationError::NotEquippable(ItemKind::Potion))
    );
    assert_eq!(
        equip(&mut party, &mut inv, 4, 1, noop_log),
        Err(ValidationError::UnknownCharacter(4))
    );
    assert_eq!(
        equip(&mut party, &mut inv, 0, 9, noop_log),
        Err(ValidationError::UnknownItem(9))
    );
}

#[test]
fn unequip_clamps_vitals_to_the_new_maximum() {
    let (mut party, mut inv) = setup(&["Tower Shield"]);
    equip(&mut party, &mut inv, 0, 0, noop_log).expect("shield");
    party.members[0].health = 32;

    unequip(&mut party, &mut inv, 0, ItemKind::Armor, noop_log).expect("unequip");
    assert_eq!(party.members[0].max_health, 20);
    assert_eq!(party.members[0].health, 20);
    assert_eq!(inv.pool().count(), 1);
    assert_eq!(
        unequip(&mut party, &mut inv, 0, ItemKind::Armor, noop_log),
        Err(ValidationError::NothingEquipped("Lucian".into()))
    );
}

#[test]
fn potions_restore_everything_and_are_used_up() {
    let (mut party, mut inv) = setup(&["Iron Sword", "Healing Potion"]);
    let ilana = &mut party.members[1];
    ilana.health = 2;
    ilana.mana = 0;

    let mut lines = Vec::new();
    use_potion(&mut party, &mut inv, 1, 1, |l| lines.push(l)).expect("drink");
    assert_eq!((party.members[1].health, party.members[1].mana), (15, 10));
    assert!(!inv.contains("Healing Potion"));
    assert_eq!(lines, ["[POTION][Ilana] drinks Healing Potion (HP 15/15, MP 10/10)"]);

    assert_eq!(
        use_potion(&mut party, &mut inv, 1, 0, noop_log),
        Err(ValidationError::NotAPotion)
    );
    assert_eq!(inv.items.len(), 1);
}

#[test]
fn the_fallen_cannot_drink() {
    let (mut party, mut inv) = setup(&["Elixir"]);
    party.members[2].health = 0;
    assert_eq!(
        use_potion(&mut party, &mut inv, 2, 0, noop_log),
        Err(ValidationError::CharacterDown("George".into()))
    );
    assert_eq!(inv.items.len(), 1);
    assert_eq!(party.members[2].health, 0);
}

#[test]
fn bonuses_stack_across_slots() {
    let (mut party, mut inv) = setup(&["Runed Staff", "Lucky Charm", "Leather Armor"]);
    for item in 0..3 {
        equip(&mut party, &mut inv, 2, item, noop_log).expect("equip");
    }
    let george = &party.members[2];
    // base 25/5/2
    assert_eq!(george.damage, 4);
    assert_eq!(george.max_mana, 9);
    assert_eq!(george.max_health, 31);
}

#[test]
fn builtin_effect_text_matches_structured_bonus() {
    let catalog = Catalog::builtin().expect("content");
    for item in &catalog.items {
        let Some(effect) = item.effect.as_deref() else {
            continue;
        };
        let parsed = LegacyEffect::parse(effect)
            .unwrap_or_else(|| panic!("{}: unreadable effect {effect:?}", item.name));
        assert_eq!(parsed.bonus, item.bonus, "{}", item.name);
        assert_eq!(parsed.restore_full, item.restore_full, "{}", item.name);
    }
}

#[test]
fn legacy_rows_gain_structure_on_load() {
    let mut relic = Item {
        name: "Ancient Relic".into(),
        kind: ItemKind::Relic,
        bonus: Default::default(),
        restore_full: false,
        effect: Some("+5 all stats".into()),
        owner: None,
    };
    assert!(relic.migrate_legacy());
    assert_eq!(relic.bonus.damage, 5);
    assert_eq!(relic.bonus.max_health, 5);
    assert_eq!(relic.bonus.max_mana, 5);
    assert!(!relic.migrate_legacy());
}
