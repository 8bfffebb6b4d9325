use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rotasim::data::catalog::write_catalog_file;
use rotasim::data::records::CatalogFile;
use rotasim::data::{
    assemble_team, load_catalog, load_team, parse_catalog, parse_team, BuffKind, Scope,
};
use rotasim::error::CatalogError;

const CATALOG: &str = "tests/fixtures/catalog.json";
const TEAM: &str = "tests/fixtures/team.yaml";

fn unique_temp_path(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("rotasim-{name}-{stamp}.json"))
}

#[test]
fn fixture_catalog_loads_without_malformed_rows() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    assert!(catalog.malformed.is_empty(), "{:?}", catalog.malformed);
    assert_eq!(catalog.characters.len(), 3);
    assert_eq!(catalog.weapon_buffs.len(), 1);
    let flare = catalog
        .skill("Resonance Skill: Flare")
        .expect("Flare is defined");
    assert_eq!(flare.cooldown, 10.0);
    assert_eq!(flare.tags.to_code_string(), "SkFu");
    let outro = catalog.skill("Outro: Encore").expect("outro is defined");
    assert_eq!(outro.deltas.concerto, -100.0);
}

#[test]
fn team_assembly_binds_gear_buffs_and_startup_passives() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let team = load_team(TEAM).expect("fixture team should load");
    let prepared = assemble_team(&catalog, &team).expect("team should assemble");

    let lumingloss = prepared
        .buffs
        .iter()
        .find(|buff| buff.name == "Lumingloss: Skill Boost")
        .expect("weapon buff is bound to its wielder");
    assert_eq!(lumingloss.amount, 0.2);
    assert_eq!(lumingloss.applies_to, Scope::Character("Encore".into()));
    assert!(lumingloss.can_activate.is_character("Encore"));

    let startup: Vec<&str> = prepared
        .startup
        .iter()
        .map(|buff| buff.definition.name.as_str())
        .collect();
    assert!(startup.contains(&"Fusion Mastery"));
    assert!(startup.contains(&"Molten Rift"));
    assert!(prepared
        .buffs
        .iter()
        .all(|buff| buff.name != "Fusion Mastery"));

    let inferno = prepared.skills.get("Inferno Rider").expect("echo becomes a skill");
    assert_eq!(inferno.owner, "Encore");
    assert_eq!(prepared.rotation.len(), team.rotation.len());
    assert_eq!(prepared.rotation[1].time, 1.0);
    assert_eq!(prepared.rotation[3].time, 3.5);
}

#[test]
fn evaluation_order_puts_damage_sources_first() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let team = load_team(TEAM).expect("fixture team should load");
    let prepared = assemble_team(&catalog, &team).expect("team should assemble");
    assert_eq!(prepared.buffs[0].kind, BuffKind::DamageSource);
}

#[test]
fn unknown_rotation_skill_is_kept_for_the_driver_to_skip() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let mut team = load_team(TEAM).expect("fixture team should load");
    team.rotation[0].skill = "Nonexistent Skill".into();
    team.rotation[1].character = "Stranger".into();
    let prepared = assemble_team(&catalog, &team).expect("unknown rotation entries still assemble");

    assert_eq!(prepared.rotation.len(), team.rotation.len());
    assert_eq!(prepared.rotation[0].skill, "Nonexistent Skill");
    assert_eq!(prepared.rotation[1].time, 0.0);
    assert_eq!(prepared.rotation[2].time, 1.0);
}

#[test]
fn unknown_weapon_is_rejected_at_assembly() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let mut team = load_team(TEAM).expect("fixture team should load");
    team.members[0].weapon = "Nonexistent Blade".into();
    let err = assemble_team(&catalog, &team).expect_err("unknown weapon should fail");
    assert!(matches!(
        err,
        CatalogError::UnknownReference { kind: "weapon", .. }
    ));
}

#[test]
fn teams_must_have_three_members() {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let mut team = load_team(TEAM).expect("fixture team should load");
    team.members.pop();
    assert!(matches!(
        assemble_team(&catalog, &team),
        Err(CatalogError::TeamSize(2))
    ));
}

#[test]
fn malformed_buff_rows_are_skipped() {
    let catalog = parse_catalog(
        r#"{
            "buffs": [
                { "name": "Good", "kind": "Buff", "classification": "All", "effect": "Attack", "amount": 0.1, "duration": 5, "trigger": "Sk", "applies_to": "Team" },
                { "name": "Bad Kind", "kind": "Mystery", "effect": "Attack" },
                { "name": "Bad Effect", "kind": "Buff", "effect": "Luck" }
            ]
        }"#,
    )
    .expect("catalog json should parse");
    assert_eq!(catalog.buffs.len(), 1);
    assert_eq!(catalog.malformed.len(), 2);
    assert_eq!(catalog.malformed[0].name, "Bad Kind");
}

#[test]
fn catalog_file_written_by_importer_reloads() {
    let raw = std::fs::read_to_string(CATALOG).expect("fixture catalog should exist");
    let file: CatalogFile = serde_json::from_str(&raw).expect("fixture catalog should parse");
    let path = unique_temp_path("catalog");
    write_catalog_file(&file, &path).expect("catalog should be written");

    let reloaded = load_catalog(&path).expect("written catalog should load");
    assert_eq!(reloaded.skills.len(), file.skills.len());
    let _ = std::fs::remove_file(path);
}

#[test]
fn partial_team_files_take_default_settings() {
    let team = parse_team(
        "members:\n  - { name: Encore, weapon: Lumingloss, echo: Inferno Rider }\n",
    )
    .expect("partial team should parse");
    assert_eq!(team.settings.level_cap, 90);
    assert_eq!(team.members[0].rank, 1);
    assert!(team.rotation.is_empty());
}
