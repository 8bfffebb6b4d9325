use rotasim::combat::{run_rotation, RunReport, StepRecord};
use rotasim::data::records::{BuffRecord, CatalogFile};
use rotasim::data::{
    assemble_team, load_catalog, load_team, parse_catalog, DefinitionCatalog, RotationEntry,
    TeamConfig,
};

const CATALOG: &str = "tests/fixtures/catalog.json";
const TEAM: &str = "tests/fixtures/team.yaml";

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn fixture() -> (DefinitionCatalog, TeamConfig) {
    let catalog = load_catalog(CATALOG).expect("fixture catalog should load");
    let team = load_team(TEAM).expect("fixture team should load");
    (catalog, team)
}

fn run(catalog: &DefinitionCatalog, team: &TeamConfig) -> RunReport {
    let prepared = assemble_team(catalog, team).expect("team should assemble");
    run_rotation(&prepared)
}

fn rotation(entries: &[(&str, &str)]) -> Vec<RotationEntry> {
    entries
        .iter()
        .map(|(character, skill)| RotationEntry {
            character: character.to_string(),
            skill: skill.to_string(),
            time: None,
        })
        .collect()
}

fn step<'a>(report: &'a RunReport, skill: &str) -> &'a StepRecord {
    report
        .steps
        .iter()
        .find(|step| step.skill == skill)
        .unwrap_or_else(|| panic!("no step for {skill}"))
}

#[test]
fn single_strike_without_modifiers_deals_exactly_base_attack() {
    let catalog = parse_catalog(
        r#"{
            "skills": [
                { "name": "Strike", "damage": 1.0, "cast_time": 1.0, "classification": "No", "hits": 1, "owner": "Alpha" }
            ],
            "characters": [
                { "name": "Alpha", "base_attack": 1000, "base_health": 1000, "base_defense": 100, "element": "Physical", "max_forte": 100 },
                { "name": "Beta", "base_attack": 1000, "base_health": 1000, "base_defense": 100, "element": "Physical", "max_forte": 100 },
                { "name": "Gamma", "base_attack": 1000, "base_health": 1000, "base_defense": 100, "element": "Physical", "max_forte": 100 }
            ],
            "weapons": [ { "name": "Bare Hands", "base_attack": 0, "main_stat": "", "main_stat_amount": 0 } ],
            "echoes": [ { "name": "Null Echo", "damage": 0, "cast_time": 1, "classification": "Ec", "hits": 1 } ]
        }"#,
    )
    .expect("inline catalog should parse");
    let team: TeamConfig = serde_yaml::from_str(
        r#"
settings:
  level_cap: 1
  enemy_level: -99
  enemy_resistance: 0
members:
  - { name: Alpha, weapon: Bare Hands, echo: Null Echo, crit: -0.05 }
  - { name: Beta, weapon: Bare Hands, echo: Null Echo, crit: -0.05 }
  - { name: Gamma, weapon: Bare Hands, echo: Null Echo, crit: -0.05 }
rotation:
  - { character: Alpha, skill: Strike }
"#,
    )
    .expect("inline team should parse");

    let report = run(&catalog, &team);
    assert_eq!(report.steps.len(), 1);
    approx_eq(report.steps[0].damage, 1000.0, 1e-9);
    approx_eq(report.summary.total_damage, 1000.0, 1e-9);
}

#[test]
fn stacking_buff_never_exceeds_its_limit() {
    let (catalog, mut team) = fixture();
    team.rotation = rotation(&[("Encore", "Basic Attack"); 6]);

    let report = run(&catalog, &team);
    assert!(report.steps[0].personal_buffs.contains("Heat x2"));
    for step in &report.steps[1..] {
        assert!(step.personal_buffs.contains("Heat x3"), "{}", step.personal_buffs);
    }
    assert!(report
        .steps
        .iter()
        .all(|step| !step.personal_buffs.contains("Heat x4")));
}

#[test]
fn gauges_stay_in_bounds_for_the_full_rotation() {
    let (catalog, team) = fixture();
    let report = run(&catalog, &team);

    assert_eq!(report.steps.len(), team.rotation.len());
    for step in &report.steps {
        assert!(step.resonance >= 0.0, "resonance at step {}", step.index);
        assert!(step.concerto >= 0.0, "concerto at step {}", step.index);
    }
    for gauge in &report.summary.gauges {
        assert!(gauge.final_gauges.forte >= 0.0);
        assert!(gauge.final_gauges.forte <= 100.0);
        assert!(gauge.final_gauges.concerto >= 0.0);
        assert!(gauge.final_gauges.resonance >= 0.0);
    }
}

#[test]
fn outro_buff_lands_on_the_next_character_only() {
    let (catalog, team) = fixture();
    let report = run(&catalog, &team);

    let outro = step(&report, "Outro: Encore");
    assert!(!outro.personal_buffs.contains("Outro: Encore"));
    let intro = step(&report, "Intro: Sanhua");
    assert!(intro.personal_buffs.contains("Outro: Encore"));
    let verina = step(&report, "Verina: Skill");
    assert!(!verina.personal_buffs.contains("Outro: Encore"));
}

#[test]
fn opener_ends_when_the_first_member_uses_an_outro() {
    let (catalog, team) = fixture();
    let report = run(&catalog, &team);

    let outro = step(&report, "Outro: Encore");
    approx_eq(report.summary.opener_time, outro.time, 1e-9);
    assert!(report.summary.opener_damage > 0.0);
    assert!(report.summary.loop_damage > 0.0);
    approx_eq(
        report.summary.total_damage,
        report.summary.opener_damage + report.summary.loop_damage,
        1e-6,
    );
    let per_step: f64 = report.steps.iter().map(|step| step.damage).sum();
    approx_eq(per_step, report.summary.total_damage, 1e-6);
}

#[test]
fn passive_damage_is_credited_to_the_declaring_step() {
    let (catalog, team) = fixture();
    let report = run(&catalog, &team);

    let intro = step(&report, "Intro: Sanhua");
    let note = intro
        .proc_notes
        .get("Sanhua: Glacier Burst")
        .expect("intro step should carry the proc summary");
    assert!(note.contains("procced 2 times"), "{note}");
    assert!(intro.highlight);
    assert!(intro.full_annotation().contains("Sanhua: Glacier Burst"));
}

#[test]
fn team_buff_is_visible_to_every_member() {
    let (catalog, team) = fixture();
    let report = run(&catalog, &team);

    let verina = step(&report, "Verina: Skill");
    assert!(verina.team_buffs.contains("Verina: Blossom"));
    let encore = report
        .steps
        .iter()
        .rev()
        .find(|step| step.character == "Encore")
        .expect("Encore acts after Verina");
    assert!(encore.team_buffs.contains("Verina: Blossom"));
}

fn patched_catalog(edit: impl FnOnce(&mut CatalogFile)) -> DefinitionCatalog {
    let raw = std::fs::read_to_string(CATALOG).expect("fixture catalog should exist");
    let mut file: CatalogFile = serde_json::from_str(&raw).expect("fixture catalog should parse");
    edit(&mut file);
    DefinitionCatalog::from_file(&file)
}

fn consume_run(kind: &str) -> RunReport {
    let catalog = patched_catalog(|file| {
        for buff in &mut file.buffs {
            if buff.name == "Quench" {
                buff.kind = kind.to_string();
            }
        }
    });
    let (_, mut team) = fixture();
    team.rotation = rotation(&[
        ("Encore", "Resonance Skill: Flare"),
        ("Encore", "Resonance Liberation: Blaze"),
        ("Encore", "Basic Attack"),
    ]);
    run(&catalog, &team)
}

#[test]
fn instant_consume_removes_before_aggregation_deferred_after() {
    let instant = consume_run("ConsumeBuffInstant");
    let deferred = consume_run("ConsumeBuff");

    assert!(instant.steps[0].personal_buffs.contains("Ember"));
    assert!(!instant.steps[1].personal_buffs.contains("Ember"));
    assert!(deferred.steps[1].personal_buffs.contains("Ember"));
    assert!(!deferred.steps[2].personal_buffs.contains("Ember"));

    assert!(deferred.steps[1].damage > instant.steps[1].damage);
    approx_eq(instant.steps[0].damage, deferred.steps[0].damage, 1e-9);
}

#[test]
fn hard_cooldown_violation_is_annotated_and_executed() {
    let (catalog, mut team) = fixture();
    team.rotation = rotation(&[
        ("Encore", "Resonance Skill: Flare"),
        ("Encore", "Resonance Skill: Flare"),
    ]);
    let report = run(&catalog, &team);

    assert_eq!(report.steps.len(), 2);
    let second = &report.steps[1];
    assert!(second.highlight);
    assert!(second
        .annotation
        .as_deref()
        .is_some_and(|note| note.starts_with("Illegal rotation! This skill is on cooldown")));
    assert!(second.damage > 0.0);
}

#[test]
fn blank_skill_ends_the_rotation() {
    let (catalog, mut team) = fixture();
    team.rotation = rotation(&[
        ("Encore", "Basic Attack"),
        ("Encore", ""),
        ("Encore", "Basic Attack"),
    ]);
    let report = run(&catalog, &team);
    assert_eq!(report.steps.len(), 1);
}

#[test]
fn resonance_deficit_is_annotated_without_aborting() {
    let (catalog, mut team) = fixture();
    team.settings.start_full_resonance = false;
    team.rotation = rotation(&[
        ("Encore", "Resonance Liberation: Blaze"),
        ("Encore", "Basic Attack"),
    ]);
    let report = run(&catalog, &team);

    assert_eq!(report.steps.len(), 2);
    let liberation = &report.steps[0];
    assert!(liberation.highlight);
    assert!(liberation
        .annotation
        .as_deref()
        .is_some_and(|note| note.contains("Resonance")));
    assert_eq!(liberation.resonance, 0.0);
    let encore = report
        .summary
        .gauges
        .iter()
        .find(|gauge| gauge.character == "Encore")
        .expect("Encore has a gauge report");
    approx_eq(encore.initial_deficit.resonance, 125.0, 1e-9);
}

#[test]
fn identical_runs_produce_identical_reports() {
    let (catalog, team) = fixture();
    assert_eq!(run(&catalog, &team), run(&catalog, &team));
}

#[test]
fn sensitivity_is_reported_when_enabled() {
    let (catalog, mut team) = fixture();
    team.settings.stat_sensitivity = true;
    let report = run(&catalog, &team);

    let sensitivity = report
        .summary
        .sensitivity
        .expect("sensitivity should be present");
    let encore = sensitivity.get("Encore").expect("Encore dealt damage");
    assert!(encore.get("Attack").is_some_and(|gain| *gain > 0.0));
}

#[test]
fn team_buff_until_swap_is_dropped_on_the_next_swap() {
    let catalog = patched_catalog(|file| {
        file.buffs.push(BuffRecord {
            name: "Verina: Resolve".into(),
            kind: "BuffUntilSwap".into(),
            classification: "All".into(),
            effect: "Attack".into(),
            amount: 0.1.into(),
            duration: 5.0.into(),
            trigger: "Verina: Skill".into(),
            applies_to: "Team".into(),
            ..BuffRecord::default()
        });
    });
    let (_, mut team) = fixture();
    let mut entries = vec![("Verina", "Verina: Skill")];
    for _ in 0..4 {
        entries.push(("Encore", "Basic Attack"));
        entries.push(("Sanhua", "Sanhua: Basic Attack"));
    }
    team.rotation = rotation(&entries);
    let report = run(&catalog, &team);

    assert!(report.steps[0].team_buffs.contains("Verina: Resolve"));
    for step in &report.steps[1..] {
        assert!(!step.team_buffs.contains("Verina: Resolve"), "step {}", step.index);
    }
}

#[test]
fn unresolved_rotation_entries_are_skipped_with_a_note() {
    let (catalog, mut team) = fixture();
    team.rotation = rotation(&[
        ("Encore", "Basic Attack"),
        ("Encore", "Nonexistent Skill"),
        ("Stranger", "Basic Attack"),
        ("Encore", "Basic Attack"),
    ]);
    let report = run(&catalog, &team);

    assert_eq!(report.steps.len(), 4);
    for skipped in &report.steps[1..3] {
        assert!(skipped.highlight);
        assert_eq!(skipped.damage, 0.0);
        assert!(skipped
            .annotation
            .as_deref()
            .is_some_and(|note| note.contains("skipped")));
    }
    let last = &report.steps[3];
    approx_eq(last.time, 2.0, 1e-9);
    assert!(last.damage > 0.0);
    assert!(last.personal_buffs.contains("Heat x3"));
}

#[test]
fn repeated_reset_buff_activation_keeps_one_instance() {
    let catalog = patched_catalog(|file| {
        file.buffs.push(BuffRecord {
            name: "Verina: Mark".into(),
            kind: "ResetBuff".into(),
            classification: "Verina: Blossom".into(),
            duration: 30.0.into(),
            trigger: "Verina: Skill".into(),
            applies_to: "Team".into(),
            ..BuffRecord::default()
        });
    });
    let (_, mut team) = fixture();
    team.rotation = rotation(&[
        ("Verina", "Verina: Skill"),
        ("Verina", "Verina: Skill"),
        ("Encore", "Basic Attack"),
    ]);
    let report = run(&catalog, &team);

    for step in &report.steps {
        assert_eq!(step.team_buffs.matches("Verina: Mark").count(), 1, "{}", step.team_buffs);
    }
}

fn stringmaster_run(weapon: &str, entries: &[(&str, &str)]) -> RunReport {
    let catalog = patched_catalog(|file| {
        let mut stringmaster = file
            .weapons
            .iter()
            .find(|weapon| weapon.name == "Training Blade")
            .cloned()
            .expect("fixture has a training blade");
        stringmaster.name = "Stringmaster".into();
        file.weapons.push(stringmaster);
    });
    let (_, mut team) = fixture();
    team.members[1].weapon = weapon.to_string();
    team.rotation = rotation(entries);
    run(&catalog, &team)
}

#[test]
fn stringmaster_owner_procs_lose_attack_while_off_field() {
    let off_field = [("Sanhua", "Intro: Sanhua"), ("Encore", "Basic Attack")];
    let plain = stringmaster_run("Training Blade", &off_field);
    let penalized = stringmaster_run("Stringmaster", &off_field);
    assert!(penalized.steps[0].damage < plain.steps[0].damage);

    let on_field = [("Sanhua", "Intro: Sanhua"), ("Sanhua", "Sanhua: Basic Attack")];
    let plain = stringmaster_run("Training Blade", &on_field);
    let kept = stringmaster_run("Stringmaster", &on_field);
    approx_eq(kept.steps[0].damage, plain.steps[0].damage, 1e-9);
}

#[test]
fn swap_back_wait_counts_from_the_cooldown_adjusted_cast() {
    let catalog = patched_catalog(|file| {
        for skill in &mut file.skills {
            match skill.name.as_str() {
                "Resonance Skill: Flare" => skill.cooldown = 2.0,
                "Sanhua: Basic Attack" => skill.cast_time = 0.2,
                _ => {}
            }
        }
    });
    let (_, mut team) = fixture();
    team.rotation = rotation(&[
        ("Encore", "Resonance Skill: Flare"),
        ("Encore", "Resonance Skill: Flare"),
        ("Sanhua", "Sanhua: Basic Attack"),
        ("Encore", "Basic Attack"),
    ]);
    let report = run(&catalog, &team);

    approx_eq(report.steps[1].wait, 0.5, 1e-9);
    approx_eq(report.steps[1].time, 2.0, 1e-9);
    approx_eq(report.steps[2].wait, 0.0, 1e-9);
    // Encore was last seen at 2.0 + 1.5, so the swap back at 3.7 waits 0.8.
    approx_eq(report.steps[3].wait, 0.8, 1e-9);
    approx_eq(report.steps[3].time, 4.5, 1e-9);
}
