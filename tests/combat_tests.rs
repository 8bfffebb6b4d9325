use std::sync::Arc;

use rotasim::combat::aggregator::{fold_buffs, AggregationTarget};
use rotasim::combat::buffs::ActiveBuffInstance;
use rotasim::combat::ledger::OFF_FIELD_SHARE;
use rotasim::combat::{
    compute_damage, resistance_multiplier, BuffLedger, CooldownOutcome, CooldownTracker,
    DamageInputs, DeltaSource, EnemyProfile, ModifierTable, ResourceLedger, SimulationContext,
    EPSILON,
};
use rotasim::data::definitions::{BuffContext, BuffDefinition};
use rotasim::data::records::BuffRecord;
use rotasim::data::{
    assemble_team, load_catalog, load_team, Gauge, PreparedTeam, Scope, SkillDefinition, TagSet,
};

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a}");
}

fn prepared() -> PreparedTeam {
    let catalog = load_catalog("tests/fixtures/catalog.json").expect("fixture catalog");
    let team = load_team("tests/fixtures/team.yaml").expect("fixture team");
    assemble_team(&catalog, &team).expect("fixture team assembles")
}

fn charged_skill() -> SkillDefinition {
    SkillDefinition {
        name: "Resonance Skill: Twin Bolt".into(),
        ratio: 1.0,
        cast_time: 0.5,
        freeze_time: 0.0,
        hits: 1,
        tags: TagSet::parse("Sk").expect("valid code"),
        owner: "Encore".into(),
        deltas: Default::default(),
        cooldown: 10.0,
        max_charges: 2,
    }
}

fn tracker_after_two_uses() -> CooldownTracker {
    let skill = charged_skill();
    let mut tracker = CooldownTracker::new();
    assert_eq!(tracker.use_skill(&skill, 0.0), CooldownOutcome::Ready);
    assert_eq!(tracker.use_skill(&skill, 0.0), CooldownOutcome::Ready);
    tracker
}

#[test]
fn third_charge_at_five_seconds_is_a_hard_violation() {
    let mut tracker = tracker_after_two_uses();
    let outcome = tracker.use_skill(&charged_skill(), 5.0);
    assert_eq!(outcome, CooldownOutcome::Violation { ready_at: 10.0 });
    assert!(outcome
        .note()
        .is_some_and(|note| note.starts_with("Illegal rotation!")));
}

#[test]
fn third_charge_within_a_second_inserts_a_wait() {
    let mut tracker = tracker_after_two_uses();
    match tracker.use_skill(&charged_skill(), 9.5) {
        CooldownOutcome::SoftWait { wait, ready_at } => {
            approx_eq(wait, 0.5, EPSILON);
            approx_eq(ready_at, 10.0, EPSILON);
        }
        other => panic!("expected a soft wait, got {other:?}"),
    }
}

#[test]
fn third_charge_after_full_cooldown_is_ready() {
    let mut tracker = tracker_after_two_uses();
    let outcome = tracker.use_skill(&charged_skill(), 10.0);
    assert_eq!(outcome, CooldownOutcome::Ready);
    assert!(outcome.note().is_none());
}

#[test]
fn resistance_boundaries_pick_the_right_branch() {
    approx_eq(resistance_multiplier(0.0), 1.0, EPSILON);
    let just_below = -1e-6;
    approx_eq(resistance_multiplier(just_below), 1.0 - just_below / 2.0, EPSILON);
    approx_eq(resistance_multiplier(0.5), 0.5, EPSILON);
    approx_eq(resistance_multiplier(0.8), 1.0 / (1.0 + 5.0 * 0.8), EPSILON);
    approx_eq(resistance_multiplier(0.9), 1.0 / (1.0 + 5.0 * 0.9), EPSILON);
    assert!((resistance_multiplier(0.9) - (1.0 - 0.9)).abs() > 1e-3);
}

#[test]
fn damage_formula_is_pure() {
    let team = prepared();
    let character = &team.members[0];
    let mut table = ModifierTable::new();
    table.add(rotasim::combat::Modifier::Fusion, 0.3);
    let tags = TagSet::parse("SkFu").expect("valid codes");
    let inputs = DamageInputs {
        ratio: 2.0,
        tags: &tags,
        character,
        table: &table,
        enemy: EnemyProfile::from_settings(&team.settings),
        extra_multiplier: 0.0,
    };

    let first = compute_damage(&inputs);
    let second = compute_damage(&inputs);
    assert_eq!(first.to_bits(), second.to_bits());
    assert!(first > 0.0);
}

#[test]
fn resonance_gain_is_shared_by_energy_regen() {
    let team = prepared();
    let mut ledger = ResourceLedger::new(&team.members, false);
    ledger.apply_delta(
        Gauge::Resonance,
        10.0,
        DeltaSource {
            character: "Encore",
            action: "Basic Attack",
            buff_summary: "(0)",
        },
    );

    for entry in ledger.entries() {
        let share = if entry.character == "Encore" {
            1.0
        } else {
            OFF_FIELD_SHARE
        };
        approx_eq(
            entry.gauges.resonance,
            10.0 * (1.0 + entry.energy_regen) * share,
            1e-9,
        );
    }
    let sanhua = team.member("Sanhua").expect("Sanhua is on the team");
    approx_eq(sanhua.energy_regen(), 0.2 + 0.64, 1e-9);
}

#[test]
fn forte_is_capped_and_spending_never_goes_negative() {
    let team = prepared();
    let mut ledger = ResourceLedger::new(&team.members, false);
    let source = DeltaSource {
        character: "Encore",
        action: "Basic Attack",
        buff_summary: "(0)",
    };

    ledger.apply_delta(Gauge::Forte, 150.0, source);
    approx_eq(ledger.get("Encore", Gauge::Forte), 100.0, EPSILON);

    let outcome = ledger.apply_delta(Gauge::Concerto, -40.0, source);
    assert!(outcome.illegal);
    assert_eq!(ledger.get("Encore", Gauge::Concerto), 0.0);
    assert!(outcome
        .note
        .is_some_and(|note| note.contains("out of the required 40 Concerto")));
}

fn buff(record: BuffRecord) -> Arc<BuffDefinition> {
    Arc::new(
        BuffDefinition::from_record(&record, BuffContext::generic(None))
            .expect("test buff should normalize"),
    )
}

#[test]
fn queued_outro_is_anchored_to_the_swap_time() {
    let team = prepared();
    let ctx = SimulationContext::new(&team.members);
    let outro = buff(BuffRecord {
        name: "Outro: Test".into(),
        kind: "Buff".into(),
        classification: "All".into(),
        effect: "Bonus".into(),
        amount: 0.2.into(),
        duration: 10.0.into(),
        applies_to: "Next".into(),
        ..BuffRecord::default()
    });

    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    buffs.next_queue.push(ActiveBuffInstance::new(outro, 3.0));
    assert!(buffs.personal("Encore").is_empty());

    buffs.flush_next_queue("Sanhua", 7.5, &ctx);
    let delivered = buffs.personal("Sanhua");
    assert_eq!(delivered.len(), 1);
    approx_eq(delivered[0].start_time, 7.5, EPSILON);
    assert_eq!(delivered[0].applies_to, Scope::Character("Sanhua".into()));
    assert!(buffs.next_queue.is_empty());
    assert!(buffs.personal("Encore").is_empty());
}

#[test]
fn stack_gains_clamp_to_the_limit() {
    let stacking = buff(BuffRecord {
        name: "Charge".into(),
        kind: "StackingBuff".into(),
        classification: "Sk".into(),
        effect: "Bonus".into(),
        amount: 0.1.into(),
        duration: 10.0.into(),
        stack_limit: 4.0.into(),
        applies_to: "Team".into(),
        ..BuffRecord::default()
    });
    let mut instance = ActiveBuffInstance::stacking(stacking, 0.0, 1.0);
    for tick in 1..10 {
        instance.gain_stacks(f64::from(tick), 3.0, 0.0);
        assert!(instance.stacks <= 4.0);
    }
    assert_eq!(instance.label(), "Charge x4");
}

#[test]
fn buff_until_swap_survives_time_but_not_a_swap() {
    let until_swap = buff(BuffRecord {
        name: "Stance".into(),
        kind: "BuffUntilSwap".into(),
        classification: "All".into(),
        effect: "Bonus".into(),
        amount: 0.1.into(),
        duration: 1.0.into(),
        applies_to: "Encore".into(),
        ..BuffRecord::default()
    });
    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    let scope = until_swap.applies_to.clone();
    buffs.insert(&scope, "Encore", ActiveBuffInstance::new(until_swap, 0.0));

    let report = buffs.prune_personal("Encore", 50.0, false);
    assert!(report.expired.is_empty());
    let report = buffs.prune_personal("Encore", 51.0, true);
    assert_eq!(report.expired, vec!["Stance".to_string()]);
    assert_eq!(BuffLedger::summary(buffs.personal("Encore")), "(0)");
}

#[test]
fn team_buff_until_swap_ends_on_a_swap() {
    let until_swap = buff(BuffRecord {
        name: "Rally".into(),
        kind: "BuffUntilSwap".into(),
        classification: "All".into(),
        effect: "Attack".into(),
        amount: 0.1.into(),
        duration: 5.0.into(),
        applies_to: "Team".into(),
        ..BuffRecord::default()
    });
    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    buffs.insert(&Scope::Team, "Verina", ActiveBuffInstance::new(until_swap, 0.0));

    let report = buffs.prune_team(40.0, "Verina", false);
    assert!(report.expired.is_empty());
    assert_eq!(buffs.team().len(), 1);
    let report = buffs.prune_team(41.0, "Encore", true);
    assert_eq!(report.expired, vec!["Rally".to_string()]);
    assert!(buffs.team().is_empty());
}

#[test]
fn silent_shortfall_leaves_gauge_and_deficit_untouched() {
    let team = prepared();
    let mut members = team.members.clone();
    members[0].name = "Jiyan".into();
    let mut ledger = ResourceLedger::new(&members, false);
    let source = DeltaSource {
        character: "Jiyan",
        action: "Heavy Attack: Windqueller",
        buff_summary: "(0)",
    };
    ledger.apply_delta(Gauge::Forte, 20.0, source);

    let outcome = ledger.apply_delta(Gauge::Forte, -30.0, source);
    assert!(!outcome.illegal);
    assert!(outcome.note.is_none());
    approx_eq(ledger.get("Jiyan", Gauge::Forte), 20.0, EPSILON);
    let jiyan = &ledger.entries()[0];
    assert_eq!(jiyan.initial_deficit.forte, 0.0);

    let paid = ledger.apply_delta(Gauge::Forte, -15.0, source);
    assert!(paid.note.is_some());
    approx_eq(ledger.get("Jiyan", Gauge::Forte), 5.0, EPSILON);
}

#[test]
fn energy_grant_fires_once_per_interval() {
    let team = prepared();
    let mut ctx = SimulationContext::new(&team.members);
    let mut ledger = ResourceLedger::new(&team.members, false);
    let grant = buff(BuffRecord {
        name: "Steady Flow".into(),
        kind: "BuffEnergy".into(),
        classification: "All".into(),
        effect: "Concerto".into(),
        amount: 5.0.into(),
        duration: 30.0.into(),
        stack_interval: 3.0.into(),
        applies_to: "Encore".into(),
        ..BuffRecord::default()
    });
    let set = [ActiveBuffInstance::new(grant, 0.0)];
    let skill = prepared_skill(&team, "Basic Attack");

    for now in [0.0, 1.0, 2.9, 3.0, 5.0, 6.0] {
        let mut table = ModifierTable::new();
        let target = AggregationTarget {
            skill: &skill,
            active: "Encore",
            now,
        };
        fold_buffs(&mut table, &set, target, &mut ctx, &mut ledger);
    }
    approx_eq(ledger.get("Encore", Gauge::Concerto), 15.0, EPSILON);
    approx_eq(ctx.energy_ready_at("Steady Flow"), 9.0, EPSILON);
}

fn prepared_skill(team: &PreparedTeam, name: &str) -> SkillDefinition {
    team.skills
        .get(name)
        .cloned()
        .unwrap_or_else(|| panic!("{name} is in the fixture"))
}

#[test]
fn off_field_buffs_drop_on_the_next_personal_prune() {
    let off_field = buff(BuffRecord {
        name: "Off-Field Support".into(),
        kind: "Buff".into(),
        classification: "All".into(),
        effect: "Attack".into(),
        amount: 0.2.into(),
        duration: 30.0.into(),
        applies_to: "Encore".into(),
        ..BuffRecord::default()
    });
    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    let scope = off_field.applies_to.clone();
    buffs.insert(&scope, "Encore", ActiveBuffInstance::new(off_field, 0.0));

    let report = buffs.prune_personal("Encore", 0.5, false);
    assert_eq!(report.expired, vec!["Off-Field Support".to_string()]);
    assert!(buffs.personal("Encore").is_empty());
}

#[test]
fn proc_queue_keeps_the_later_start() {
    let team = prepared();
    let ctx = SimulationContext::new(&team.members);
    let kindling = buff(BuffRecord {
        name: "Kindling".into(),
        kind: "Buff".into(),
        classification: "Fu".into(),
        effect: "Bonus".into(),
        amount: 0.1.into(),
        duration: 5.0.into(),
        applies_to: "Encore".into(),
        ..BuffRecord::default()
    });
    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    let scope = kindling.applies_to.clone();
    buffs.insert(&scope, "Encore", ActiveBuffInstance::new(Arc::clone(&kindling), 8.0));

    buffs.proc_queue.push(ActiveBuffInstance::new(Arc::clone(&kindling), 5.0));
    assert!(buffs.flush_proc_queue("Encore", &ctx).is_empty());
    approx_eq(buffs.personal("Encore")[0].start_time, 8.0, EPSILON);

    buffs.proc_queue.push(ActiveBuffInstance::new(kindling, 10.0));
    buffs.flush_proc_queue("Encore", &ctx);
    assert_eq!(buffs.personal("Encore").len(), 1);
    approx_eq(buffs.personal("Encore")[0].start_time, 10.0, EPSILON);
}

#[test]
fn expired_reset_buff_clears_matching_buffs_everywhere() {
    let marker = buff(BuffRecord {
        name: "Overheat Window".into(),
        kind: "ResetBuff".into(),
        classification: "Heat".into(),
        effect: "".into(),
        duration: 2.0.into(),
        applies_to: "Encore".into(),
        ..BuffRecord::default()
    });
    let heat = |name: &str, applies_to: &str| {
        buff(BuffRecord {
            name: name.into(),
            kind: "StackingBuff".into(),
            classification: "Fu".into(),
            effect: "Bonus".into(),
            amount: 0.05.into(),
            duration: 30.0.into(),
            stack_limit: 3.0.into(),
            applies_to: applies_to.into(),
            ..BuffRecord::default()
        })
    };
    let mut buffs = BuffLedger::new(["Encore", "Sanhua", "Verina"]);
    buffs.insert(&Scope::Character("Encore".into()), "Encore", ActiveBuffInstance::new(marker, 0.0));
    buffs.insert(
        &Scope::Character("Encore".into()),
        "Encore",
        ActiveBuffInstance::stacking(heat("Heat", "Encore"), 0.0, 2.0),
    );
    buffs.insert(
        &Scope::Team,
        "Encore",
        ActiveBuffInstance::stacking(heat("Team Heat", "Team"), 0.0, 1.0),
    );
    buffs.insert(
        &Scope::Character("Sanhua".into()),
        "Encore",
        ActiveBuffInstance::stacking(heat("Heat", "Sanhua"), 0.0, 1.0),
    );

    let report = buffs.prune_personal("Encore", 1.0, false);
    assert!(report.reset_filters.is_empty());
    assert_eq!(buffs.personal("Encore").len(), 2);

    let report = buffs.prune_personal("Encore", 3.0, false);
    assert_eq!(report.expired, vec!["Overheat Window".to_string()]);
    assert_eq!(report.reset_filters, vec!["Heat".to_string()]);
    assert!(buffs.personal("Encore").is_empty());
    assert!(buffs.team().is_empty());
    assert_eq!(buffs.personal("Sanhua").len(), 1);
}
