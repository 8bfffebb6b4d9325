pub mod aggregator;
pub mod buffs;
pub mod context;
pub mod cooldown;
pub mod engine;
pub mod export_csv;
pub mod formula;
pub mod ledger;
pub mod modifiers;
pub mod passive;
pub mod report;
pub mod special_cases;
pub mod trigger;

pub use buffs::{ActiveBuffInstance, BuffLedger};
pub use context::{Phase, SimulationContext};
pub use cooldown::{CooldownOutcome, CooldownRecord, CooldownTracker};
pub use engine::{run_rotation, RotationDriver};
pub use formula::{
    compute_damage, crit_multiplier, damage_multiplier, defense_multiplier, resistance_multiplier,
    DamageInputs, EnemyProfile, EPSILON,
};
pub use ledger::{DeltaSource, GaugeValues, ResourceLedger};
pub use modifiers::{Modifier, ModifierTable, SkillBonusKind};
pub use passive::{PassiveDamageInstance, PassiveDamageRegistry};
pub use report::{DamageBreakdown, RunReport, RunSummary, StepRecord};
