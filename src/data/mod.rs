pub mod build_code;
pub mod catalog;
pub mod classification;
pub mod definitions;
pub mod records;
pub mod team;
pub mod workbook;

pub use catalog::{load_catalog, parse_catalog, DefinitionCatalog, DEFAULT_CATALOG_PATH};
pub use classification::{Tag, TagSet};
pub use definitions::{
    BuffDefinition, BuffKind, EffectType, Gauge, ResourceDeltas, Scope, SkillDefinition,
    TriggerExpr, TriggerToken,
};
pub use team::{
    assemble_team, load_team, parse_team, CharacterStats, MemberConfig, PreparedTeam,
    RotationEntry, RunSettings, TeamConfig, DEFAULT_TEAM_PATH,
};
