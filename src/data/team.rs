//! Team setup (YAML) and assembly of a ready-to-run team from the catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combat::modifiers::Modifier;
use crate::data::catalog::DefinitionCatalog;
use crate::data::definitions::{
    BuffContext, BuffDefinition, BuffKind, BuffOrigin, CharacterConstant, SkillDefinition,
};
use crate::error::{CatalogError, MalformedDefinition, Result};

pub const DEFAULT_TEAM_PATH: &str = "data/team.yaml";

/// Rotation capacity of a single run.
pub const DEFAULT_MAX_STEPS: usize = 112;

/// Level cap -> (attack multiplier, weapon main-stat multiplier).
pub const LEVEL_MULTIPLIERS: [(u32, f64, f64); 8] = [
    (1, 1.0, 1.0),
    (20, 2.59, 1.78),
    (40, 5.03, 2.56),
    (50, 6.62, 2.94),
    (60, 8.24, 3.33),
    (70, 9.47, 3.72),
    (80, 11.15, 4.11),
    (90, 12.5, 4.5),
];

/// Multipliers for the highest breakpoint not above `level_cap`.
pub fn level_multipliers(level_cap: u32) -> (f64, f64) {
    LEVEL_MULTIPLIERS
        .iter()
        .rev()
        .find(|(level, _, _)| *level <= level_cap)
        .map_or((1.0, 1.0), |(_, attack, main)| (*attack, *main))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub level_cap: u32,
    pub enemy_level: f64,
    pub enemy_resistance: f64,
    pub skill_level_multiplier: f64,
    pub start_full_resonance: bool,
    pub stat_sensitivity: bool,
    pub max_steps: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            level_cap: 90,
            enemy_level: 90.0,
            enemy_resistance: 0.1,
            skill_level_multiplier: 1.0,
            start_full_resonance: false,
            stat_sensitivity: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Elemental and action-type damage bonuses entered for a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeBonuses {
    pub normal: f64,
    pub heavy: f64,
    pub skill: f64,
    pub liberation: f64,
    pub physical: f64,
    pub glacio: f64,
    pub fusion: f64,
    pub electro: f64,
    pub aero: f64,
    pub spectro: f64,
    pub havoc: f64,
}

impl TypeBonuses {
    pub fn values(&self) -> [(Modifier, f64); 11] {
        [
            (Modifier::Normal, self.normal),
            (Modifier::Heavy, self.heavy),
            (Modifier::Skill, self.skill),
            (Modifier::Liberation, self.liberation),
            (Modifier::Physical, self.physical),
            (Modifier::Glacio, self.glacio),
            (Modifier::Fusion, self.fusion),
            (Modifier::Electro, self.electro),
            (Modifier::Aero, self.aero),
            (Modifier::Spectro, self.spectro),
            (Modifier::Havoc, self.havoc),
        ]
    }

    pub fn from_values(values: &[f64; 11]) -> TypeBonuses {
        TypeBonuses {
            normal: values[0],
            heavy: values[1],
            skill: values[2],
            liberation: values[3],
            physical: values[4],
            glacio: values[5],
            fusion: values[6],
            electro: values[7],
            aero: values[8],
            spectro: values[9],
            havoc: values[10],
        }
    }
}

/// Percent bonuses supplied from outside the build (e.g. substats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalBonuses {
    pub attack: f64,
    pub health: f64,
    pub defense: f64,
    pub energy_regen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberConfig {
    pub name: String,
    /// Resonance chain (sequence) level.
    pub chain: u32,
    pub weapon: String,
    /// One-based weapon refinement rank.
    pub rank: u32,
    pub echo: String,
    pub build: String,
    pub flat_attack: f64,
    pub flat_health: f64,
    pub flat_defense: f64,
    pub crit: f64,
    pub crit_dmg: f64,
    pub bonus: TypeBonuses,
    pub external: ExternalBonuses,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            chain: 0,
            weapon: String::new(),
            rank: 1,
            echo: String::new(),
            build: String::new(),
            flat_attack: 0.0,
            flat_health: 0.0,
            flat_defense: 0.0,
            crit: 0.0,
            crit_dmg: 0.0,
            bonus: TypeBonuses::default(),
            external: ExternalBonuses::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationEntry {
    pub character: String,
    pub skill: String,
    /// Scheduled time; defaults to the previous entry's time plus its cast time.
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    pub settings: RunSettings,
    pub members: Vec<MemberConfig>,
    pub rotation: Vec<RotationEntry>,
}

pub fn parse_team(yaml: &str) -> Result<TeamConfig> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_team(path: impl AsRef<Path>) -> Result<TeamConfig> {
    let raw = fs::read_to_string(path)?;
    parse_team(&raw)
}

/// Flat/percent stats contributed by the character's build, in a fixed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusStats {
    entries: Vec<(Modifier, f64)>,
}

impl BonusStats {
    fn new(bonus: &TypeBonuses, member: &MemberConfig) -> BonusStats {
        let mut entries: Vec<(Modifier, f64)> = bonus.values().to_vec();
        entries.extend([
            (Modifier::FlatAttack, member.flat_attack),
            (Modifier::FlatHealth, member.flat_health),
            (Modifier::FlatDefense, member.flat_defense),
            (Modifier::Crit, 0.0),
            (Modifier::CritDmg, 0.0),
            (Modifier::Attack, 0.0),
            (Modifier::Health, 0.0),
            (Modifier::Defense, 0.0),
            (Modifier::EnergyRegen, 0.0),
        ]);
        BonusStats { entries }
    }

    pub fn get(&self, modifier: Modifier) -> f64 {
        self.entries
            .iter()
            .find(|(m, _)| *m == modifier)
            .map_or(0.0, |(_, value)| *value)
    }

    pub fn add(&mut self, modifier: Modifier, amount: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|(m, _)| *m == modifier) {
            entry.1 += amount;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Modifier, f64)> + '_ {
        self.entries.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildTemplate {
    /// 43311 with two Energy Regen main stats.
    EnergyEnergy,
    EleEle,
    EleAttack,
    AttackAttack,
    /// 44111 with adaptive crit allocation.
    Adaptive,
}

impl BuildTemplate {
    pub fn parse(raw: &str) -> Option<BuildTemplate> {
        match raw.trim() {
            "43311 (ER/ER)" => Some(BuildTemplate::EnergyEnergy),
            "43311 (Ele/Ele)" => Some(BuildTemplate::EleEle),
            "43311 (Ele/Atk)" => Some(BuildTemplate::EleAttack),
            "43311 (Atk/Atk)" => Some(BuildTemplate::AttackAttack),
            "44111 (Adaptive)" => Some(BuildTemplate::Adaptive),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BuildTemplate::EnergyEnergy => "43311 (ER/ER)",
            BuildTemplate::EleEle => "43311 (Ele/Ele)",
            BuildTemplate::EleAttack => "43311 (Ele/Atk)",
            BuildTemplate::AttackAttack => "43311 (Atk/Atk)",
            BuildTemplate::Adaptive => "44111 (Adaptive)",
        }
    }

    /// Flat and percent main stats plus the crit-or-crit-damage slots.
    fn apply(self, bonus: &mut BonusStats, crit: &mut CritState, element: Option<Modifier>) {
        let set_element = |bonus: &mut BonusStats, target: f64| {
            if let Some(element) = element {
                let current = bonus.get(element);
                bonus.add(element, target - current);
            }
        };
        let crit_slots = match self {
            BuildTemplate::Adaptive => {
                bonus.add(Modifier::FlatAttack, 300.0);
                bonus.add(Modifier::FlatHealth, 2280.0 * 3.0);
                bonus.add(Modifier::Attack, 0.18 * 3.0);
                2
            }
            template => {
                bonus.add(Modifier::FlatAttack, 350.0);
                bonus.add(Modifier::FlatHealth, 2280.0 * 2.0);
                match template {
                    BuildTemplate::EnergyEnergy => {
                        bonus.add(Modifier::Attack, 0.18 * 2.0);
                        bonus.add(Modifier::EnergyRegen, 0.32 * 2.0);
                    }
                    BuildTemplate::EleEle => {
                        set_element(bonus, 0.6);
                        bonus.add(Modifier::Attack, 0.18 * 2.0);
                    }
                    BuildTemplate::EleAttack => {
                        set_element(bonus, 0.3);
                        bonus.add(Modifier::Attack, 0.18 * 2.0 + 0.3);
                    }
                    _ => bonus.add(Modifier::Attack, 0.18 * 2.0 + 0.6),
                }
                1
            }
        };
        for _ in 0..crit_slots {
            crit.allocate_slot();
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CritState {
    crit: f64,
    crit_dmg: f64,
    weapon_crit: f64,
    weapon_crit_dmg: f64,
    conditional_crit: f64,
}

impl CritState {
    /// One 4-cost slot goes to crit rate while crit damage is more than twice
    /// as valuable, otherwise to crit damage.
    fn allocate_slot(&mut self) {
        let effective_crit = self.crit + self.weapon_crit + self.conditional_crit;
        if effective_crit * 2.0 < (self.crit_dmg + self.weapon_crit_dmg) - 1.0 {
            self.crit += 0.22;
        } else {
            self.crit_dmg += 0.44;
        }
    }
}

/// Equipped weapon with level and rank applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponInstance {
    pub name: String,
    pub attack: f64,
    pub main_stat: String,
    pub main_stat_amount: f64,
    /// Zero-based rank index into slash-delimited values.
    pub rank_index: usize,
    pub buff: String,
}

impl WeaponInstance {
    pub fn main_stat_modifier(&self) -> Option<Modifier> {
        Modifier::from_name(&self.main_stat)
    }
}

/// A fully assembled team member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterStats {
    pub name: String,
    pub chain: u32,
    pub weapon: WeaponInstance,
    pub echo: String,
    pub base_attack: f64,
    pub base_health: f64,
    pub base_defense: f64,
    pub crit: f64,
    pub crit_dmg: f64,
    pub bonus: BonusStats,
    pub external: ExternalBonuses,
    pub max_forte: f64,
    pub element: String,
}

impl CharacterStats {
    /// Weapon main stat (when Energy Regen) + external + build Energy Regen.
    pub fn energy_regen(&self) -> f64 {
        let weapon = if self.weapon.main_stat == "Energy Regen" {
            self.weapon.main_stat_amount
        } else {
            0.0
        };
        weapon + self.external.energy_regen + self.bonus.get(Modifier::EnergyRegen)
    }
}

pub fn assemble_character(
    member: &MemberConfig,
    constant: &CharacterConstant,
    weapon: &crate::data::definitions::WeaponDefinition,
    level_cap: u32,
) -> CharacterStats {
    let (stat_mult, main_mult) = level_multipliers(level_cap);
    let weapon = WeaponInstance {
        name: weapon.name.clone(),
        attack: weapon.base_attack * stat_mult,
        main_stat: weapon.main_stat.clone(),
        main_stat_amount: weapon.main_stat_amount * main_mult,
        rank_index: member.rank.saturating_sub(1) as usize,
        buff: weapon.buff.clone(),
    };

    let mut bonus = BonusStats::new(&member.bonus, member);
    let mut crit = CritState {
        crit: (member.crit + 0.05).min(1.0),
        crit_dmg: member.crit_dmg + 1.5,
        ..CritState::default()
    };
    match weapon.main_stat.as_str() {
        "Crit" => crit.weapon_crit = weapon.main_stat_amount,
        "Crit Dmg" => crit.weapon_crit_dmg = weapon.main_stat_amount,
        _ => {}
    }
    if let Some(rule) = crate::combat::special_cases::conditional_crit(&member.name, member.chain) {
        crit.conditional_crit = rule;
    }
    match BuildTemplate::parse(&member.build) {
        Some(template) => template.apply(&mut bonus, &mut crit, Modifier::from_name(&constant.element)),
        None if member.build.trim().is_empty() => {}
        None => warn!(member = %member.name, build = %member.build, "unknown build template"),
    }

    for (slot, minor) in constant.minor_fortes.iter().enumerate() {
        let Some(stat) = Modifier::from_name(minor) else {
            continue;
        };
        let (first_unlock, second_unlock) = if slot == 0 { (50, 70) } else { (60, 80) };
        let scale = if stat == Modifier::Crit { 2.0 / 3.0 } else { 1.0 };
        if level_cap >= second_unlock {
            bonus.add(stat, 0.084 * scale);
        }
        if level_cap >= first_unlock {
            bonus.add(stat, 0.036 * scale);
        }
    }

    CharacterStats {
        name: member.name.clone(),
        chain: member.chain,
        weapon,
        echo: member.echo.clone(),
        base_attack: constant.base_attack * stat_mult,
        base_health: constant.base_health * stat_mult,
        base_defense: constant.base_defense * stat_mult,
        crit: crit.crit,
        crit_dmg: crit.crit_dmg,
        bonus,
        external: member.external,
        max_forte: constant.max_forte,
        element: constant.element.clone(),
    }
}

/// A passive buff applied before the first step.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupBuff {
    pub definition: Arc<BuffDefinition>,
    pub stacks: f64,
}

/// One rotation entry with its scheduled time resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEntry {
    pub character: String,
    pub skill: String,
    pub time: f64,
}

/// Everything a run needs, resolved against the catalog.
#[derive(Debug, Clone)]
pub struct PreparedTeam {
    pub settings: RunSettings,
    pub members: Vec<CharacterStats>,
    pub skills: BTreeMap<String, SkillDefinition>,
    /// Evaluation list in trigger-scan order.
    pub buffs: Vec<Arc<BuffDefinition>>,
    pub startup: Vec<StartupBuff>,
    pub rotation: Vec<ScheduledEntry>,
    pub malformed: Vec<MalformedDefinition>,
}

impl PreparedTeam {
    pub fn member(&self, name: &str) -> Option<&CharacterStats> {
        self.members.iter().find(|member| member.name == name)
    }
}

pub fn assemble_team(catalog: &DefinitionCatalog, config: &TeamConfig) -> Result<PreparedTeam> {
    if config.members.len() != 3 {
        return Err(CatalogError::TeamSize(config.members.len()));
    }
    let settings = config.settings.clone();
    let mut skills = catalog.skills.clone();
    let mut members = Vec::with_capacity(3);
    let mut buffs: Vec<BuffDefinition> = catalog.buffs.clone();
    let mut malformed = catalog.malformed.clone();

    for member in &config.members {
        let constant = catalog.characters.get(&member.name).ok_or_else(|| {
            CatalogError::UnknownReference {
                kind: "character",
                name: member.name.clone(),
            }
        })?;
        let weapon = catalog.weapons.get(&member.weapon).ok_or_else(|| {
            CatalogError::UnknownReference {
                kind: "weapon",
                name: member.weapon.clone(),
            }
        })?;
        let echo = catalog
            .echoes
            .get(&member.echo)
            .ok_or_else(|| CatalogError::UnknownReference {
                kind: "echo",
                name: member.echo.clone(),
            })?;
        let stats = assemble_character(member, constant, weapon, settings.level_cap);
        skills.insert(echo.name.clone(), SkillDefinition::from_echo(echo, &member.name));

        for record in &catalog.echo_buffs {
            if record.name.contains(&echo.name) || record.name.contains(&echo.echo_set) {
                let ctx = BuffContext {
                    origin: BuffOrigin::Echo,
                    rank: 0,
                    wielder: Some(&member.name),
                    skill_owner: None,
                };
                match BuffDefinition::from_record(record, ctx) {
                    Ok(buff) => {
                        debug!(buff = %buff.name, member = %member.name, "echo buff added");
                        buffs.push(buff);
                    }
                    Err(err) => malformed.push(err),
                }
            }
        }
        for record in &catalog.weapon_buffs {
            if !stats.weapon.buff.is_empty() && record.name.contains(&stats.weapon.buff) {
                let ctx = BuffContext {
                    origin: BuffOrigin::Weapon,
                    rank: stats.weapon.rank_index,
                    wielder: Some(&member.name),
                    skill_owner: None,
                };
                match BuffDefinition::from_record(record, ctx) {
                    Ok(buff) => {
                        debug!(buff = %buff.name, member = %member.name, "weapon buff added");
                        buffs.push(buff);
                    }
                    Err(err) => malformed.push(err),
                }
            }
        }
        members.push(stats);
    }

    let mut startup = Vec::new();
    let mut evaluation = Vec::with_capacity(buffs.len());
    for buff in buffs {
        if buff.is_startup_passive() {
            match buff.kind {
                BuffKind::StackingBuff => {
                    let stacks = buff.stack_interval.min(buff.stack_limit);
                    let shared = Arc::new(buff);
                    startup.push(StartupBuff {
                        definition: Arc::clone(&shared),
                        stacks,
                    });
                    evaluation.push(shared);
                    continue;
                }
                BuffKind::Buff => {
                    startup.push(StartupBuff {
                        definition: Arc::new(buff),
                        stacks: 0.0,
                    });
                    continue;
                }
                _ => {}
            }
        }
        evaluation.push(Arc::new(buff));
    }
    evaluation.sort_by_key(|buff| buff.evaluation_rank());

    let rotation = schedule_rotation(&config.rotation, &skills, &members, settings.max_steps);

    Ok(PreparedTeam {
        settings,
        members,
        skills,
        buffs: evaluation,
        startup,
        rotation,
        malformed,
    })
}

/// Resolves missing times and stops at the first blank skill. Entries naming
/// an unknown character or skill are kept with a zero cast time; the driver
/// skips them.
fn schedule_rotation(
    entries: &[RotationEntry],
    skills: &BTreeMap<String, SkillDefinition>,
    members: &[CharacterStats],
    max_steps: usize,
) -> Vec<ScheduledEntry> {
    let mut scheduled: Vec<ScheduledEntry> = Vec::new();
    let mut next_time = 0.0;
    for entry in entries.iter().take(max_steps) {
        if entry.skill.trim().is_empty() {
            break;
        }
        if !members.iter().any(|member| member.name == entry.character) {
            warn!(character = %entry.character, "rotation character not on the team");
        }
        let cast_time = match skills.get(&entry.skill) {
            Some(skill) => skill.cast_time,
            None => {
                warn!(skill = %entry.skill, "rotation skill not in the catalog");
                0.0
            }
        };
        let time = entry.time.unwrap_or(next_time);
        next_time = time + cast_time;
        scheduled.push(ScheduledEntry {
            character: entry.character.clone(),
            skill: entry.skill.clone(),
            time,
        });
    }
    scheduled
}
