//! Shareable build strings.
//!
//! Format: `friendly;member;member;member;rotation`. Each member section is 29
//! comma-separated values (the 25 lineup columns followed by the external
//! attack/health/defense/energy-regen bonuses); the rotation section is a
//! comma-separated list of `Character&Skill`.

use tracing::warn;

use crate::data::team::{
    ExternalBonuses, MemberConfig, RotationEntry, RunSettings, TeamConfig, TypeBonuses,
};
use crate::error::BuildCodeError;

pub const SECTION_COUNT: usize = 5;
pub const MEMBER_FIELD_COUNT: usize = 29;

const TYPE_BONUS_START: usize = 12;
const EXTERNAL_START: usize = 25;

pub fn encode(team: &TeamConfig) -> String {
    let friendly = team
        .members
        .iter()
        .map(|m| format!("S{}R{} {} + {}", m.chain, m.rank, m.name, m.weapon))
        .collect::<Vec<_>>()
        .join(" / ");
    let mut sections = vec![friendly];
    sections.extend(team.members.iter().map(encode_member));
    sections.push(
        team.rotation
            .iter()
            .map(|entry| format!("{}&{}", entry.character, entry.skill))
            .collect::<Vec<_>>()
            .join(","),
    );
    sections.join(";")
}

fn encode_member(member: &MemberConfig) -> String {
    let mut fields = vec![String::new(); MEMBER_FIELD_COUNT];
    fields[0] = member.name.clone();
    fields[1] = member.chain.to_string();
    fields[2] = member.weapon.clone();
    fields[4] = member.rank.to_string();
    fields[5] = member.echo.clone();
    fields[6] = member.build.clone();
    fields[7] = member.flat_attack.to_string();
    fields[8] = member.flat_health.to_string();
    fields[9] = member.flat_defense.to_string();
    fields[10] = member.crit.to_string();
    fields[11] = member.crit_dmg.to_string();
    for (offset, (_, value)) in member.bonus.values().iter().enumerate() {
        fields[TYPE_BONUS_START + offset] = value.to_string();
    }
    let external = member.external;
    for (offset, value) in [
        external.attack,
        external.health,
        external.defense,
        external.energy_regen,
    ]
    .iter()
    .enumerate()
    {
        fields[EXTERNAL_START + offset] = value.to_string();
    }
    fields.join(",")
}

/// Rebuilds a team setup. Run settings are not part of the encoding and come
/// back as defaults.
pub fn decode(raw: &str) -> Result<TeamConfig, BuildCodeError> {
    let sections: Vec<&str> = raw.trim().split(';').collect();
    if sections.len() != SECTION_COUNT {
        return Err(BuildCodeError::SectionCount(sections.len()));
    }

    let members: Vec<MemberConfig> = sections[1..4]
        .iter()
        .filter_map(|section| decode_member(section))
        .collect();
    if members.is_empty() {
        return Err(BuildCodeError::NoMembers);
    }

    let rotation = sections[4]
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.split_once('&') {
            Some((character, skill)) => Some(RotationEntry {
                character: character.trim().to_string(),
                skill: skill.trim().to_string(),
                time: None,
            }),
            None => {
                warn!(entry, "rotation entry without '&'; skipped");
                None
            }
        })
        .collect();

    Ok(TeamConfig {
        settings: RunSettings::default(),
        members,
        rotation,
    })
}

fn decode_member(section: &str) -> Option<MemberConfig> {
    let fields: Vec<&str> = section.split(',').map(str::trim).collect();
    if fields.len() < MEMBER_FIELD_COUNT {
        warn!(
            found = fields.len(),
            expected = MEMBER_FIELD_COUNT,
            "member section too short; skipped"
        );
        return None;
    }
    let number = |index: usize| fields[index].parse::<f64>().unwrap_or(0.0);
    let mut bonuses = [0.0; 11];
    for (offset, slot) in bonuses.iter_mut().enumerate() {
        *slot = number(TYPE_BONUS_START + offset);
    }
    Some(MemberConfig {
        name: fields[0].to_string(),
        chain: fields[1].parse().unwrap_or(0),
        weapon: fields[2].to_string(),
        rank: fields[4].parse().unwrap_or(1),
        echo: fields[5].to_string(),
        build: fields[6].to_string(),
        flat_attack: number(7),
        flat_health: number(8),
        flat_defense: number(9),
        crit: number(10),
        crit_dmg: number(11),
        bonus: TypeBonuses::from_values(&bonuses),
        external: ExternalBonuses {
            attack: number(EXTERNAL_START),
            health: number(EXTERNAL_START + 1),
            defense: number(EXTERNAL_START + 2),
            energy_regen: number(EXTERNAL_START + 3),
        },
    })
}
