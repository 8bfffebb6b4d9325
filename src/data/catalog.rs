//! The definition catalog: every skill, buff, weapon, echo and character
//! constant known to a run, normalized once at load.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::data::definitions::{
    BuffContext, BuffDefinition, BuffOrigin, CharacterConstant, EchoDefinition, SkillDefinition,
    WeaponDefinition,
};
use crate::data::records::{BuffRecord, CatalogFile};
use crate::error::{MalformedDefinition, Result};

pub const DEFAULT_CATALOG_PATH: &str = "data/catalog.json";

#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    pub skills: BTreeMap<String, SkillDefinition>,
    /// Generic buffs, in table order.
    pub buffs: Vec<BuffDefinition>,
    /// Weapon buff rows; resolved per wielder and rank during team assembly.
    pub weapon_buffs: Vec<BuffRecord>,
    /// Echo buff rows; resolved per wearer during team assembly.
    pub echo_buffs: Vec<BuffRecord>,
    pub characters: BTreeMap<String, CharacterConstant>,
    pub weapons: BTreeMap<String, WeaponDefinition>,
    pub echoes: BTreeMap<String, EchoDefinition>,
    /// Records skipped while loading.
    pub malformed: Vec<MalformedDefinition>,
}

impl DefinitionCatalog {
    /// Normalizes a raw catalog. Records that fail to normalize are skipped,
    /// logged, and listed in [DefinitionCatalog::malformed].
    pub fn from_file(file: &CatalogFile) -> DefinitionCatalog {
        let mut catalog = DefinitionCatalog::default();

        for record in &file.skills {
            match SkillDefinition::from_record(record) {
                Ok(skill) => {
                    if catalog.skills.contains_key(&skill.name) {
                        warn!(skill = %skill.name, "duplicate skill name; later row wins");
                    }
                    catalog.skills.insert(skill.name.clone(), skill);
                }
                Err(err) => catalog.skip(err),
            }
        }

        for record in &file.buffs {
            let owner = catalog.skills.get(&record.name).map(|s| s.owner.as_str());
            match BuffDefinition::from_record(record, BuffContext::generic(owner)) {
                Ok(buff) => catalog.buffs.push(buff),
                Err(err) => catalog.skip(err),
            }
        }

        for (origin, records) in [
            (BuffOrigin::Weapon, &file.weapon_buffs),
            (BuffOrigin::Echo, &file.echo_buffs),
        ] {
            for record in records {
                // Validate with a placeholder wielder; the real one is bound later.
                let probe = BuffContext {
                    origin,
                    rank: 0,
                    wielder: Some(""),
                    skill_owner: None,
                };
                match BuffDefinition::from_record(record, probe) {
                    Ok(_) if origin == BuffOrigin::Weapon => {
                        catalog.weapon_buffs.push(record.clone())
                    }
                    Ok(_) => catalog.echo_buffs.push(record.clone()),
                    Err(err) => catalog.skip(err),
                }
            }
        }

        for record in &file.characters {
            match CharacterConstant::from_record(record) {
                Ok(character) => {
                    catalog.characters.insert(character.name.clone(), character);
                }
                Err(err) => catalog.skip(err),
            }
        }
        for record in &file.weapons {
            match WeaponDefinition::from_record(record) {
                Ok(weapon) => {
                    catalog.weapons.insert(weapon.name.clone(), weapon);
                }
                Err(err) => catalog.skip(err),
            }
        }
        for record in &file.echoes {
            match EchoDefinition::from_record(record) {
                Ok(echo) => {
                    catalog.echoes.insert(echo.name.clone(), echo);
                }
                Err(err) => catalog.skip(err),
            }
        }

        info!(
            skills = catalog.skills.len(),
            buffs = catalog.buffs.len(),
            weapon_buffs = catalog.weapon_buffs.len(),
            echo_buffs = catalog.echo_buffs.len(),
            characters = catalog.characters.len(),
            skipped = catalog.malformed.len(),
            "catalog loaded"
        );
        catalog
    }

    fn skip(&mut self, err: MalformedDefinition) {
        warn!(table = err.table, name = %err.name, reason = %err.reason, "skipping malformed definition");
        self.malformed.push(err);
    }

    pub fn skill(&self, name: &str) -> Option<&SkillDefinition> {
        self.skills.get(name)
    }
}

pub fn parse_catalog(json: &str) -> Result<DefinitionCatalog> {
    let file: CatalogFile = serde_json::from_str(json)?;
    Ok(DefinitionCatalog::from_file(&file))
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<DefinitionCatalog> {
    let raw = fs::read_to_string(path)?;
    parse_catalog(&raw)
}

/// Writes a raw catalog as pretty JSON (used by the workbook importer).
pub fn write_catalog_file(file: &CatalogFile, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let payload = serde_json::to_string_pretty(file)?;
    fs::write(path, payload)?;
    Ok(())
}
