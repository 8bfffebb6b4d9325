//! Per-step trace export as CSV.

use std::io::Write;

use serde::Serialize;

use crate::combat::report::StepRecord;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct TraceRow<'a> {
    index: usize,
    character: &'a str,
    skill: &'a str,
    time: f64,
    wait: f64,
    resonance: f64,
    concerto: f64,
    damage: f64,
    personal_buffs: &'a str,
    team_buffs: &'a str,
    annotation: String,
}

impl<'a> From<&'a StepRecord> for TraceRow<'a> {
    fn from(step: &'a StepRecord) -> Self {
        Self {
            index: step.index,
            character: &step.character,
            skill: &step.skill,
            time: step.time,
            wait: step.wait,
            resonance: step.resonance,
            concerto: step.concerto,
            damage: step.damage,
            personal_buffs: &step.personal_buffs,
            team_buffs: &step.team_buffs,
            annotation: step.full_annotation(),
        }
    }
}

/// Writes one header row and one row per step.
pub fn write_step_trace<W: Write>(writer: W, steps: &[StepRecord]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for step in steps {
        out.serialize(TraceRow::from(step))?;
    }
    out.flush()?;
    Ok(())
}
