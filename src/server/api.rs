//! JSON payload builders for the HTTP routes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::{RunReport, RunSummary, StepRecord};
use crate::data::build_code;
use crate::data::{load_catalog, TeamConfig, DEFAULT_CATALOG_PATH};
use crate::error::{BuildCodeError, CatalogError};
use crate::parallel::run_one;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Build(#[from] BuildCodeError),
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "rotasim-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateRequest {
    pub team: TeamConfig,
    /// Catalog file; defaults to the bundled catalog path.
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub include_steps: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulateResponse {
    pub summary: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepRecord>>,
}

pub fn simulate_payload(body: &str) -> Result<String, ApiError> {
    let req: SimulateRequest = serde_json::from_str(body)?;
    if req.team.members.is_empty() {
        return Err(ApiError::Validation("team.members is required".to_string()));
    }
    let path = req
        .catalog_path
        .as_deref()
        .unwrap_or(DEFAULT_CATALOG_PATH);
    let catalog = load_catalog(path)?;
    let RunReport { steps, summary } = run_one(&catalog, &req.team)?;
    let response = SimulateResponse {
        summary,
        steps: req.include_steps.then_some(steps),
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodeRequest {
    pub team: TeamConfig,
}

pub fn encode_payload(body: &str) -> Result<String, ApiError> {
    let req: EncodeRequest = serde_json::from_str(body)?;
    let code = build_code::encode(&req.team);
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "code": code }))?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecodeRequest {
    pub code: String,
}

pub fn decode_payload(body: &str) -> Result<String, ApiError> {
    let req: DecodeRequest = serde_json::from_str(body)?;
    let team = build_code::decode(&req.code)?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "team": team }))?)
}
