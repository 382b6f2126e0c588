/*
[INPUT]:  Backend schema definitions and serde requirements
[OUTPUT]: Typed Rust enums for stages and incident categories
[POS]:    Data layer - type definitions shared by backend and timer engine
[UPDATE]: When production stages or incident categories change
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A timed phase of task execution.
///
/// Only [`Stage::Assembly`] is timed today. The remaining variants are kept so
/// that records written by earlier multi-stage revisions still deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sticker,
    Cutting,
    Assembly,
    Packaging,
}

impl Stage {
    /// The stage whose timer operators currently run.
    pub const ACTIVE: Stage = Stage::Assembly;

    pub const ALL: [Stage; 4] = [
        Stage::Sticker,
        Stage::Cutting,
        Stage::Assembly,
        Stage::Packaging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sticker => "sticker",
            Stage::Cutting => "cutting",
            Stage::Assembly => "assembly",
            Stage::Packaging => "packaging",
        }
    }

    /// Human readable title shown to operators.
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Sticker => "Sticker",
            Stage::Cutting => "Cutting and wiring",
            Stage::Assembly => "Assembly",
            Stage::Packaging => "Packaging",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sticker" => Ok(Stage::Sticker),
            "cutting" => Ok(Stage::Cutting),
            "assembly" => Ok(Stage::Assembly),
            "packaging" => Ok(Stage::Packaging),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// Stage recorded on the remote order. Distinct from the timer phase: an order
/// moves to `Summary` once its completion report has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStage {
    Form,
    Sticker,
    Cutting,
    Assembly,
    Packaging,
    Summary,
}

impl OrderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::Form => "form",
            OrderStage::Sticker => "sticker",
            OrderStage::Cutting => "cutting",
            OrderStage::Assembly => "assembly",
            OrderStage::Packaging => "packaging",
            OrderStage::Summary => "summary",
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, OrderStage::Summary)
    }
}

impl From<Stage> for OrderStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Sticker => OrderStage::Sticker,
            Stage::Cutting => OrderStage::Cutting,
            Stage::Assembly => OrderStage::Assembly,
            Stage::Packaging => OrderStage::Packaging,
        }
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories offered when an operator reports incidents on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Material,
    Tooling,
    Quality,
    Documentation,
    Other,
}

impl IncidentCategory {
    pub const ALL: [IncidentCategory; 5] = [
        IncidentCategory::Material,
        IncidentCategory::Tooling,
        IncidentCategory::Quality,
        IncidentCategory::Documentation,
        IncidentCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IncidentCategory::Material => "Missing or defective material",
            IncidentCategory::Tooling => "Tooling failure",
            IncidentCategory::Quality => "Quality issue",
            IncidentCategory::Documentation => "Documentation error",
            IncidentCategory::Other => "Other",
        }
    }
}
