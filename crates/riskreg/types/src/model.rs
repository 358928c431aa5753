//! Rows, controls and the links between them.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::ids::{ControlId, LinkId, ProcessId, RiskId, RowId, UserId};
use crate::score::{Score, ScoreTriple};

// ── Row ─────────────────────────────────────────────────────────────────

/// One risk × process cell of the register.
///
/// `grossScore` is never stored: it is always derived from the two gross
/// inputs so it cannot drift from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,
    pub risk_id: RiskId,
    pub process_id: ProcessId,
    pub gross_probability: Option<Score>,
    pub gross_impact: Option<Score>,
    pub risk_appetite: u8,
    /// Controls owned exclusively by this row, in display order.
    #[serde(default)]
    pub controls: Vec<Control>,
}

impl Row {
    /// A fresh, unscored row for a taxonomy pair.
    pub fn new(risk_id: RiskId, process_id: ProcessId, risk_appetite: u8) -> Self {
        Self {
            id: RowId::generate(),
            risk_id,
            process_id,
            gross_probability: None,
            gross_impact: None,
            risk_appetite,
            controls: Vec::new(),
        }
    }

    pub fn with_gross(mut self, probability: Option<Score>, impact: Option<Score>) -> Self {
        self.gross_probability = probability;
        self.gross_impact = impact;
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    pub fn gross_score(&self) -> Option<u8> {
        Score::product(self.gross_probability, self.gross_impact)
    }

    pub fn gross(&self) -> ScoreTriple {
        ScoreTriple::from_pair(self.gross_probability, self.gross_impact)
    }

    pub fn find_control(&self, id: &ControlId) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == *id)
    }

    pub fn find_control_mut(&mut self, id: &ControlId) -> Option<&mut Control> {
        self.controls.iter_mut().find(|c| c.id == *id)
    }
}

// ── Control ─────────────────────────────────────────────────────────────

/// Kind of mitigation a control provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Preventive,
    Detective,
    Corrective,
    Directive,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Detective => "detective",
            Self::Corrective => "corrective",
            Self::Directive => "directive",
        }
    }
}

impl std::str::FromStr for ControlType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preventive" => Ok(Self::Preventive),
            "detective" => Ok(Self::Detective),
            "corrective" => Ok(Self::Corrective),
            "directive" => Ok(Self::Directive),
            _ => Err(ModelError::InvalidValue {
                field: "controlType".into(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a control's operating effectiveness is tested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
    AdHoc,
}

impl TestFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::SemiAnnually => "semi_annually",
            Self::Annually => "annually",
            Self::AdHoc => "ad_hoc",
        }
    }
}

impl std::str::FromStr for TestFrequency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "semi_annually" => Ok(Self::SemiAnnually),
            "annually" => Ok(Self::Annually),
            "ad_hoc" => Ok(Self::AdHoc),
            _ => Err(ModelError::InvalidValue {
                field: "testFrequency".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// A mitigating control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub id: ControlId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub control_type: ControlType,
    pub net_probability: Option<Score>,
    pub net_impact: Option<Score>,
    pub assigned_tester_id: Option<UserId>,
    pub test_frequency: Option<TestFrequency>,
    #[serde(default)]
    pub test_procedure: String,
    #[serde(default)]
    pub comment: String,
}

impl Control {
    pub fn new(name: impl Into<String>, control_type: ControlType) -> Self {
        Self {
            id: ControlId::generate(),
            name: name.into(),
            description: String::new(),
            control_type,
            net_probability: None,
            net_impact: None,
            assigned_tester_id: None,
            test_frequency: None,
            test_procedure: String::new(),
            comment: String::new(),
        }
    }

    pub fn with_scores(mut self, probability: Option<Score>, impact: Option<Score>) -> Self {
        self.net_probability = probability;
        self.net_impact = impact;
        self
    }

    pub fn net_score(&self) -> Option<u8> {
        Score::product(self.net_probability, self.net_impact)
    }

    pub fn net(&self) -> ScoreTriple {
        ScoreTriple::from_pair(self.net_probability, self.net_impact)
    }
}

/// Fields supplied when a governing user creates a control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewControl {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub control_type: ControlType,
    pub net_probability: Option<Score>,
    pub net_impact: Option<Score>,
    pub assigned_tester_id: Option<UserId>,
    pub test_frequency: Option<TestFrequency>,
}

impl NewControl {
    pub fn into_control(self) -> Control {
        Control {
            id: ControlId::generate(),
            name: self.name,
            description: self.description,
            control_type: self.control_type,
            net_probability: self.net_probability,
            net_impact: self.net_impact,
            assigned_tester_id: self.assigned_tester_id,
            test_frequency: self.test_frequency,
            test_procedure: String::new(),
            comment: String::new(),
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidValue {
                field: "name".into(),
                value: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Where a control lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum ControlPlacement {
    /// Owned by exactly one row, stored in that row's control list.
    Embedded { row_id: RowId },
    /// Owned by no row; reaches rows through links.
    Hub,
}

impl ControlPlacement {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }
}

// ── ControlLink ─────────────────────────────────────────────────────────

/// Association between a hub control and a row, with optional per-row
/// overrides that shadow the control's own scores for that row only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlLink {
    pub id: LinkId,
    pub row_id: RowId,
    pub control_id: ControlId,
    pub net_probability: Option<Score>,
    pub net_impact: Option<Score>,
}

impl ControlLink {
    pub fn new(row_id: RowId, control_id: ControlId) -> Self {
        Self {
            id: LinkId::generate(),
            row_id,
            control_id,
            net_probability: None,
            net_impact: None,
        }
    }

    pub fn with_overrides(mut self, probability: Option<Score>, impact: Option<Score>) -> Self {
        self.net_probability = probability;
        self.net_impact = impact;
        self
    }

    /// Override score, present only when both overrides are set.
    pub fn net_score(&self) -> Option<u8> {
        Score::product(self.net_probability, self.net_impact)
    }

    /// Probability for this row: override first, control default second.
    pub fn resolve_probability(&self, control: Option<&Control>) -> Option<Score> {
        self.net_probability
            .or_else(|| control.and_then(|c| c.net_probability))
    }

    /// Impact for this row: override first, control default second.
    pub fn resolve_impact(&self, control: Option<&Control>) -> Option<Score> {
        self.net_impact.or_else(|| control.and_then(|c| c.net_impact))
    }

    pub fn has_override(&self) -> bool {
        self.net_probability.is_some() || self.net_impact.is_some()
    }
}
