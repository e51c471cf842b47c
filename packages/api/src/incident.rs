//! Incident records (`/incidents`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{require_field, require_id, Entity, Ref, ValidationError};
use crate::{ParseEnumError, User, Workplace};

/// Triage state of an incident.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum IncidentStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// `Open` and `In Progress` incidents still need attention.
    pub fn is_open(self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::InProgress => "In Progress",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = ParseEnumError;

    /// Accepts the wire spelling as well as `in-progress` / `in_progress`,
    /// case-insensitively, so the value can be typed on a command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "open" => Ok(IncidentStatus::Open),
            "in progress" => Ok(IncidentStatus::InProgress),
            "resolved" => Ok(IncidentStatus::Resolved),
            "closed" => Ok(IncidentStatus::Closed),
            _ => Err(ParseEnumError {
                kind: "incident status",
                value: s.to_string(),
            }),
        }
    }
}

/// Reporter's assessment of how dangerous the hazard is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        })
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(ParseEnumError {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}

/// A reported safety incident.
///
/// `photo_path` is always written to the wire, as `null` when absent, so
/// that sending a record through an update clears a photo the caller
/// removed instead of leaving the stored one in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub title: String,

    pub description: String,

    #[serde(rename = "photoPath", default)]
    pub photo_path: Option<String>,

    /// The reporting user.
    #[serde(rename = "reportedBy")]
    pub reported_by: Ref<User>,

    #[serde(rename = "workplaceId")]
    pub workplace: Ref<Workplace>,

    #[serde(default)]
    pub status: IncidentStatus,

    /// Report time. Stamped by the server when a create payload omits it.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "riskLevel", default)]
    pub risk_level: RiskLevel,
}

impl Incident {
    /// A new `Open` report that has not been stored yet.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        risk_level: RiskLevel,
        reported_by: impl Into<String>,
        workplace: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: description.into(),
            photo_path: None,
            reported_by: Ref::Id(reported_by.into()),
            workplace: Ref::Id(workplace.into()),
            status: IncidentStatus::Open,
            created_at: None,
            risk_level,
        }
    }

    /// Whether `user_id` filed this incident.
    pub fn is_reported_by(&self, user_id: &str) -> bool {
        self.reported_by.id() == user_id
    }
}

impl Entity for Incident {
    const COLLECTION: &'static str = "/incidents";
    const KIND: &'static str = "incident";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_id(Self::KIND, &self.id)?;
        require_field(Self::KIND, "title", &self.title)?;
        self.reported_by.validate()?;
        self.workplace.validate()
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Dashboard counters over a list of incidents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    /// `Open` or `In Progress`.
    pub open: usize,
    /// `Resolved` or `Closed`.
    pub resolved: usize,
    pub total: usize,
}

impl IncidentSummary {
    pub fn from_incidents(incidents: &[Incident]) -> Self {
        let open = incidents.iter().filter(|i| i.status.is_open()).count();
        Self {
            open,
            resolved: incidents.len() - open,
            total: incidents.len(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(status: IncidentStatus) -> Incident {
        let mut i = Incident::new("Loose rail", "Stair rail on level 2", RiskLevel::High, "u-1", "wp-1");
        i.id = format!("inc-{status}");
        i.status = status;
        i
    }

    #[test]
    fn create_payload_shape() {
        let json: serde_json::Value =
            serde_json::to_value(Incident::new("Spill", "Oil by press 3", RiskLevel::Medium, "u-1", "wp-1"))
                .unwrap();
        assert!(json.get("_id").is_none());
        assert!(json.get("createdAt").is_none());
        assert_eq!(json["photoPath"], serde_json::Value::Null);
        assert_eq!(json["status"], "Open");
        assert_eq!(json["riskLevel"], "Medium");
        assert_eq!(json["reportedBy"], "u-1");
    }

    #[test]
    fn decodes_populated_incident() {
        let json = r#"{
            "_id": "inc-1",
            "title": "Spill",
            "description": "Oil by press 3",
            "reportedBy": {"_id":"u-1","name":"Ash","email":"ash@example.com","role":"user","workplaceId":"wp-1"},
            "workplaceId": {"_id":"wp-1","name":"Site A","location":"Dock 4"},
            "status": "In Progress",
            "createdAt": "2025-06-15T08:30:00.000Z",
            "riskLevel": "High"
        }"#;
        let i: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(i.status, IncidentStatus::InProgress);
        assert!(i.is_reported_by("u-1"));
        assert_eq!(i.reported_by.record().unwrap().name, "Ash");
        assert!(i.photo_path.is_none());
        assert!(i.created_at.is_some());
        assert!(i.validate().is_ok());
    }

    #[test]
    fn missing_status_and_risk_default() {
        let json = r#"{"_id":"inc-1","title":"t","description":"d","reportedBy":"u-1","workplaceId":"wp-1"}"#;
        let i: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(i.status, IncidentStatus::Open);
        assert_eq!(i.risk_level, RiskLevel::Low);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in-progress".parse::<IncidentStatus>().unwrap(), IncidentStatus::InProgress);
        assert_eq!("In Progress".parse::<IncidentStatus>().unwrap(), IncidentStatus::InProgress);
        assert_eq!("CLOSED".parse::<IncidentStatus>().unwrap(), IncidentStatus::Closed);
        assert!("pending".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn summary_counts() {
        let incidents = vec![
            stored(IncidentStatus::Open),
            stored(IncidentStatus::InProgress),
            stored(IncidentStatus::Resolved),
            stored(IncidentStatus::Closed),
            stored(IncidentStatus::Open),
        ];
        assert_eq!(
            IncidentSummary::from_incidents(&incidents),
            IncidentSummary {
                open: 3,
                resolved: 2,
                total: 5
            }
        );
    }

    #[test]
    fn blank_title_is_invalid() {
        let mut i = stored(IncidentStatus::Open);
        i.title = "  ".into();
        assert!(matches!(
            i.validate(),
            Err(ValidationError::EmptyField { field: "title", .. })
        ));
    }
}
