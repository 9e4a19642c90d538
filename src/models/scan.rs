use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Severity level shared by vulnerabilities, threats and incidents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Reference to a correlated CVE entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveRef {
    pub id: String,
    pub score: f64,
    pub vector: Option<String>,
}

/// A single derived finding attached to a scan report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub exploitable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<CveRef>,
}

/// Fingerprinted service on an open port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub port: u16,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub banner: HashMap<String, String>,
}

/// TLS posture as reported by the grading service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsAssessment {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
    #[serde(default)]
    pub protocols: Vec<String>,
    pub grade: String,
}

impl TlsAssessment {
    /// Conservative default used when the grading service degrades
    pub fn unknown() -> Self {
        Self {
            valid: false,
            days_until_expiry: None,
            protocols: Vec::new(),
            grade: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Completed,
    Failed,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Immutable result of one pipeline run; a re-scan produces a fresh report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: Uuid,
    pub target: String,
    pub ports: Vec<u16>,
    pub services: Vec<ServiceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsAssessment>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!(Severity::from("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from("High"), Severity::High);
        assert_eq!(Severity::from("medium"), Severity::Medium);
        assert_eq!(Severity::from("nonsense"), Severity::Low);
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::to_string(&ScanStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn unknown_tls_assessment_is_conservative() {
        let tls = TlsAssessment::unknown();
        assert!(!tls.valid);
        assert!(tls.days_until_expiry.is_none());
        assert!(tls.protocols.is_empty());
        assert_eq!(tls.grade, "Unknown");
    }
}
