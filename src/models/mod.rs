pub mod incident;
pub mod scan;
pub mod threat;

pub use incident::{Incident, IncidentCreate, IncidentStatus};
pub use scan::{
    CveRef, ScanReport, ScanRequest, ScanStatus, ServiceRecord, Severity, TlsAssessment,
    Vulnerability,
};
pub use threat::{
    MonitoringStatus, MonitoringTarget, MonitoringTargetCreate, Threat, ThreatAnalysis,
    ThreatReport, ThreatStatus,
};
