use crate::models::{Severity, Threat};
use crate::services::external::alert_sources::{EndpointStatus, IdsAlert, LogHit};

/// One alert from any of the heterogeneous sources, tagged with its origin
#[derive(Debug, Clone)]
pub enum SourceAlert {
    Log(LogHit),
    Ids(IdsAlert),
    Endpoint(EndpointStatus),
}

impl SourceAlert {
    /// Source tag recorded on the resulting threat
    pub fn source_tag(&self) -> &'static str {
        match self {
            SourceAlert::Log(_) => "siem",
            SourceAlert::Ids(_) => "ids",
            SourceAlert::Endpoint(_) => "edr",
        }
    }
}

/// Turn a source-native alert into a pending threat skeleton. Missing fields
/// fall back to defaults; normalization itself never fails.
pub fn normalize(alert: SourceAlert) -> Threat {
    let source = alert.source_tag();

    let (alert_type, severity, description) = match alert {
        SourceAlert::Log(hit) => (hit.alert_type, hit.severity, hit.description),
        SourceAlert::Ids(alert) => (alert.alert_type, alert.severity, alert.description),
        SourceAlert::Endpoint(status) => (status.status_type, status.severity, status.description),
    };

    Threat::new(
        alert_type.unwrap_or_else(|| "unknown".to_string()),
        severity.as_deref().map(Severity::from).unwrap_or(Severity::Low),
        source,
        description.unwrap_or_default(),
    )
}
