use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{
    CveRef, ScanReport, ScanStatus, ServiceRecord, Severity, TlsAssessment, Vulnerability,
};
use crate::services::external::{AssetDbClient, CveEntry, CveFeedClient, HttpProber, TlsGraderClient};
use crate::store::SecurityStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Ports whose exposure is a finding on its own
const DANGEROUS_PORTS: &[u16] = &[21, 23, 3389, 445, 135, 137, 138, 139];

/// Security headers every response should carry, with the severity of their
/// absence. Lookups are done against lowercased header names.
const SECURITY_HEADERS: &[(&str, Severity)] = &[
    ("Strict-Transport-Security", Severity::High),
    ("X-Frame-Options", Severity::Medium),
    ("X-Content-Type-Options", Severity::Medium),
    ("Content-Security-Policy", Severity::High),
    ("X-XSS-Protection", Severity::Medium),
];

/// Protocol versions that count as deprecated when offered by a server
const DEPRECATED_PROTOCOLS: &[&str] = &["SSL 2.0", "SSL 3.0", "TLS 1.0", "TLS 1.1"];

/// Minimum CVSS v3.1 score a correlated CVE must reach to be reported
const CVE_SCORE_FLOOR: f64 = 7.0;
const CVE_SCORE_CRITICAL: f64 = 9.0;

/// Runs the multi-stage reconnaissance pipeline against a single target.
///
/// Stage order: reachability, passive port discovery, service fingerprinting,
/// TLS grading in parallel with header compliance, then CVE correlation.
/// Only an unreachable target aborts the scan; every other collaborator
/// failure degrades its stage.
pub struct ScanService {
    prober: Arc<HttpProber>,
    asset_db: Arc<AssetDbClient>,
    tls_grader: Arc<TlsGraderClient>,
    cve_feed: Arc<CveFeedClient>,
    store: Arc<SecurityStore>,
    settings: Arc<Settings>,
}

impl ScanService {
    pub fn new(
        prober: Arc<HttpProber>,
        asset_db: Arc<AssetDbClient>,
        tls_grader: Arc<TlsGraderClient>,
        cve_feed: Arc<CveFeedClient>,
        store: Arc<SecurityStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            prober,
            asset_db,
            tls_grader,
            cve_feed,
            store,
            settings,
        }
    }

    pub async fn run_scan(&self, target: &str) -> Result<ScanReport, ApiError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ApiError::validation("scan target must not be empty"));
        }

        let started_at = Utc::now();
        tracing::info!(target = %target, "starting security scan");

        let reachability = match self.prober.check_reachability(target).await {
            Ok(reachability) => reachability,
            Err(e) => {
                // The failed attempt is still recorded as a report
                let report = ScanReport {
                    id: Uuid::new_v4(),
                    target: target.to_string(),
                    ports: Vec::new(),
                    services: Vec::new(),
                    tls: None,
                    vulnerabilities: Vec::new(),
                    status: ScanStatus::Failed,
                    error: Some(e.to_string()),
                    started_at,
                    completed_at: Utc::now(),
                };
                self.store.insert_report(report).await;
                return Err(e);
            }
        };

        let ports = match self.asset_db.lookup_ports(target).await {
            Ok(ports) => ports,
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "port discovery unavailable, continuing without ports");
                Vec::new()
            }
        };

        let mut vulnerabilities = Vec::new();
        if let Some(finding) = dangerous_port_finding(&ports) {
            vulnerabilities.push(finding);
        }

        let services = self.fingerprint_services(target, &ports).await;
        for record in &services {
            if let Some(finding) = outdated_service_finding(record) {
                vulnerabilities.push(finding);
            }
        }

        let tls_task = async {
            if reachability.secure {
                Some(self.tls_grader.assess(target).await)
            } else {
                None
            }
        };
        let headers_task = self.prober.fetch_headers(target, reachability.secure);
        let (tls_outcome, headers_outcome) = tokio::join!(tls_task, headers_task);

        let mut tls = None;
        match tls_outcome {
            Some(Ok(assessment)) => {
                vulnerabilities.extend(tls_findings(&assessment));
                tls = Some(assessment);
            }
            Some(Err(e)) => {
                tracing::warn!(target = %target, error = %e, "TLS assessment failed");
                vulnerabilities.push(tls_failure_finding());
            }
            None => {}
        }

        match headers_outcome {
            Ok(headers) => vulnerabilities.extend(header_findings(&headers)),
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "header compliance check failed, skipping");
            }
        }

        for record in &services {
            let Some(version) = &record.version else {
                continue;
            };
            if record.service == "unknown" {
                continue;
            }
            match self.cve_feed.search(&record.service, version).await {
                Ok(entries) => vulnerabilities.extend(cve_findings(record, entries)),
                Err(e) => {
                    tracing::warn!(
                        port = record.port,
                        service = %record.service,
                        error = %e,
                        "CVE correlation failed for service, skipping"
                    );
                }
            }
        }

        let report = ScanReport {
            id: Uuid::new_v4(),
            target: target.to_string(),
            ports,
            services,
            tls,
            vulnerabilities,
            status: ScanStatus::Completed,
            error: None,
            started_at,
            completed_at: Utc::now(),
        };

        self.store.insert_report(report.clone()).await;
        tracing::info!(
            scan_id = %report.id,
            target = %target,
            findings = report.vulnerabilities.len(),
            "scan completed"
        );

        Ok(report)
    }

    /// Probe each open port for a banner with bounded concurrency.
    /// A port that refuses the probe simply yields no service record.
    async fn fingerprint_services(&self, target: &str, ports: &[u16]) -> Vec<ServiceRecord> {
        let concurrency = self.settings.fingerprint_concurrency as usize;

        let mut services: Vec<ServiceRecord> = stream::iter(ports.to_vec())
            .map(|port| {
                let prober = Arc::clone(&self.prober);
                let target = target.to_string();
                async move {
                    match prober.grab_banner(&target, port).await {
                        Ok(banner) => {
                            let (service, version) = match banner.get("server") {
                                Some(server) => parse_server_header(server),
                                None => ("unknown".to_string(), None),
                            };
                            Some(ServiceRecord {
                                port,
                                service,
                                version,
                                banner,
                            })
                        }
                        Err(e) => {
                            tracing::debug!(port = port, error = %e, "banner grab failed");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|record| async move { record })
            .collect()
            .await;

        services.sort_by_key(|s| s.port);
        services
    }
}

/// Split a Server header into service name and version
fn parse_server_header(server: &str) -> (String, Option<String>) {
    match server.split_once('/') {
        Some((name, version)) => {
            let version = version.split_whitespace().next().unwrap_or(version);
            (name.to_string(), Some(version.to_string()))
        }
        None => (server.to_string(), None),
    }
}

/// One finding listing every dangerous port found open, or none
fn dangerous_port_finding(ports: &[u16]) -> Option<Vulnerability> {
    let dangerous: Vec<u16> = ports
        .iter()
        .copied()
        .filter(|p| DANGEROUS_PORTS.contains(p))
        .collect();

    if dangerous.is_empty() {
        return None;
    }

    let listed = dangerous
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    Some(Vulnerability {
        name: "Potentially Dangerous Ports Open".to_string(),
        description: format!(
            "The following ports associated with high-risk services are open: {}",
            listed
        ),
        severity: Severity::High,
        service: None,
        port: None,
        exploitable: true,
        cve: None,
    })
}

/// Major version below 2 marks the service as outdated
fn outdated_service_finding(record: &ServiceRecord) -> Option<Vulnerability> {
    let version = record.version.as_deref()?;
    let major: u32 = version.split('.').next()?.parse().ok()?;

    if major >= 2 {
        return None;
    }

    Some(Vulnerability {
        name: "Outdated Service Version".to_string(),
        description: format!(
            "{} {} on port {} appears to be an outdated major version",
            record.service, version, record.port
        ),
        severity: Severity::Medium,
        service: Some(record.service.clone()),
        port: Some(record.port),
        exploitable: true,
        cve: None,
    })
}

/// Derive findings from a completed TLS assessment
fn tls_findings(tls: &TlsAssessment) -> Vec<Vulnerability> {
    let mut findings = Vec::new();

    if let Some(days) = tls.days_until_expiry {
        if days < 30 {
            findings.push(Vulnerability {
                name: "SSL Certificate Expiring Soon".to_string(),
                description: format!("The TLS certificate expires in {} days", days),
                severity: Severity::Medium,
                service: Some("https".to_string()),
                port: Some(443),
                exploitable: false,
                cve: None,
            });
        }
    }

    match tls.grade.chars().next() {
        Some('B') | Some('C') => findings.push(Vulnerability {
            name: "Weak SSL Configuration".to_string(),
            description: format!("TLS configuration graded {}", tls.grade),
            severity: Severity::Medium,
            service: Some("https".to_string()),
            port: Some(443),
            exploitable: false,
            cve: None,
        }),
        Some('D') | Some('F') => findings.push(Vulnerability {
            name: "Critical SSL Configuration".to_string(),
            description: format!("TLS configuration graded {}", tls.grade),
            severity: Severity::High,
            service: Some("https".to_string()),
            port: Some(443),
            exploitable: true,
            cve: None,
        }),
        _ => {}
    }

    let deprecated: Vec<&str> = tls
        .protocols
        .iter()
        .map(String::as_str)
        .filter(|p| DEPRECATED_PROTOCOLS.contains(p))
        .collect();
    if !deprecated.is_empty() {
        findings.push(Vulnerability {
            name: "Weak SSL/TLS Protocols".to_string(),
            description: format!(
                "Deprecated protocol versions offered: {}",
                deprecated.join(", ")
            ),
            severity: Severity::High,
            service: Some("https".to_string()),
            port: Some(443),
            exploitable: true,
            cve: None,
        });
    }

    findings
}

/// Finding recorded when the TLS assessor fails outright
fn tls_failure_finding() -> Vulnerability {
    Vulnerability {
        name: "SSL Certificate Issues".to_string(),
        description: "The TLS configuration could not be assessed".to_string(),
        severity: Severity::Medium,
        service: Some("https".to_string()),
        port: Some(443),
        exploitable: false,
        cve: None,
    }
}

/// One finding per security header missing from the response
fn header_findings(headers: &HashMap<String, String>) -> Vec<Vulnerability> {
    SECURITY_HEADERS
        .iter()
        .filter(|(name, _)| !headers.contains_key(&name.to_lowercase()))
        .map(|(name, severity)| Vulnerability {
            name: format!("Missing {}", name),
            description: format!("The {} response header is not set", name),
            severity: *severity,
            service: None,
            port: None,
            exploitable: *severity == Severity::High,
            cve: None,
        })
        .collect()
}

/// Correlated CVE entries at or above the score floor become findings
fn cve_findings(record: &ServiceRecord, entries: Vec<CveEntry>) -> Vec<Vulnerability> {
    entries
        .into_iter()
        .filter(|entry| entry.score >= CVE_SCORE_FLOOR)
        .map(|entry| {
            let severity = if entry.score >= CVE_SCORE_CRITICAL {
                Severity::Critical
            } else {
                Severity::High
            };
            let description = if entry.description.is_empty() {
                format!(
                    "{} affects {} {}",
                    entry.id,
                    record.service,
                    record.version.as_deref().unwrap_or("")
                )
            } else {
                entry.description.clone()
            };
            Vulnerability {
                name: format!("Known Vulnerability: {}", entry.id),
                description,
                severity,
                service: Some(record.service.clone()),
                port: Some(record.port),
                exploitable: true,
                cve: Some(CveRef {
                    id: entry.id,
                    score: entry.score,
                    vector: entry.vector,
                }),
            }
        })
        .collect()
}
