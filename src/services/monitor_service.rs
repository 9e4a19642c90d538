use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{MonitoringStatus, Threat, ThreatReport};
use crate::services::external::alert_sources::empty_on_failure;
use crate::services::external::{AlertSourceClient, EnrichmentClient};
use crate::services::incident_service::IncidentService;
use crate::services::normalizer::{normalize, SourceAlert};
use crate::store::SecurityStore;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Query used against the log-search source on every poll
const LOG_QUERY: &str = "severity:high OR severity:critical";

/// The source tags the loop fans out to each tick
const SOURCE_TAGS: [&str; 3] = ["siem", "ids", "edr"];

/// Continuous monitoring loop: polls the alert sources on an interval,
/// normalizes and enriches what they return, appends to the bounded threat
/// history and escalates high-confidence threats.
#[derive(Clone)]
pub struct MonitorService {
    core: Arc<MonitorCore>,
}

struct MonitorCore {
    alerts: Arc<AlertSourceClient>,
    enrichment: Arc<EnrichmentClient>,
    incidents: Arc<IncidentService>,
    store: Arc<SecurityStore>,
    settings: Arc<Settings>,
    running: AtomicBool,
    tick_in_flight: AtomicBool,
    stop_signal: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorService {
    pub fn new(
        alerts: Arc<AlertSourceClient>,
        enrichment: Arc<EnrichmentClient>,
        incidents: Arc<IncidentService>,
        store: Arc<SecurityStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                alerts,
                enrichment,
                incidents,
                store,
                settings,
                running: AtomicBool::new(false),
                tick_in_flight: AtomicBool::new(false),
                stop_signal: Notify::new(),
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling task. Returns false if the loop was already running.
    pub async fn start(&self) -> bool {
        if self.core.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("monitoring loop already running");
            return false;
        }

        let core = Arc::clone(&self.core);
        let interval = Duration::from_secs_f64(self.core.settings.monitor_interval_seconds);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = core.stop_signal.notified() => break,
                }
                if !core.running.load(Ordering::SeqCst) {
                    break;
                }

                // A slow poll must not stack up behind the timer
                if core.tick_in_flight.swap(true, Ordering::SeqCst) {
                    tracing::debug!("previous poll still in flight, skipping tick");
                    continue;
                }

                core.poll_once().await;
                core.tick_in_flight.store(false, Ordering::SeqCst);
            }

            tracing::info!("monitoring loop stopped");
        });

        *self.core.handle.lock().await = Some(handle);
        tracing::info!(
            interval_seconds = self.core.settings.monitor_interval_seconds,
            "monitoring loop started"
        );
        true
    }

    /// Stop the loop. A poll already in flight is allowed to finish; once
    /// this returns, the loop task has exited and no further writes happen.
    pub async fn stop(&self) -> bool {
        if !self.core.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("monitoring loop is not running");
            return false;
        }

        // notify_one leaves a permit in case the task is mid-poll
        self.core.stop_signal.notify_one();

        if let Some(handle) = self.core.handle.lock().await.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "monitoring task panicked");
                }
            }
        }

        true
    }

    pub async fn status(&self) -> MonitoringStatus {
        self.core.status().await
    }

    /// Run one monitoring tick outside the timer
    pub async fn poll_once(&self) -> usize {
        self.core.poll_once().await
    }

    /// Manually reported threats go through the same path as polled ones
    pub async fn report_threat(&self, report: ThreatReport) -> Result<Threat, ApiError> {
        self.core.report_threat(report).await
    }
}

impl MonitorCore {
    async fn status(&self) -> MonitoringStatus {
        let mut sources = Vec::new();
        for tag in SOURCE_TAGS {
            if self.store.source_enabled(tag).await {
                sources.push(tag.to_string());
            }
        }

        MonitoringStatus {
            running: self.running.load(Ordering::SeqCst),
            sources,
            threat_count: self.store.threat_count().await,
            capacity: self.store.capacity(),
        }
    }

    /// One monitoring tick: fan out to the enabled sources concurrently and
    /// route every alert through the normalize / enrich / append path.
    /// Collaborator failures degrade per alert; a tick never aborts mid-batch.
    async fn poll_once(&self) -> usize {
        let siem_task = async {
            if self.store.source_enabled("siem").await {
                empty_on_failure(self.alerts.fetch_log_hits(LOG_QUERY).await, "siem")
            } else {
                Vec::new()
            }
        };
        let ids_task = async {
            if self.store.source_enabled("ids").await {
                empty_on_failure(self.alerts.fetch_ids_alerts().await, "ids")
            } else {
                Vec::new()
            }
        };
        let edr_task = async {
            if self.store.source_enabled("edr").await {
                empty_on_failure(self.alerts.fetch_endpoint_status().await, "edr")
            } else {
                Vec::new()
            }
        };

        let (log_hits, ids_alerts, endpoint_events) = tokio::join!(siem_task, ids_task, edr_task);

        let alerts: Vec<SourceAlert> = log_hits
            .into_iter()
            .map(SourceAlert::Log)
            .chain(ids_alerts.into_iter().map(SourceAlert::Ids))
            .chain(endpoint_events.into_iter().map(SourceAlert::Endpoint))
            .collect();

        let count = alerts.len();
        tracing::debug!(alerts = count, "poll fetched alerts");

        for alert in alerts {
            let threat = normalize(alert);
            self.process_threat(threat).await;
        }

        count
    }

    /// Enrich a threat, append it to the history and escalate it when its
    /// confidence crosses the threshold.
    async fn process_threat(&self, mut threat: Threat) -> Threat {
        let analysis = self
            .enrichment
            .analyze(
                "threat",
                json!({
                    "threat_type": threat.threat_type,
                    "severity": threat.severity,
                    "source": threat.source,
                    "description": threat.description,
                }),
            )
            .await;

        let escalate = analysis.confidence > self.settings.escalation_confidence_threshold;
        threat.analysis = Some(analysis);

        self.store.append_threat(threat.clone()).await;

        if escalate {
            // Automated blocking stays a hook; crossing the threshold only
            // logs the intent and escalates.
            tracing::info!(
                threat_id = %threat.id,
                threat_type = %threat.threat_type,
                "confidence above escalation threshold, escalating to incident"
            );
            // The threat is already in the history; a broken incident store
            // must not take the rest of the batch with it.
            if let Err(e) = self.incidents.escalate(&threat).await {
                tracing::error!(threat_id = %threat.id, error = %e, "incident escalation failed");
            }
        }

        threat
    }

    async fn report_threat(&self, report: ThreatReport) -> Result<Threat, ApiError> {
        let threat_type = report.threat_type.trim();
        if threat_type.is_empty() {
            return Err(ApiError::validation("threat_type must not be empty"));
        }
        let description = report.description.trim();
        if description.is_empty() {
            return Err(ApiError::validation("description must not be empty"));
        }

        let threat = Threat::new(threat_type, report.severity, "manual", description);
        Ok(self.process_threat(threat).await)
    }
}
