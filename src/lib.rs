use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::config::Settings;
use crate::error::ApiError;
use crate::services::external::{
    AlertSourceClient, AssetDbClient, CveFeedClient, EnrichmentClient, HttpProber, ProbeConfig,
    RateLimitedClient, TlsGraderClient,
};
use crate::services::{IncidentService, MonitorService, ScanService};
use crate::store::{InMemoryIncidentRepository, IncidentRepository, SecurityStore};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<SecurityStore>,
    pub scan_service: Arc<ScanService>,
    pub monitor_service: MonitorService,
    pub incident_service: Arc<IncidentService>,
}

impl AppState {
    /// Create new application state with dependency injection
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let settings = Arc::new(settings);
        let http_timeout = Duration::from_secs_f64(settings.http_timeout_seconds);

        let store = Arc::new(SecurityStore::new(
            settings.threat_history_capacity as usize,
        ));

        let prober = Arc::new(HttpProber::new(ProbeConfig {
            request_timeout: http_timeout,
            banner_timeout: Duration::from_secs_f64(settings.banner_timeout_seconds),
            user_agent: "SecOps-Scanner/1.0".to_string(),
        })?);

        let asset_db = Arc::new(AssetDbClient::new(
            RateLimitedClient::with_timeout(
                settings.external_rate_limit_per_second,
                settings.external_max_retries,
                http_timeout,
            )?,
            &settings.asset_db_url,
            settings.asset_db_api_key.clone(),
        ));

        let tls_grader = Arc::new(TlsGraderClient::new(
            &settings.tls_grader_url,
            settings.tls_poll_attempts,
            Duration::from_secs_f64(settings.tls_poll_delay_seconds),
            http_timeout,
        )?);

        let cve_feed = Arc::new(CveFeedClient::new(
            RateLimitedClient::with_timeout(
                settings.external_rate_limit_per_second,
                settings.external_max_retries,
                http_timeout,
            )?,
            &settings.cve_feed_url,
        ));

        let alerts = Arc::new(AlertSourceClient::new(&settings.alert_api_url, http_timeout)?);

        let enrichment = Arc::new(EnrichmentClient::new(
            &settings.enrichment_api_url,
            settings.enrichment_api_key.clone(),
            http_timeout,
        )?);

        let incident_repo: Arc<dyn IncidentRepository + Send + Sync> =
            Arc::new(InMemoryIncidentRepository::new());
        let incident_service = Arc::new(IncidentService::new(
            incident_repo,
            Arc::clone(&enrichment),
        ));

        let scan_service = Arc::new(ScanService::new(
            prober,
            asset_db,
            tls_grader,
            cve_feed,
            Arc::clone(&store),
            Arc::clone(&settings),
        ));

        let monitor_service = MonitorService::new(
            alerts,
            enrichment,
            Arc::clone(&incident_service),
            Arc::clone(&store),
            Arc::clone(&settings),
        );

        Ok(Self {
            settings,
            store,
            scan_service,
            monitor_service,
            incident_service,
        })
    }
}

/// Build the HTTP command surface over an application state
pub fn build_router(state: AppState) -> Router {
    let cors_layer = middleware::create_cors_layer(state.settings.cors_allow_origins.clone());

    Router::new()
        .route("/api/health", get(handlers::health_check))
        // Scan pipeline
        .route("/api/scans", post(handlers::scan_handlers::create_scan))
        .route("/api/scans", get(handlers::scan_handlers::list_scans))
        .route("/api/scans/:id", get(handlers::scan_handlers::get_scan))
        // Monitoring loop
        .route(
            "/api/monitoring/start",
            post(handlers::monitoring_handlers::start_monitoring),
        )
        .route(
            "/api/monitoring/stop",
            post(handlers::monitoring_handlers::stop_monitoring),
        )
        .route(
            "/api/monitoring/status",
            get(handlers::monitoring_handlers::monitoring_status),
        )
        .route(
            "/api/monitoring/targets",
            get(handlers::monitoring_handlers::list_targets),
        )
        .route(
            "/api/monitoring/targets",
            post(handlers::monitoring_handlers::create_target),
        )
        .route(
            "/api/monitoring/targets/:id",
            delete(handlers::monitoring_handlers::delete_target),
        )
        .route(
            "/api/monitoring/targets/:id/toggle",
            post(handlers::monitoring_handlers::toggle_target),
        )
        // Threats
        .route(
            "/api/threats",
            get(handlers::monitoring_handlers::list_threats),
        )
        .route(
            "/api/threats/report",
            post(handlers::monitoring_handlers::report_threat),
        )
        .route(
            "/api/threats/:id",
            patch(handlers::monitoring_handlers::update_threat_status),
        )
        // Incidents
        .route(
            "/api/incidents",
            get(handlers::incident_handlers::list_incidents),
        )
        .route(
            "/api/incidents/:id/handle",
            post(handlers::incident_handlers::handle_incident),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .layer(middleware::create_logging_layer())
        .layer(cors_layer)
}
