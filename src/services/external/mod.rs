pub mod alert_sources;
pub mod asset_db;
pub mod cve_feed;
pub mod enrichment;
pub mod probe;
pub mod rate_limited_client;
pub mod tls_grader;

pub use alert_sources::AlertSourceClient;
pub use asset_db::AssetDbClient;
pub use cve_feed::{CveEntry, CveFeedClient};
pub use enrichment::EnrichmentClient;
pub use probe::{HttpProber, ProbeConfig, Reachability};
pub use rate_limited_client::RateLimitedClient;
pub use tls_grader::TlsGraderClient;
