pub mod external;
pub mod incident_service;
pub mod monitor_service;
pub mod normalizer;
pub mod scan_service;

pub use incident_service::IncidentService;
pub use monitor_service::MonitorService;
pub use scan_service::ScanService;
