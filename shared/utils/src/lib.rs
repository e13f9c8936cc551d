pub mod config;
pub mod logging;
pub mod error;

pub use config::*;
pub use logging::*;
pub use error::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ai.timeout_seconds, 30);
        assert_eq!(config.analysis.lease_timeout_seconds, 300);
        assert_eq!(config.analysis.insights_report_limit, 5);
    }

    #[test]
    fn test_error_handling() {
        let error = HealthMateError::busy("report 42 is already being analyzed");
        assert_eq!(error.error_code(), "BUSY");
        assert_eq!(error.http_status_code(), 409);
    }
}
