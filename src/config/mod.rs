use std::env;

use chrono_tz::Tz;

/// Hard ceiling for any page-at-a-time scan, whatever the caller asks for.
pub const MAX_SCAN_PAGE_SIZE: usize = 500;

/// Index configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub default_timezone: Tz,
    pub scan_page_size: usize,
    pub security_standards_path: Option<String>,
}

impl IndexConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            default_timezone: parse_timezone(
                &env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            ),
            scan_page_size: env::var("SCAN_PAGE_SIZE")
                .unwrap_or_else(|_| MAX_SCAN_PAGE_SIZE.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_SCAN_PAGE_SIZE)
                .clamp(1, MAX_SCAN_PAGE_SIZE),
            security_standards_path: env::var("SECURITY_STANDARDS_PATH").ok(),
        })
    }
}

/// Parse an IANA timezone name, falling back to UTC.
pub fn parse_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = %name, "Unknown timezone, falling back to UTC");
            Tz::UTC
        }
    }
}
