use std::env;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres URL. Without it the service starts but refuses checks.
    pub database_url: Option<String>,
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Self {
            database_url: non_empty("DATABASE_URL"),
            bind_addr: non_empty("VEGANCHECK_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}
