//! Server configuration parsed from environment variables.

pub const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Loopback port to listen on.
    pub port: u16,
    /// Whether to register the sample `foo`/`bar`/`calc` objects at startup.
    pub register_samples: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, register_samples: true }
    }
}

impl ServerConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `NETCALL_PORT`: default 5555
    /// - `NETCALL_SAMPLES`: `true` (default) or `false`
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or(lookup("NETCALL_PORT"), defaults.port),
            register_samples: parse_or(lookup("NETCALL_SAMPLES"), defaults.register_samples),
        }
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
