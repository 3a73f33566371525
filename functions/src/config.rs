use std::time::Duration;

use config::{ConfigError, Environment, File, FileFormat, Source};

const CONFIG_FILE: &str = "functions.toml";
const ENV_PREFIX: &str = "FUNCTIONS";

/// Runtime settings, layered as defaults < `functions.toml` < `FUNCTIONS_*` env vars.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub server_address: String,
    pub connection_timeout_ms: u64,
    pub max_connections: usize,
    pub delay_ms: u64,
    pub upstream_timeout_ms: u64,
    pub shell: String,
    pub echo_variable: String,
    pub redirect_location: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let file = File::new(CONFIG_FILE, FileFormat::Toml).required(false);
        Self::layered(file, environment())
    }

    fn layered<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        ::config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .try_parsing(true)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:80".into(),
            connection_timeout_ms: 15_000,
            max_connections: 1_000,
            delay_ms: 1_000,
            upstream_timeout_ms: 10_000,
            shell: "bash".into(),
            echo_variable: "FOO".into(),
            redirect_location: "https://www.boltic.io".into(),
        }
    }
}
