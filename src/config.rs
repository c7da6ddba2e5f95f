use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use sonar_hcsr04::RangingConfig;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Everything the bootstrap binary reads from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ranging: RangingConfig,
    pub simulation: SimulationConfig,
    pub app: AppConfig,
}

/// Behaviour of the simulated sensor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Nominal cycle counter frequency (Hz).
    pub counter_hz: u32,
    /// Counter value right after enable; set close to `u32::MAX` to exercise the wrap.
    pub counter_offset: u32,
    /// Distance of the simulated obstacle, in driver units.
    pub target_distance: u32,
    /// Distance reported by a noise echo, in driver units.
    pub noise_distance: u32,
    /// Probability that a pulse gets no echo at all.
    pub drop_probability: f64,
    /// Probability that a pulse gets a noise echo.
    pub noise_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            counter_hz: 168_000_000,
            counter_offset: 0,
            target_distance: 300,
            noise_distance: 1500,
            drop_probability: 0.1,
            noise_probability: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of reads before exiting, 0 reads forever.
    pub reads: u32,
    pub read_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            reads: 20,
            read_interval_ms: 100,
        }
    }
}

pub fn load_config() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("SONAR")
                .prefix_separator("_")
                .separator("__"),
        );

    match settings_from(builder) {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn settings_from(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        settings_from(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = parse("").unwrap();
        assert_eq!(settings.ranging, RangingConfig::default());
        assert_eq!(settings.simulation.counter_hz, 168_000_000);
        assert_eq!(settings.app.reads, 20);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let settings = parse(
            r#"
            [ranging]
            echo_timeout_ms = 25
            max_distance = 1000

            [simulation]
            target_distance = 42
            "#,
        )
        .unwrap();
        assert_eq!(settings.ranging.echo_timeout_ms, 25);
        assert_eq!(settings.ranging.max_distance, 1000);
        assert_eq!(settings.ranging.ticks_per_unit, 1000);
        assert_eq!(settings.simulation.target_distance, 42);
        assert_eq!(settings.simulation.noise_distance, 1500);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(parse("[ranging]\necho_timeout_ms = \"soon\"\n").is_err());
    }
}
