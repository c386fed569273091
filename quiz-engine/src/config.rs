use serde::Deserialize;
use std::env;

/// Runtime knobs for the session engine. Loaded from an optional
/// `config/{env}.toml` file with `QUIZ__`-prefixed environment overrides;
/// every key has a default so the engine runs with no configuration at all.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub max_hints_per_question: u32,
    pub tick_interval_ms: u64,
    pub persist_async: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hints_per_question: 3,
            tick_interval_ms: 1000,
            persist_async: true,
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("QUIZ").separator("__"))
            .build()?;

        let defaults = EngineConfig::default();

        let max_hints_per_question = settings
            .get_int("hints.max_per_question")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(defaults.max_hints_per_question);

        let tick_interval_ms = settings
            .get_int("timer.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.tick_interval_ms);

        let persist_async = settings
            .get_bool("persistence.save_async")
            .unwrap_or(defaults.persist_async);

        Ok(EngineConfig {
            max_hints_per_question,
            tick_interval_ms,
            persist_async,
        })
    }
}
