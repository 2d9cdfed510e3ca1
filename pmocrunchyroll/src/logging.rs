//! Initialisation des logs à partir de la configuration

use pmoconfig::Config;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Niveau de filtre correspondant à `host.logger.min_level`
///
/// Les niveaux inconnus retombent sur `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Installe le subscriber global
///
/// `RUST_LOG` est prioritaire sur le niveau configuré ; la sortie console
/// suit `host.logger.enable_console`. Retourne `false` si un subscriber
/// était déjà installé (l'appel est alors sans effet).
pub fn init_logging(config: &Config) -> bool {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&level)));

    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let subscriber = Registry::default().with(filter);
    let result = if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    result.is_ok()
}
