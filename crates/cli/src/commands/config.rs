use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use milletchain_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let pricing = &config.scoring.pricing;

    // (key path, effective value, env override)
    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("MILLETCHAIN_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("MILLETCHAIN_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("MILLETCHAIN_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("MILLETCHAIN_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("MILLETCHAIN_SERVER_PORT")),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("MILLETCHAIN_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("MILLETCHAIN_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            Some("MILLETCHAIN_LOGGING_FORMAT"),
        ),
        (
            "scoring.history_window",
            pricing.history_window.to_string(),
            Some("MILLETCHAIN_SCORING_HISTORY_WINDOW"),
        ),
        (
            "scoring.default_base_price",
            pricing.default_base_price.to_string(),
            Some("MILLETCHAIN_SCORING_DEFAULT_BASE_PRICE"),
        ),
        ("scoring.default_location_factor", pricing.default_location_factor.to_string(), None),
        ("scoring.seasonal_floor", pricing.seasonal_floor.to_string(), None),
        ("scoring.seasonal_ceiling", pricing.seasonal_ceiling.to_string(), None),
        ("scoring.base_prices", format!("{} millet types", pricing.base_prices.len()), None),
        (
            "scoring.location_factors",
            format!("{} regions", pricing.location_factors.len()),
            None,
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("milletchain.toml"), PathBuf::from("config/milletchain.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    toml::from_str::<Value>(&raw).ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn file_source_is_reported_for_keys_present_in_the_document() {
        let doc = toml::from_str::<Value>("[scoring]\nhistory_window = 5\n").expect("toml");

        assert!(contains_path(&doc, "scoring.history_window"));
        assert!(!contains_path(&doc, "scoring.seasonal_floor"));
        assert_eq!(
            field_source(
                "scoring.history_window",
                None,
                Some(&doc),
                Some(Path::new("milletchain.toml"))
            ),
            "file (milletchain.toml)"
        );
        assert_eq!(field_source("scoring.seasonal_floor", None, Some(&doc), None), "default");
    }
}
