// --- File: crates/slotsync_config/src/lib.rs ---
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use std::path::Path;
use tracing::debug;

pub mod env_vars;
pub mod models;

pub use models::*;

/// Directory holding `default.*` and `{RUN_ENV}.*` files when `CONFIG_DIR` is unset.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Loads the layered application configuration.
///
/// Sources, later ones winning:
/// 1. `{CONFIG_DIR}/default.*`
/// 2. `{CONFIG_DIR}/{RUN_ENV}.*` (RUN_ENV defaults to `debug`)
/// 3. environment variables `SLOTSYNC__SECTION__KEY`
///
/// Secrets are never read here, see [`env_vars`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();
    let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    load_config_from(Path::new(&config_dir))
}

/// Same as [`load_config`] but with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env_vars::get_config_prefix();

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);
    debug!(
        "Loading config from {} and {} (prefix {})",
        default_path.display(),
        env_path.display(),
        prefix
    );

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(
            Environment::with_prefix(&prefix)
                .prefix_separator(env_vars::CONFIG_SEPARATOR)
                .separator(env_vars::CONFIG_SEPARATOR)
                .try_parsing(true),
        );

    let app_config: AppConfig = builder.build()?.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Loads the dotenv file into the process environment exactly once.
///
/// The path is taken from `DOTENV_OVERRIDE`, else from a first CLI argument
/// starting with `.env`, else `.env`. Returns the path that was used.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_defaults_from_directory() {
        let dir = env::temp_dir().join(format!("slotsync-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            r#"
use_provider = true

[server]
host = "127.0.0.1"
port = 8086

[provider]
api_base_url = "https://api.calendly.com"
"#,
        )
        .unwrap();

        let cfg = load_config_from(&dir).unwrap();
        assert_eq!(cfg.server.port, 8086);
        let provider = cfg.provider.expect("provider section");
        assert_eq!(provider.max_window_days, 7);
        assert_eq!(provider.request_timeout_secs, 5);
        assert_eq!(cfg.booking.completion_grace_hours, 24);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_provider_section_is_rejected_when_enabled() {
        let dir = env::temp_dir().join(format!("slotsync-config-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            "use_provider = true\n[server]\nhost = \"0.0.0.0\"\nport = 1\n",
        )
        .unwrap();

        assert!(load_config_from(&dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
