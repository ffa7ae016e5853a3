//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `wordemb.toml` + `wordemb.<env>.toml` + `WORDEMB_*`
//! env vars (`__` separates nested keys, e.g. `WORDEMB_WORD_EMB__DIM=100`).
//! Provides helpers to expand `~` and `${VAR}` in model and cache paths.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::env;
use std::path::{Path, PathBuf};

/// Key of the table handed to the embedder factory.
pub const WORD_EMB_KEY: &str = "word_emb";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration files from `dir` instead of the working directory.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("wordemb.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("wordemb.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("wordemb.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("wordemb.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("WORDEMB_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.figment.find_value(key).is_ok()
    }

    /// The `word_emb` table as a JSON object, ready for the registry.
    pub fn embedder_config(&self) -> anyhow::Result<serde_json::Value> {
        let value: serde_json::Value = self.get(WORD_EMB_KEY)?;
        match value.get("name") {
            Some(serde_json::Value::String(_)) => Ok(value),
            _ => Err(anyhow::anyhow!("'{}.name' must name an embedder variant", WORD_EMB_KEY)),
        }
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                // Production runs must say which embedder they load.
                self.embedder_config()?;
            }
            _ => {
                if self.contains(WORD_EMB_KEY) {
                    self.embedder_config()?;
                }
            }
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
