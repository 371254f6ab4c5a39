use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_CONFIG_PATH: &str = "config/issuedesk.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub endpoint: String,
    pub system_prompt: Option<String>,
    pub max_tool_steps: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    endpoint: Option<String>,
    system_prompt: Option<String>,
    max_tool_steps: Option<usize>,
}

impl AppConfig {
    /// Explicit paths must exist; the default path falls back to built-in
    /// defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            system_prompt: None,
            max_tool_steps: None,
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        endpoint: parsed
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        system_prompt: parsed.system_prompt,
        max_tool_steps: parsed.max_tool_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;

    static WORKDIR_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn returns_default_when_missing() {
        let _lock = WORKDIR_GUARD.lock().expect("lock guard");
        let original_dir = env::current_dir().expect("current dir");
        let temp = tempfile::tempdir().expect("tempdir");
        env::set_current_dir(temp.path()).expect("switch to temp dir");

        let config = AppConfig::load(None).expect("load succeeds");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.system_prompt.is_none());
        assert!(config.max_tool_steps.is_none());

        env::set_current_dir(original_dir).expect("restore current dir");
    }

    #[test]
    fn reads_model_endpoint_and_system_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("issuedesk.toml");
        let mut file = File::create(&path).expect("create config");
        writeln!(
            file,
            r#"
model = "gpt-4o-mini"
endpoint = "http://localhost:8000"
system_prompt = "answer briefly"
"#
        )
        .expect("write");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.endpoint, "http://localhost:8000");
        assert_eq!(config.system_prompt.as_deref(), Some("answer briefly"));
    }

    #[test]
    fn falls_back_to_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("issuedesk.toml");
        fs::write(&path, "system_prompt = \"only system\"").expect("write");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.system_prompt.as_deref(), Some("only system"));
    }

    #[test]
    fn reads_tool_step_budget() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("issuedesk.toml");
        fs::write(&path, "max_tool_steps = 3").expect("write");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.max_tool_steps, Some(3));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.toml");

        let err = AppConfig::load(Some(&path)).expect_err("missing explicit path fails");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
