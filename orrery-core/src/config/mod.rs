use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/orrery.toml";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_CLEANUP_MARKER: &str = "assistant";
const API_KEY_ENV: &str = "ORRERY_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub tools: ToolServerConfig,
    /// Role marker stripped from conversational responses.
    pub cleanup_marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub backend: BackendKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolServerConfig {
    Disabled,
    Http {
        endpoint: String,
    },
    Stdio {
        command: String,
        args: Vec<String>,
        workdir: Option<String>,
        env: HashMap<String, String>,
    },
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
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    marker: Option<String>,
    #[serde(default)]
    generation: RawGeneration,
    tools: Option<RawTools>,
}

#[derive(Debug, Deserialize, Default)]
struct RawGeneration {
    backend: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTools {
    transport: String,
    endpoint: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    workdir: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

impl AppConfig {
    /// Loads configuration. An explicit path that cannot be read is an
    /// error; a missing file at the default path yields the defaults.
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
            generation: GenerationConfig {
                backend: BackendKind::Ollama,
                endpoint: DEFAULT_ENDPOINT.to_string(),
                model: DEFAULT_MODEL.to_string(),
                api_key: None,
            },
            tools: ToolServerConfig::Disabled,
            cleanup_marker: DEFAULT_CLEANUP_MARKER.to_string(),
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
    validate(parsed)
}

fn validate(raw: RawConfig) -> Result<AppConfig, ConfigError> {
    let backend = match raw.generation.backend.as_deref() {
        None | Some("ollama") => BackendKind::Ollama,
        Some("openai") => BackendKind::OpenAi,
        Some(other) => {
            return Err(ConfigError::invalid(format!(
                "unknown generation backend '{other}' (expected 'ollama' or 'openai')"
            )));
        }
    };

    let api_key = raw
        .generation
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()));

    let tools = match raw.tools {
        None => ToolServerConfig::Disabled,
        Some(tools) => match tools.transport.as_str() {
            "http" => {
                let endpoint = tools
                    .endpoint
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::invalid("http tool transport requires an endpoint")
                    })?;
                ToolServerConfig::Http { endpoint }
            }
            "stdio" => {
                let command = tools
                    .command
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::invalid("stdio tool transport requires a command")
                    })?;
                ToolServerConfig::Stdio {
                    command,
                    args: tools.args,
                    workdir: tools.workdir,
                    env: tools.env,
                }
            }
            other => {
                return Err(ConfigError::invalid(format!(
                    "unknown tool transport '{other}' (expected 'http' or 'stdio')"
                )));
            }
        },
    };

    Ok(AppConfig {
        generation: GenerationConfig {
            backend,
            endpoint: raw
                .generation
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: raw
                .generation
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
        },
        tools,
        cleanup_marker: raw
            .marker
            .unwrap_or_else(|| DEFAULT_CLEANUP_MARKER.to_string()),
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

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("orrery.toml");
        let mut file = File::create(&path).expect("create config file");
        file.write_all(content.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn returns_defaults_when_default_path_missing() {
        let _lock = WORKDIR_GUARD.lock().expect("lock guard");
        let original_dir = env::current_dir().expect("current dir");
        let temp = tempfile::tempdir().expect("tempdir");
        env::set_current_dir(temp.path()).expect("switch to temp dir");

        let config = AppConfig::load(None).expect("load succeeds");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.tools, ToolServerConfig::Disabled);
        assert_eq!(config.cleanup_marker, DEFAULT_CLEANUP_MARKER);

        env::set_current_dir(original_dir).expect("restore current dir");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn parses_full_http_configuration() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            temp.path(),
            r#"
marker = "antwort"

[generation]
backend = "openai"
endpoint = "https://api.example.com"
model = "gpt-4o-mini"
api_key = "sk-test"

[tools]
transport = "http"
endpoint = "http://127.0.0.1:8081/rpc"
"#,
        );

        let config = AppConfig::load(Some(&path)).expect("load succeeds");
        assert_eq!(config.generation.backend, BackendKind::OpenAi);
        assert_eq!(config.generation.endpoint, "https://api.example.com");
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.cleanup_marker, "antwort");
        assert_eq!(
            config.tools,
            ToolServerConfig::Http {
                endpoint: "http://127.0.0.1:8081/rpc".to_string()
            }
        );
    }

    #[test]
    fn parses_stdio_transport() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            temp.path(),
            r#"
[tools]
transport = "stdio"
command = "uvx"
args = ["my-tool-server"]
"#,
        );

        let config = AppConfig::load(Some(&path)).expect("load succeeds");
        match config.tools {
            ToolServerConfig::Stdio { command, args, .. } => {
                assert_eq!(command, "uvx");
                assert_eq!(args, vec!["my-tool-server".to_string()]);
            }
            other => panic!("unexpected transport: {other:?}"),
        }
        // Generation section falls back to defaults.
        assert_eq!(config.generation.backend, BackendKind::Ollama);
        assert_eq!(config.generation.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn rejects_unknown_backend() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_config(temp.path(), "[generation]\nbackend = \"bedrock\"\n");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_http_transport_without_endpoint() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_config(temp.path(), "[tools]\ntransport = \"http\"\n");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_config(temp.path(), "marker = [unclosed\n");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
