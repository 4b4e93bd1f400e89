use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::{AgentOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_MESSAGES, DEFAULT_MODEL_RETRIES};
use crate::application::dispatch::{
    DEFAULT_UI_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS, agent_target_name,
};
use crate::application::history::DEFAULT_PERSISTENCE_WORKERS;
use crate::application::tooling::BUILTIN_TOOLS;
use crate::model::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_MODEL};

pub const CONFIG_PATH: &str = "config/agents.toml";
pub const ENV_PATH: &str = "config/.env";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_HISTORY_DIR: &str = "history";
const DEFAULT_OUTPUT_DIR: &str = "outputs";

static ENV_LOADER: Once = Once::new();

/// Loads `config/.env` into the process environment, once.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if from_filename(ENV_PATH).is_ok() {
            debug!(path = ENV_PATH, "Loaded environment file");
        }
    });
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
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Io { path, .. } => {
                format!("Could not read configuration file {}.", path.display())
            }
            ConfigError::Parse { path, source } => {
                format!("Configuration file {} is not valid TOML: {source}", path.display())
            }
            ConfigError::Invalid(reason) => format!("Configuration problem: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub identity: String,
    pub description: String,
    /// Names from the built-in tool catalog.
    pub tools: Vec<String>,
    pub output_file: Option<PathBuf>,
}

impl AgentConfig {
    pub fn target_name(&self) -> String {
        agent_target_name(&self.identity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub model: String,
    pub gemini_endpoint: String,
    pub api_key_env: String,
    /// `None` disables conversation snapshots.
    pub history_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub max_depth: Option<usize>,
    pub model_retries: usize,
    pub context_max_messages: usize,
    pub worker_threads: usize,
    pub persistence_workers: usize,
    pub ui_queue_capacity: usize,
    pub system_prompt: Option<String>,
    pub agents: Vec<AgentConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            history_dir: Some(PathBuf::from(DEFAULT_HISTORY_DIR)),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            model_retries: DEFAULT_MODEL_RETRIES,
            context_max_messages: DEFAULT_MAX_MESSAGES,
            worker_threads: DEFAULT_WORKER_THREADS,
            persistence_workers: DEFAULT_PERSISTENCE_WORKERS,
            ui_queue_capacity: DEFAULT_UI_QUEUE_CAPACITY,
            system_prompt: None,
            agents: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    model: Option<String>,
    gemini_endpoint: Option<String>,
    api_key_env: Option<String>,
    history_dir: Option<String>,
    #[serde(default)]
    disable_history: bool,
    output_dir: Option<String>,
    /// `0` means unbounded.
    max_depth: Option<usize>,
    model_retries: Option<usize>,
    context_max_messages: Option<usize>,
    worker_threads: Option<usize>,
    persistence_workers: Option<usize>,
    ui_queue_capacity: Option<usize>,
    system_prompt: Option<String>,
    #[serde(default)]
    agents: Vec<RawAgent>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAgent {
    identity: String,
    description: Option<String>,
    description_file: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    output_file: Option<String>,
}

impl AppConfig {
    /// Reads `path`, or [`CONFIG_PATH`] when none is given. Only a missing
    /// default file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        ensure_env_loaded();
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    /// Looks an agent up by identity or by its dispatch name.
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| {
            agent.identity.eq_ignore_ascii_case(name)
                || agent.target_name().eq_ignore_ascii_case(name)
        })
    }

    pub fn agent_options(&self) -> AgentOptions {
        AgentOptions {
            model: None,
            max_depth: self.max_depth,
            model_retries: self.model_retries,
            max_messages: self.context_max_messages,
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    build_config(parsed, base_dir)
}

fn build_config(raw: RawConfig, base_dir: &Path) -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    let output_dir = raw
        .output_dir
        .map(|dir| PathBuf::from(expand(&dir)))
        .unwrap_or(defaults.output_dir);
    let history_dir = if raw.disable_history {
        None
    } else {
        raw.history_dir
            .map(|dir| PathBuf::from(expand(&dir)))
            .or(defaults.history_dir)
    };

    let mut seen = HashSet::new();
    let mut agents = Vec::with_capacity(raw.agents.len());
    for agent in raw.agents {
        let agent = build_agent(agent, base_dir, &output_dir)?;
        if !seen.insert(agent.target_name().to_lowercase()) {
            return Err(ConfigError::Invalid(format!(
                "agent '{}' is defined more than once",
                agent.identity
            )));
        }
        agents.push(agent);
    }

    let config = AppConfig {
        model: raw.model.unwrap_or(defaults.model),
        gemini_endpoint: raw.gemini_endpoint.unwrap_or(defaults.gemini_endpoint),
        api_key_env: raw.api_key_env.unwrap_or(defaults.api_key_env),
        history_dir,
        output_dir,
        max_depth: match raw.max_depth {
            Some(0) => None,
            Some(depth) => Some(depth),
            None => defaults.max_depth,
        },
        model_retries: raw.model_retries.unwrap_or(defaults.model_retries),
        context_max_messages: raw
            .context_max_messages
            .unwrap_or(defaults.context_max_messages),
        worker_threads: raw.worker_threads.unwrap_or(defaults.worker_threads),
        persistence_workers: raw.persistence_workers.unwrap_or(defaults.persistence_workers),
        ui_queue_capacity: raw.ui_queue_capacity.unwrap_or(defaults.ui_queue_capacity),
        system_prompt: raw.system_prompt.filter(|prompt| !prompt.trim().is_empty()),
        agents,
    };
    validate(&config)?;
    Ok(config)
}

fn build_agent(
    raw: RawAgent,
    base_dir: &Path,
    output_dir: &Path,
) -> Result<AgentConfig, ConfigError> {
    let identity = raw.identity.trim().to_string();
    if identity.is_empty() {
        return Err(ConfigError::Invalid("agent identity cannot be empty".into()));
    }
    let description = match (raw.description, raw.description_file) {
        (Some(text), None) => text,
        (None, Some(file)) => {
            let path = base_dir.join(expand(&file));
            fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?
        }
        (None, None) => String::new(),
        (Some(_), Some(_)) => {
            return Err(ConfigError::Invalid(format!(
                "agent '{identity}' sets both description and description_file"
            )));
        }
    };
    if let Some(unknown) = raw
        .tools
        .iter()
        .find(|tool| !BUILTIN_TOOLS.iter().any(|known| known.eq_ignore_ascii_case(tool)))
    {
        return Err(ConfigError::Invalid(format!(
            "agent '{identity}' uses unknown tool '{unknown}' (available: {})",
            BUILTIN_TOOLS.join(", ")
        )));
    }
    Ok(AgentConfig {
        identity,
        description,
        tools: raw.tools,
        output_file: raw
            .output_file
            .map(|file| output_dir.join(expand(&file))),
    })
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.context_max_messages < 3 {
        return Err(ConfigError::Invalid(
            "context_max_messages must be at least 3".into(),
        ));
    }
    for (name, value) in [
        ("worker_threads", config.worker_threads),
        ("persistence_workers", config.persistence_workers),
        ("ui_queue_capacity", config.ui_queue_capacity),
    ] {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
    }
    Ok(())
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static WORKDIR_GUARD: Mutex<()> = Mutex::new(());

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("agents.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn returns_default_when_missing() {
        let _lock = WORKDIR_GUARD.lock().expect("lock guard");
        let original_dir = env::current_dir().expect("current dir");
        let temp = tempfile::tempdir().expect("tempdir");
        env::set_current_dir(temp.path()).expect("switch to temp dir");

        let config = AppConfig::load(None);
        env::set_current_dir(original_dir).expect("restore current dir");

        assert_eq!(config.expect("load succeeds"), AppConfig::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load(Some(&dir.path().join("nope.toml"))).expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn reads_settings_and_agents() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("crawler.md"), "You crawl the web.").expect("prompt");
        let path = write_config(
            dir.path(),
            r#"
model = "gemini-2.5-pro"
max_depth = 0
model_retries = 1
context_max_messages = 12
worker_threads = 3
system_prompt = "Be brief."
output_dir = "/tmp/unison-out"

[[agents]]
identity = "Web Crawler"
description_file = "crawler.md"
tools = ["current_time"]
output_file = "web_crawler.txt"

[[agents]]
identity = "Code Generator"
description = "Writes code."
"#,
        );

        let config = AppConfig::load(Some(&path)).expect("load config");

        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.max_depth, None);
        assert_eq!(config.model_retries, 1);
        assert_eq!(config.context_max_messages, 12);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.persistence_workers, DEFAULT_PERSISTENCE_WORKERS);
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.agents.len(), 2);

        let crawler = config.agent("web_crawler").expect("lookup by target name");
        assert_eq!(crawler.description, "You crawl the web.");
        assert_eq!(crawler.tools, vec!["current_time"]);
        assert_eq!(
            crawler.output_file.as_deref(),
            Some(Path::new("/tmp/unison-out/web_crawler.txt"))
        );
        assert!(config.agent("Code Generator").expect("by identity").output_file.is_none());

        let options = config.agent_options();
        assert_eq!(options.max_depth, None);
        assert_eq!(options.max_messages, 12);
    }

    #[test]
    fn rejects_unknown_tools_and_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            dir.path(),
            "[[agents]]\nidentity = \"A\"\ntools = [\"teleport\"]\n",
        );
        let err = AppConfig::load(Some(&path)).expect_err("unknown tool");
        assert!(err.to_string().contains("teleport"));

        let path = write_config(
            dir.path(),
            "[[agents]]\nidentity = \"Web Crawler\"\n\n[[agents]]\nidentity = \"web_crawler\"\n",
        );
        let err = AppConfig::load(Some(&path)).expect_err("duplicate");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn disable_history_and_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(dir.path(), "disable_history = true\n");
        assert_eq!(AppConfig::load(Some(&path)).expect("load").history_dir, None);

        let path = write_config(dir.path(), "model = [\n");
        let err = AppConfig::load(Some(&path)).expect_err("bad toml");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.user_message().contains("not valid TOML"));
    }
}
