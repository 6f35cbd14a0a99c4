use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default)]
    pub watchdog: WatchdogOptions,
    pub applications: Vec<ApplicationConfig>,
}

/// Watchdog-wide options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogOptions {
    /// Interval between polling passes over all applications
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Default probe timeout, overridable per application
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// How long to wait for a process to exit before force killing it
    #[serde(default = "default_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WatchdogOptions {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            stop_timeout: default_stop_timeout(),
            log_level: default_log_level(),
        }
    }
}

/// One monitored application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Probe target host
    #[serde(default = "default_host")]
    pub host: String,

    /// Probe target port; defaults depend on the recipe type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Per-application probe timeout override
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_duration_serde"
    )]
    pub probe_timeout: Option<Duration>,

    pub recipe: LaunchRecipe,
}

impl ApplicationConfig {
    /// Effective probe port (explicit port, or the recipe-specific default).
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.recipe.default_port())
    }

    /// URL probed on every polling pass.
    pub fn probe_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port())
    }
}

/// How to launch an application's process.
///
/// The two recipe kinds are variants of one tagged value: a single generic
/// application type consumes either, so there is no per-type lifecycle code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchRecipe {
    /// Run a development-server command inside a project directory
    /// (for example `npm run dev`).
    DevServer {
        project_directory: PathBuf,
        #[serde(default = "default_dev_server_command")]
        command: String,
        #[serde(default = "default_dev_server_args")]
        args: Vec<String>,
    },

    /// Run an interpreter with a module invocation inside a server
    /// directory, bound to the configured host and port
    /// (for example `python3 -m http.server --bind 127.0.0.1 9001`).
    Interpreter {
        server_directory: PathBuf,
        interpreter: String,
        #[serde(default = "default_interpreter_module")]
        module: String,
    },
}

impl LaunchRecipe {
    pub fn default_port(&self) -> u16 {
        match self {
            LaunchRecipe::DevServer { .. } => 3000,
            LaunchRecipe::Interpreter { .. } => 9001,
        }
    }

    pub fn working_directory(&self) -> &Path {
        match self {
            LaunchRecipe::DevServer {
                project_directory, ..
            } => project_directory,
            LaunchRecipe::Interpreter {
                server_directory, ..
            } => server_directory,
        }
    }

    /// Resolve the recipe into the concrete command to spawn. Done once at
    /// application construction.
    pub fn resolve(&self, host: &str, port: u16) -> ResolvedCommand {
        match self {
            LaunchRecipe::DevServer {
                project_directory,
                command,
                args,
            } => ResolvedCommand {
                program: command.clone(),
                args: args.clone(),
                working_directory: project_directory.clone(),
            },
            LaunchRecipe::Interpreter {
                server_directory,
                interpreter,
                module,
            } => ResolvedCommand {
                program: interpreter.clone(),
                args: vec![
                    "-m".to_string(),
                    module.clone(),
                    "--bind".to_string(),
                    host.to_string(),
                    port.to_string(),
                ],
                working_directory: server_directory.clone(),
            },
        }
    }
}

/// A launch recipe resolved against a host/port pair.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
}

impl WatchdogConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: WatchdogConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Get enabled applications only
    pub fn enabled_applications(&self) -> Vec<&ApplicationConfig> {
        self.applications.iter().filter(|a| a.enabled).collect()
    }
}

// Default value functions
fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_dev_server_command() -> String {
    "npm".to_string()
}

fn default_dev_server_args() -> Vec<String> {
    vec!["run".to_string(), "dev".to_string()]
}

fn default_interpreter_module() -> String {
    "http.server".to_string()
}

// Custom serialization for Duration ("30s", "500ms", "2m")
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        // "ms" must be checked before "s" since it also ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            let millis: u64 = num
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num) = s.strip_suffix('s') {
            let secs: u64 = num
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

// Custom serialization for Option<Duration>
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&format!("{}s", d.as_secs())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| super::duration_serde::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
watchdog:
  poll_interval: 10s
  probe_timeout: 2s
  stop_timeout: 3s
  log_level: debug
applications:
  - name: node-dev-server
    host: 127.0.0.1
    port: 3000
    probe_timeout: 8s
    recipe:
      type: dev_server
      project_directory: /srv/webapp
      command: npm
      args: ["run", "dev"]
  - name: python-http-server
    recipe:
      type: interpreter
      server_directory: /srv/files
      interpreter: python3
"#;

    #[test]
    fn test_load_full_config() {
        let config = WatchdogConfig::load_from_string(FULL_CONFIG).unwrap();

        assert_eq!(config.watchdog.poll_interval, Duration::from_secs(10));
        assert_eq!(config.watchdog.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.applications.len(), 2);

        let node = &config.applications[0];
        assert_eq!(node.probe_url(), "http://127.0.0.1:3000/");
        assert_eq!(node.probe_timeout, Some(Duration::from_secs(8)));
        assert!(matches!(node.recipe, LaunchRecipe::DevServer { .. }));
    }

    #[test]
    fn test_defaults_applied() {
        let config = WatchdogConfig::load_from_string(FULL_CONFIG).unwrap();
        let python = &config.applications[1];

        assert!(python.enabled);
        assert_eq!(python.host, "127.0.0.1");
        assert_eq!(python.port(), 9001);
        assert_eq!(python.probe_url(), "http://127.0.0.1:9001/");
        assert_eq!(python.probe_timeout, None);

        let command = python.recipe.resolve(&python.host, python.port());
        assert_eq!(command.program, "python3");
        assert_eq!(
            command.args,
            vec!["-m", "http.server", "--bind", "127.0.0.1", "9001"]
        );
        assert_eq!(
            command.working_directory,
            PathBuf::from("/srv/files")
        );
    }

    #[test]
    fn test_dev_server_recipe_resolution() {
        let config = WatchdogConfig::load_from_string(FULL_CONFIG).unwrap();
        let node = &config.applications[0];

        let command = node.recipe.resolve(&node.host, node.port());
        assert_eq!(command.program, "npm");
        assert_eq!(command.args, vec!["run", "dev"]);
        assert_eq!(command.working_directory, PathBuf::from("/srv/webapp"));
    }

    #[test]
    fn test_missing_working_directory_fails_fast() {
        let yaml = r#"
applications:
  - name: broken
    recipe:
      type: interpreter
      interpreter: python3
"#;
        let result = WatchdogConfig::load_from_string(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_enabled_applications_filter() {
        let yaml = r#"
applications:
  - name: active
    recipe:
      type: interpreter
      server_directory: /srv/a
      interpreter: python3
  - name: inactive
    enabled: false
    recipe:
      type: interpreter
      server_directory: /srv/b
      interpreter: python3
"#;
        let config = WatchdogConfig::load_from_string(yaml).unwrap();
        let enabled = config.enabled_applications();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "active");
    }

    #[test]
    fn test_duration_parsing() {
        use super::duration_serde::parse_duration;

        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("abc").is_err());
    }
}
