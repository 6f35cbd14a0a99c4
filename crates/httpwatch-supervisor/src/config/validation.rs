use super::*;
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::time::Duration;

const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Validate the complete configuration
pub fn validate_config(config: &WatchdogConfig) -> Result<()> {
    validate_watchdog_options(&config.watchdog)?;
    validate_application_configs(&config.applications, &config.watchdog)?;
    Ok(())
}

/// Validate watchdog-wide options
fn validate_watchdog_options(options: &WatchdogOptions) -> Result<()> {
    if options.poll_interval == Duration::ZERO {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    if options.stop_timeout == Duration::ZERO {
        return Err(anyhow!("Stop timeout must be greater than 0"));
    }

    validate_probe_timeout(options.probe_timeout, options.poll_interval)?;

    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

/// Validate all application configurations
fn validate_application_configs(
    applications: &[ApplicationConfig],
    options: &WatchdogOptions,
) -> Result<()> {
    if applications.is_empty() {
        return Err(anyhow!("At least one application must be configured"));
    }

    let mut names = HashSet::new();
    for application in applications {
        if !names.insert(&application.name) {
            return Err(anyhow!("Duplicate application name: {}", application.name));
        }

        validate_application_config(application, options)?;
    }

    Ok(())
}

/// Validate a single application configuration
fn validate_application_config(
    application: &ApplicationConfig,
    options: &WatchdogOptions,
) -> Result<()> {
    if application.name.is_empty() {
        return Err(anyhow!("Application name cannot be empty"));
    }

    if application.name.len() > 64 {
        return Err(anyhow!(
            "Application name too long (max 64 characters): {}",
            application.name
        ));
    }

    if !application
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "Application name can only contain alphanumeric characters, hyphens, and underscores: {}",
            application.name
        ));
    }

    if application.host.is_empty() {
        return Err(anyhow!("Host cannot be empty for {}", application.name));
    }

    if application.port() == 0 {
        return Err(anyhow!(
            "Port must be between 1 and 65535 for {}",
            application.name
        ));
    }

    if let Some(probe_timeout) = application.probe_timeout {
        validate_probe_timeout(probe_timeout, options.poll_interval)
            .map_err(|e| anyhow!("{} for {}", e, application.name))?;
    }

    validate_launch_recipe(&application.recipe, &application.name)?;

    Ok(())
}

/// Validate a launch recipe
fn validate_launch_recipe(recipe: &LaunchRecipe, name: &str) -> Result<()> {
    if recipe.working_directory().as_os_str().is_empty() {
        return Err(anyhow!("Working directory cannot be empty for {}", name));
    }

    match recipe {
        LaunchRecipe::DevServer { command, .. } => {
            if command.is_empty() {
                return Err(anyhow!("Dev server command cannot be empty for {}", name));
            }
        }
        LaunchRecipe::Interpreter {
            interpreter,
            module,
            ..
        } => {
            if interpreter.is_empty() {
                return Err(anyhow!("Interpreter cannot be empty for {}", name));
            }
            if module.is_empty() {
                return Err(anyhow!("Interpreter module cannot be empty for {}", name));
            }
        }
    }

    Ok(())
}

/// A probe must finish well inside one polling pass.
fn validate_probe_timeout(probe_timeout: Duration, poll_interval: Duration) -> Result<()> {
    if probe_timeout < MIN_PROBE_TIMEOUT || probe_timeout > MAX_PROBE_TIMEOUT {
        return Err(anyhow!(
            "Probe timeout must be between {:?} and {:?}, got: {:?}",
            MIN_PROBE_TIMEOUT,
            MAX_PROBE_TIMEOUT,
            probe_timeout
        ));
    }

    if probe_timeout >= poll_interval {
        return Err(anyhow!(
            "Probe timeout ({:?}) must be less than the poll interval ({:?})",
            probe_timeout,
            poll_interval
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchdogConfig;

    fn base_yaml(applications: &str) -> String {
        format!("applications:\n{}", applications)
    }

    const PYTHON_APP: &str = r#"
  - name: python-http-server
    recipe:
      type: interpreter
      server_directory: /srv/files
      interpreter: python3
"#;

    #[test]
    fn test_valid_config_passes() {
        let config = WatchdogConfig::load_from_string(&base_yaml(PYTHON_APP)).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_applications_fails() {
        let result = WatchdogConfig::load_from_string("applications: []");
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_names_fail() {
        let yaml = base_yaml(&format!("{}{}", PYTHON_APP, PYTHON_APP));
        let result = WatchdogConfig::load_from_string(&yaml);
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_invalid_name_fails() {
        let yaml = base_yaml(
            r#"
  - name: "bad name!"
    recipe:
      type: interpreter
      server_directory: /srv/files
      interpreter: python3
"#,
        );
        assert!(WatchdogConfig::load_from_string(&yaml).is_err());
    }

    #[test]
    fn test_zero_port_fails() {
        let yaml = base_yaml(
            r#"
  - name: python-http-server
    port: 0
    recipe:
      type: interpreter
      server_directory: /srv/files
      interpreter: python3
"#,
        );
        assert!(WatchdogConfig::load_from_string(&yaml).is_err());
    }

    #[test]
    fn test_empty_interpreter_fails() {
        let yaml = base_yaml(
            r#"
  - name: python-http-server
    recipe:
      type: interpreter
      server_directory: /srv/files
      interpreter: ""
"#,
        );
        assert!(WatchdogConfig::load_from_string(&yaml).is_err());
    }

    #[test]
    fn test_probe_timeout_out_of_range_fails() {
        let yaml = format!(
            "watchdog:\n  probe_timeout: 30s\n{}",
            base_yaml(PYTHON_APP)
        );
        let result = WatchdogConfig::load_from_string(&yaml);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Probe timeout"));
    }

    #[test]
    fn test_probe_timeout_must_be_under_poll_interval() {
        let yaml = format!(
            "watchdog:\n  poll_interval: 4s\n  probe_timeout: 5s\n{}",
            base_yaml(PYTHON_APP)
        );
        assert!(WatchdogConfig::load_from_string(&yaml).is_err());
    }

    #[test]
    fn test_invalid_log_level_fails() {
        let yaml = format!(
            "watchdog:\n  log_level: verbose\n{}",
            base_yaml(PYTHON_APP)
        );
        assert!(WatchdogConfig::load_from_string(&yaml).is_err());
    }
}
