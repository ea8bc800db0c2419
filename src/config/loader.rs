//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{Environment, StarloadConfig};
use super::secret::secret_string;
use crate::domain::errors::StarloadError;
use crate::domain::result::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into StarloadConfig
/// 4. Applies environment variable overrides (STARLOAD_* prefix)
/// 5. Validates the configuration
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns [`StarloadError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, the TOML is malformed, an
/// override does not parse, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use starload::config::loader::load_config;
///
/// let config = load_config("starload.toml").expect("Failed to load config");
/// println!("{} dimensions", config.dimensions.len());
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<StarloadConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(StarloadError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StarloadError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut config = parse_config(&contents)?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        StarloadError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Parses TOML text after `${VAR}` substitution, without overrides or validation
pub fn parse_config(contents: &str) -> Result<StarloadConfig> {
    let contents = substitute_env_vars(contents)?;
    toml::from_str(&contents)
        .map_err(|e| StarloadError::Configuration(format!("Failed to parse TOML: {e}")))
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched. Every missing variable is reported in
/// a single error.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| StarloadError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |caps: &regex::Captures<'_>| {
                let var_name = &caps[1];
                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => {
                        if !missing_vars.iter().any(|v| v == var_name) {
                            missing_vars.push(var_name.to_string());
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(StarloadError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_override<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        StarloadError::Configuration(format!("Invalid value '{value}' for {name}: {e}"))
    })
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => parse_override(name, &value).map(Some),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using the STARLOAD_* prefix
///
/// Variables follow the pattern STARLOAD_<SECTION>_<KEY>, for example
/// STARLOAD_LOAD_STRICT or STARLOAD_WAREHOUSE_POSTGRESQL_CONNECTION_STRING.
fn apply_env_overrides(config: &mut StarloadConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("STARLOAD_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(dry_run) = env_override::<bool>("STARLOAD_APPLICATION_DRY_RUN")? {
        config.application.dry_run = dry_run;
    }
    if let Ok(val) = std::env::var("STARLOAD_ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(StarloadError::Configuration(format!(
                    "Invalid value '{other}' for STARLOAD_ENVIRONMENT"
                )))
            }
        };
    }

    // Load overrides
    if let Some(resolution) = env_override("STARLOAD_LOAD_RESOLUTION")? {
        config.load.resolution = resolution;
    }
    if let Some(strict) = env_override::<bool>("STARLOAD_LOAD_STRICT")? {
        config.load.strict = strict;
    }
    if let Some(date) = env_override::<NaiveDate>("STARLOAD_LOAD_AS_OF_DATE")? {
        config.load.as_of_date = Some(date);
    }

    // Measure overrides
    if let Some(ratio) = env_override::<f64>("STARLOAD_MEASURES_COST_RATIO")? {
        config.measures.cost_ratio = ratio;
    }
    if let Some(ratio) = env_override::<f64>("STARLOAD_MEASURES_MARGIN_RATIO")? {
        config.measures.margin_ratio = ratio;
    }

    // Calendar overrides
    if let Some(date) = env_override::<NaiveDate>("STARLOAD_CALENDAR_START_DATE")? {
        config.calendar.start_date = Some(date);
    }
    if let Some(date) = env_override::<NaiveDate>("STARLOAD_CALENDAR_END_DATE")? {
        config.calendar.end_date = Some(date);
    }

    // Source overrides
    if let Ok(val) = std::env::var("STARLOAD_SOURCE_JSON_DIRECTORY") {
        if let Some(ref mut json) = config.source.json {
            json.directory = val;
        }
    }
    if let Ok(val) = std::env::var("STARLOAD_SOURCE_POSTGRESQL_CONNECTION_STRING") {
        if let Some(ref mut pg) = config.source.postgresql {
            pg.connection_string = secret_string(val);
        }
    }

    // Warehouse overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.warehouse.postgresql {
        if let Ok(val) = std::env::var("STARLOAD_WAREHOUSE_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(max) = env_override("STARLOAD_WAREHOUSE_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = max;
        }
        if let Some(key) = env_override::<i64>("STARLOAD_WAREHOUSE_POSTGRESQL_ADVISORY_LOCK_KEY")? {
            pg.advisory_lock_key = Some(key);
        }
    }

    // Logging overrides
    if let Some(enabled) = env_override::<bool>("STARLOAD_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("STARLOAD_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("STARLOAD_UNIT_SUBST_VAR", "test_value");
        let input = "connection_string = \"${STARLOAD_UNIT_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "connection_string = \"test_value\"");
        std::env::remove_var("STARLOAD_UNIT_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("STARLOAD_UNIT_MISSING_VAR");
        let input = "password = \"${STARLOAD_UNIT_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("STARLOAD_UNIT_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("STARLOAD_UNIT_COMMENTED_VAR");
        let input = "# password = \"${STARLOAD_UNIT_COMMENTED_VAR}\"\nkey = 1";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${STARLOAD_UNIT_COMMENTED_VAR}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("nonexistent.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_parse_override_reports_variable() {
        let err = parse_override::<bool>("STARLOAD_LOAD_STRICT", "maybe").unwrap_err();
        assert!(err.to_string().contains("STARLOAD_LOAD_STRICT"));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[source]
kind = "json"

[source.json]
directory = "./staging"

[warehouse]
target = "memory"

[logging]
local_enabled = false

[[dimensions]]
name = "customer"
table = "dim_customer"
tracked_attributes = ["name"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.dimensions[0].name, "customer");
        assert_eq!(config.measures.cost_ratio, 0.6);
    }
}
