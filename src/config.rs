use crate::query_compiler::{
    CompileEnv, Dialect, LinkTableConfig, OgcGeometrySql, QueryGraph, QueryNode,
};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Format of every configured date
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

lazy_static::lazy_static! {
    /// Plain, unquoted SQL identifier
    pub(crate) static ref SQL_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern");
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// `dt_delete` sentinel of live rows, `%Y-%m-%d %H:%M:%S`
    #[validate(custom(function = validate_max_date))]
    pub max_date: String,

    /// Dialect keyword overrides merged over the built-in table
    pub keywords: HashMap<String, String>,

    /// Generic link table used by `DbLink`/`DbLinkReverse`
    #[validate(nested)]
    pub link_table: Option<LinkTableConfig>,

    /// Acceptable link statuses; empty means no status filter
    pub link_statuses: Vec<String>,

    /// SRID handed to the geometry SQL generator
    #[validate(range(min = 0, message = "Geometry SRID cannot be negative"))]
    pub geometry_srid: Option<i32>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_date: "9999-12-31 23:59:59".to_string(),
            keywords: HashMap::new(),
            link_table: None,
            link_statuses: Vec::new(),
            geometry_srid: None,
        }
    }
}

fn validate_max_date(value: &str) -> Result<(), ValidationError> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("max_date");
            err.message = Some(format!("max_date must match {}", DATE_FORMAT).into());
            err
        })
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation.
    ///
    /// The link table is configured when `REPOQUERY_LINK_TABLE` is set;
    /// its schema defaults to `core`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let link_table = match env::var("REPOQUERY_LINK_TABLE") {
            Ok(table) => Some(LinkTableConfig::new(
                env::var("REPOQUERY_LINK_SCHEMA").unwrap_or_else(|_| "core".to_string()),
                table,
            )),
            Err(env::VarError::NotPresent) => None,
            Err(e) => return Err(e.into()),
        };

        let config = Self {
            max_date: env::var("REPOQUERY_MAX_DATE")
                .unwrap_or_else(|_| "9999-12-31 23:59:59".to_string()),
            keywords: HashMap::new(),
            link_table,
            link_statuses: env::var("REPOQUERY_LINK_STATUSES")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            geometry_srid: parse_optional_env_var("REPOQUERY_GEOMETRY_SRID")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn parsed_max_date(&self) -> Result<NaiveDateTime, ConfigError> {
        NaiveDateTime::parse_from_str(&self.max_date, DATE_FORMAT).map_err(|e| {
            ConfigError::Parse {
                field: "max_date".to_string(),
                value: self.max_date.clone(),
                source: Box::new(e),
            }
        })
    }

    /// Immutable compile environment shared by every graph
    pub fn build_env(&self) -> Result<CompileEnv, ConfigError> {
        self.validate()?;
        Ok(CompileEnv::new(
            Dialect::with_overrides(self.keywords.clone()),
            self.parsed_max_date()?,
            Arc::new(OgcGeometrySql::new(self.geometry_srid)),
        ))
    }

    /// Empty forward graph carrying the configured link table and statuses
    pub fn forward_graph(&self, env: Arc<CompileEnv>) -> QueryGraph {
        self.apply_link_settings(QueryGraph::forward(env))
    }

    /// Reverse graph rooted at `root`, carrying the configured link settings
    pub fn reverse_graph(&self, env: Arc<CompileEnv>, root: QueryNode) -> QueryGraph {
        self.apply_link_settings(QueryGraph::reverse(env, root))
    }

    fn apply_link_settings(&self, mut graph: QueryGraph) -> QueryGraph {
        graph.set_link_table(self.link_table.clone());
        graph.set_link_statuses(self.link_statuses.clone());
        graph
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an environment variable that may be absent
fn parse_optional_env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e| ConfigError::Parse {
            field: key.to_string(),
            value,
            source: Box::new(e),
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
