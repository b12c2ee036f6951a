// src/config.rs - Harness configuration: defaults, settings file and environment overrides

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::connector::{BackendKind, TransportKind};
use crate::error::{HarnessError, Result};

/// Environment variable prefix for overrides, e.g. `SEEDCHECK_HARNESS__MAX_CONCURRENCY`
pub const ENV_PREFIX: &str = "SEEDCHECK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Maximum number of backend runs executing at once
    pub max_concurrency: usize,
    /// Timeout applied to each network step (connect, namespace, write, page fetch)
    pub step_timeout_seconds: u64,
    /// Default page size for paged enumeration
    pub page_size: usize,
    /// How long received queue messages stay hidden during enumeration
    pub visibility_timeout_seconds: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            step_timeout_seconds: 30,
            page_size: 100,
            visibility_timeout_seconds: 30,
        }
    }
}

/// Whether a backend is seeded before verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    SeedAndVerify,
    /// Data is landed by an external pipeline; only read back and verify
    VerifyOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::SeedAndVerify => "seed_and_verify",
            RunMode::VerifyOnly => "verify_only",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    /// Backend kind: blob, data_lake, key_value, cosmos_sql, mongo, cassandra, gremlin, queue, table
    pub kind: String,
    /// Transport: "live" (default) or "memory"
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: RunMode,
    /// Backend-specific settings; a flat string to string mapping
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

fn default_transport() -> String {
    "live".to_string()
}

fn default_enabled() -> bool {
    true
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind: kind.as_str().to_string(),
            transport: default_transport(),
            enabled: true,
            mode: RunMode::SeedAndVerify,
            settings: HashMap::new(),
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport.as_str().to_string();
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<String>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> Result<BackendKind> {
        BackendKind::from_str(&self.kind)
    }

    pub fn transport(&self) -> Result<TransportKind> {
        TransportKind::from_str(&self.transport)
    }

    /// A setting's value, treating blank values as absent
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn setting_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.setting(key).unwrap_or(default)
    }

    /// A required setting; missing or empty values are an invalid-config connect failure
    pub fn require(&self, key: &str) -> Result<&str> {
        self.setting(key).ok_or_else(|| {
            HarnessError::invalid_config(format!(
                "backend '{}' is missing required setting '{}'",
                self.name, key
            ))
        })
    }

    /// Check every key at once so the error lists all missing settings
    pub fn require_all(&self, keys: &[&str]) -> Result<()> {
        let missing = self.missing_settings(keys);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::invalid_config(format!(
                "backend '{}' is missing required settings: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    pub fn missing_settings<'k>(&self, keys: &[&'k str]) -> Vec<&'k str> {
        keys.iter()
            .copied()
            .filter(|key| self.setting(key).is_none())
            .collect()
    }

    pub fn parse_setting<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.setting(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                HarnessError::invalid_config(format!(
                    "backend '{}' setting '{}' has invalid value '{}': {}",
                    self.name, key, raw, e
                ))
            }),
        }
    }
}

/// Detailed validation result with specific error information
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub error_type: String,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub recommendation: Option<String>,
}

impl Config {
    /// Load configuration: defaults, then the optional settings file, then
    /// `SEEDCHECK_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let start_time = std::time::Instant::now();
        debug!("🔧 Loading configuration (file: {:?})", path);

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| HarnessError::Config(format!("failed to load configuration: {}", e)))?;

        info!(
            "✅ Configuration loaded in {:.3}s ({} backends, max concurrency {})",
            start_time.elapsed().as_secs_f64(),
            config.backends.len(),
            config.harness.max_concurrency
        );

        Ok(config)
    }

    /// One preset per supported backend, ten in all, pointing at
    /// placeholder endpoints. Useful as a template and for `--simulate` runs.
    pub fn sample() -> Self {
        let backends = vec![
            BackendConfig::new("blob-storage", BackendKind::Blob)
                .with_setting("connection_string", "UseDevelopmentStorage=true")
                .with_setting("container_name", "seedcheck-samples"),
            BackendConfig::new("cache-for-redis", BackendKind::KeyValue)
                .with_setting("connection_string", "localhost:6379")
                .with_setting("key_prefix", "seedcheck"),
            BackendConfig::new("cosmos-core-sql", BackendKind::CosmosSql)
                .with_setting("endpoint_uri", "https://localhost:8081/")
                .with_setting("primary_key", "<primary-key>")
                .with_setting("database_name", "seedcheck")
                .with_setting("container_name", "people"),
            BackendConfig::new("cosmos-mongo", BackendKind::Mongo)
                .with_setting("connection_string", "mongodb://localhost:27017")
                .with_setting("database_name", "seedcheck")
                .with_setting("collection_name", "people"),
            BackendConfig::new("cosmos-cassandra", BackendKind::Cassandra)
                .with_setting("contact_point", "localhost")
                .with_setting("port", "10350")
                .with_setting("username", "<username>")
                .with_setting("password", "<password>")
                .with_setting("keyspace", "seedcheck")
                .with_setting("table_name", "people"),
            BackendConfig::new("cosmos-gremlin", BackendKind::Gremlin)
                .with_setting("hostname", "localhost")
                .with_setting("primary_key", "<primary-key>")
                .with_setting("database_name", "seedcheck")
                .with_setting("graph_name", "GraphCollection"),
            BackendConfig::new("data-lake", BackendKind::DataLake)
                .with_setting("account_name", "devstoreaccount1")
                .with_setting("account_key", "<account-key>")
                .with_setting("filesystem_name", "seedcheck")
                .with_setting("directory_name", "people"),
            BackendConfig::new("queue-storage", BackendKind::Queue)
                .with_setting("connection_string", "UseDevelopmentStorage=true")
                .with_setting("queue_name", "seedcheck-people"),
            BackendConfig::new("table-storage", BackendKind::Table)
                .with_setting(
                    "connection_string",
                    "TableEndpoint=https://devstoreaccount1.table.core.windows.net;SharedAccessSignature=<sas>",
                )
                .with_setting("table_name", "seedcheckpeople"),
            BackendConfig::new("adf-blob-to-mongo", BackendKind::Mongo)
                .with_mode(RunMode::VerifyOnly)
                .with_setting("connection_string", "mongodb://localhost:27017")
                .with_setting("database_name", "seedcheck")
                .with_setting("collection_name", "adf-landing")
                .with_setting("id_field", "externalId"),
        ];

        Self {
            harness: HarnessConfig::default(),
            backends,
        }
    }

    /// Route every backend through the in-memory transport
    pub fn force_simulated(&mut self) {
        for backend in &mut self.backends {
            backend.transport = TransportKind::Memory.as_str().to_string();
        }
    }

    /// Keep only the named backends; unknown names are a configuration error
    pub fn select(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let known: HashSet<&str> = self.backends.iter().map(|b| b.name.as_str()).collect();
        if let Some(unknown) = names.iter().find(|n| !known.contains(n.as_str())) {
            return Err(HarnessError::Config(format!("unknown backend: {}", unknown)));
        }
        self.backends.retain(|b| names.contains(&b.name));
        Ok(())
    }

    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }

    pub fn validate(&self) -> Result<()> {
        let validation_result = self.validate_detailed();

        if !validation_result.success {
            let error_messages: Vec<String> = validation_result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();

            return Err(HarnessError::Config(format!(
                "Configuration validation failed: {}",
                error_messages.join(", ")
            )));
        }

        for warning in &validation_result.warnings {
            warn!(
                "Configuration warning for {}: {}{}",
                warning.field,
                warning.message,
                warning
                    .recommendation
                    .as_ref()
                    .map(|r| format!(" (Recommendation: {})", r))
                    .unwrap_or_default()
            );
        }

        Ok(())
    }

    pub fn validate_detailed(&self) -> ValidationResult {
        let start_time = std::time::Instant::now();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.harness.max_concurrency == 0 {
            errors.push(ValidationError {
                field: "harness.max_concurrency".to_string(),
                error_type: "invalid_range".to_string(),
                message: "Max concurrency must be at least 1".to_string(),
                suggested_fix: Some("Set max_concurrency to 1 or more".to_string()),
            });
        }

        if self.harness.step_timeout_seconds == 0 {
            errors.push(ValidationError {
                field: "harness.step_timeout_seconds".to_string(),
                error_type: "invalid_range".to_string(),
                message: "Step timeout must be at least 1 second".to_string(),
                suggested_fix: Some("Use 30 seconds unless the backend is very slow".to_string()),
            });
        }

        if self.harness.page_size == 0 || self.harness.page_size > 1000 {
            errors.push(ValidationError {
                field: "harness.page_size".to_string(),
                error_type: "invalid_range".to_string(),
                message: format!("Page size {} is outside 1..=1000", self.harness.page_size),
                suggested_fix: Some("Use a page size between 1 and 1000".to_string()),
            });
        }

        if self.backends.iter().all(|b| !b.enabled) {
            warnings.push(ValidationWarning {
                field: "backends".to_string(),
                message: "No enabled backends; a run will verify nothing".to_string(),
                recommendation: Some("Add at least one [[backends]] entry".to_string()),
            });
        }

        let mut names = HashSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            let field = format!("backends[{}]", index);

            if backend.name.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("{}.name", field),
                    error_type: "missing_name".to_string(),
                    message: "Backend name cannot be empty".to_string(),
                    suggested_fix: Some("Give every backend a unique name".to_string()),
                });
            } else if !names.insert(backend.name.as_str()) {
                errors.push(ValidationError {
                    field: format!("{}.name", field),
                    error_type: "duplicate_name".to_string(),
                    message: format!("Duplicate backend name: {}", backend.name),
                    suggested_fix: Some("Backend names must be unique".to_string()),
                });
            }

            let kind = match backend.kind() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    errors.push(ValidationError {
                        field: format!("{}.kind", field),
                        error_type: "unsupported_backend".to_string(),
                        message: format!("Unsupported backend kind: {}", backend.kind),
                        suggested_fix: Some(format!(
                            "Use one of: {}",
                            BackendKind::all()
                                .iter()
                                .map(|k| k.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )),
                    });
                    None
                }
            };

            let transport = match backend.transport() {
                Ok(transport) => Some(transport),
                Err(_) => {
                    errors.push(ValidationError {
                        field: format!("{}.transport", field),
                        error_type: "unsupported_transport".to_string(),
                        message: format!("Unsupported transport: {}", backend.transport),
                        suggested_fix: Some("Use 'live' or 'memory'".to_string()),
                    });
                    None
                }
            };

            if let (Some(kind), Some(TransportKind::Live)) = (kind, transport) {
                if !kind.supports_live() && backend.enabled {
                    errors.push(ValidationError {
                        field: format!("{}.transport", field),
                        error_type: "live_transport_unavailable".to_string(),
                        message: format!(
                            "No live transport is available for '{}' backends in this build",
                            kind
                        ),
                        suggested_fix: Some("Set transport = \"memory\" or run with --simulate".to_string()),
                    });
                }
            }

            if let Some(kind) = kind {
                let missing = backend.missing_settings(kind.required_settings());
                if !missing.is_empty() && backend.enabled {
                    warnings.push(ValidationWarning {
                        field: format!("{}.settings", field),
                        message: format!(
                            "Backend '{}' is missing settings: {}",
                            backend.name,
                            missing.join(", ")
                        ),
                        recommendation: Some(
                            "The run for this backend will fail with an invalid-config connect error"
                                .to_string(),
                        ),
                    });
                }
            }

            if !backend.enabled {
                warnings.push(ValidationWarning {
                    field: format!("{}.enabled", field),
                    message: format!("Backend '{}' is disabled", backend.name),
                    recommendation: None,
                });
            }
        }

        ValidationResult {
            success: errors.is_empty(),
            errors,
            warnings,
            duration: start_time.elapsed(),
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        let enabled: Vec<&BackendConfig> = self.enabled_backends().collect();
        let simulated = enabled
            .iter()
            .filter(|b| matches!(b.transport(), Ok(TransportKind::Memory)))
            .count();

        ConfigSummary {
            backends_total: self.backends.len(),
            backends_enabled: enabled.len(),
            simulated_backends: simulated,
            live_backends: enabled.len() - simulated,
            verify_only_backends: enabled
                .iter()
                .filter(|b| b.mode == RunMode::VerifyOnly)
                .count(),
            max_concurrency: self.harness.max_concurrency,
            step_timeout_seconds: self.harness.step_timeout_seconds,
            page_size: self.harness.page_size,
        }
    }
}

/// Configuration summary for logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub backends_total: usize,
    pub backends_enabled: usize,
    pub simulated_backends: usize,
    pub live_backends: usize,
    pub verify_only_backends: usize,
    pub max_concurrency: usize,
    pub step_timeout_seconds: u64,
    pub page_size: usize,
}
