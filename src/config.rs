use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AnalyzerError, Result};
use crate::schema::{AiModel, Metric};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MIN_API_KEY_LEN: usize = 10;

/// Everything one analysis run needs, passed explicitly into the pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub api_key: String,
    pub model: AiModel,
    pub metrics: Vec<Metric>,
    pub request_timeout: Duration,
    pub base_url: String,
}

impl AnalyzerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: AiModel::default(),
            metrics: Metric::default_selection(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: OPENROUTER_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: AiModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Checks the run preconditions: a plausible API key and at least one metric.
    pub fn validate(&self) -> Result<()> {
        if !is_plausible_api_key(&self.api_key) {
            return Err(AnalyzerError::InvalidCredential);
        }
        if self.metrics.is_empty() {
            return Err(AnalyzerError::NoMetricsSelected);
        }
        if self.request_timeout.is_zero() {
            return Err(AnalyzerError::InvalidConfig(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn is_plausible_api_key(api_key: &str) -> bool {
    api_key.trim().chars().count() >= MIN_API_KEY_LEN
}

/// On-disk TOML configuration. All fields are optional so a partial file
/// only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub base_url: Option<String>,
}

pub const LOCAL_CONFIG_FILE: &str = ".financial-analyzer.toml";

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads `.financial-analyzer.toml` from the working directory, if any.
    pub fn load_local() -> Result<Option<Self>> {
        let path = Path::new(LOCAL_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// `overlay` values take precedence over `self`.
    pub fn merge(self, overlay: ConfigFile) -> ConfigFile {
        ConfigFile {
            api_key: overlay.api_key.or(self.api_key),
            model: overlay.model.or(self.model),
            metrics: overlay.metrics.or(self.metrics),
            timeout_secs: overlay.timeout_secs.or(self.timeout_secs),
            base_url: overlay.base_url.or(self.base_url),
        }
    }

    /// Turns the merged layers into a run configuration. The API key may be
    /// empty here; `AnalyzerConfig::validate` reports it.
    pub fn into_config(self) -> Result<AnalyzerConfig> {
        let mut config = AnalyzerConfig::new(self.api_key.unwrap_or_default());

        if let Some(model) = self.model {
            config.model = model.parse()?;
        }
        if let Some(metrics) = self.metrics {
            config.metrics = metrics
                .iter()
                .map(|m| m.parse())
                .collect::<Result<Vec<Metric>>>()?;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        Ok(config)
    }
}
