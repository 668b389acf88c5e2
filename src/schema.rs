use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalyzerError, Result};

/// Financial metrics the analyzer knows how to ask for.
///
/// The serialized form is the exact label used in prompts, in the model's
/// JSON answer and as CSV column header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "Ricavi/Vendite")]
    Revenue,
    #[serde(rename = "EBITDA")]
    Ebitda,
    #[serde(rename = "EBIT")]
    Ebit,
    #[serde(rename = "Utile Netto")]
    NetIncome,
    #[serde(rename = "Totale Attività")]
    TotalAssets,
    #[serde(rename = "Totale Passività")]
    TotalLiabilities,
    #[serde(rename = "Patrimonio Netto")]
    Equity,
    #[serde(rename = "Flusso di Cassa Operativo")]
    OperatingCashFlow,
    #[serde(rename = "Free Cash Flow")]
    FreeCashFlow,
    #[serde(rename = "Rapporto Debito/Patrimonio")]
    DebtToEquity,
    #[serde(rename = "PFN (Posizione Finanziaria Netta)")]
    NetFinancialPosition,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Revenue,
        Metric::Ebitda,
        Metric::Ebit,
        Metric::NetIncome,
        Metric::TotalAssets,
        Metric::TotalLiabilities,
        Metric::Equity,
        Metric::OperatingCashFlow,
        Metric::FreeCashFlow,
        Metric::DebtToEquity,
        Metric::NetFinancialPosition,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Revenue => "Ricavi/Vendite",
            Metric::Ebitda => "EBITDA",
            Metric::Ebit => "EBIT",
            Metric::NetIncome => "Utile Netto",
            Metric::TotalAssets => "Totale Attività",
            Metric::TotalLiabilities => "Totale Passività",
            Metric::Equity => "Patrimonio Netto",
            Metric::OperatingCashFlow => "Flusso di Cassa Operativo",
            Metric::FreeCashFlow => "Free Cash Flow",
            Metric::DebtToEquity => "Rapporto Debito/Patrimonio",
            Metric::NetFinancialPosition => "PFN (Posizione Finanziaria Netta)",
        }
    }

    /// The selection used when the caller does not pick any metric.
    pub fn default_selection() -> Vec<Metric> {
        vec![Metric::Ebitda, Metric::Ebit, Metric::NetFinancialPosition]
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.label() == wanted)
            // Shorthands for the shell, e.g. "PFN" or "ricavi/vendite".
            .or_else(|| {
                Metric::ALL.iter().copied().find(|m| {
                    let label = m.label();
                    label.eq_ignore_ascii_case(wanted)
                        || label
                            .split(" (")
                            .next()
                            .is_some_and(|short| short.eq_ignore_ascii_case(wanted))
                })
            })
            .ok_or_else(|| AnalyzerError::UnknownMetric(s.to_string()))
    }
}

/// Chat models offered through OpenRouter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiModel {
    #[default]
    #[serde(rename = "anthropic/claude-sonnet-4")]
    ClaudeSonnet4,
    #[serde(rename = "anthropic/claude-opus-4")]
    ClaudeOpus4,
    #[serde(rename = "google/gemini-2.5-flash-preview-05-20")]
    Gemini25Flash,
    #[serde(rename = "google/gemini-2.5-pro-preview")]
    Gemini25Pro,
    #[serde(rename = "openai/gpt-4.1")]
    Gpt41,
}

impl AiModel {
    pub const ALL: [AiModel; 5] = [
        AiModel::ClaudeSonnet4,
        AiModel::ClaudeOpus4,
        AiModel::Gemini25Flash,
        AiModel::Gemini25Pro,
        AiModel::Gpt41,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AiModel::ClaudeSonnet4 => "anthropic/claude-sonnet-4",
            AiModel::ClaudeOpus4 => "anthropic/claude-opus-4",
            AiModel::Gemini25Flash => "google/gemini-2.5-flash-preview-05-20",
            AiModel::Gemini25Pro => "google/gemini-2.5-pro-preview",
            AiModel::Gpt41 => "openai/gpt-4.1",
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AiModel {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        AiModel::ALL
            .iter()
            .copied()
            .find(|m| m.id() == s.trim())
            .ok_or_else(|| AnalyzerError::UnknownModel(s.to_string()))
    }
}

/// A document as handed over by the shell: file name plus raw bytes.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub name: String,
    pub content: Vec<u8>,
}

impl DocumentSource {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

/// Who the document is about, as identified by the first model call.
/// Every field is optional because the model may leave keys out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyIdentity {
    pub company_name: Option<String>,
    pub fiscal_year: Option<String>,
    pub currency: Option<String>,
    pub document_type: Option<String>,
}

pub const UNKNOWN_YEAR: &str = "Sconosciuto";
pub const UNKNOWN_CURRENCY: &str = "Sconosciuta";

impl CompanyIdentity {
    pub fn from_json(object: &Map<String, Value>) -> Self {
        Self {
            company_name: text_field(object, "company_name"),
            fiscal_year: text_field(object, "fiscal_year"),
            currency: text_field(object, "currency"),
            document_type: text_field(object, "document_type"),
        }
    }

    /// Store key for the company; `position` is the 1-based document index.
    pub fn company_key(&self, position: usize) -> String {
        self.company_name
            .clone()
            .unwrap_or_else(|| format!("Azienda Sconosciuta {}", position))
    }

    pub fn year_key(&self) -> String {
        self.fiscal_year
            .clone()
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string())
    }

    pub fn currency_or_unknown(&self) -> &str {
        self.currency.as_deref().unwrap_or(UNKNOWN_CURRENCY)
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A single extracted figure. `value` stays `None` unless the model gave a
/// JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: Option<f64>,
    pub unit: String,
}

impl MetricValue {
    pub fn from_json(entry: &Value) -> Self {
        let value = entry.get("value").and_then(Value::as_f64);
        let unit = entry
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { value, unit }
    }
}

/// Metric label to extracted figure, for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub metrics: BTreeMap<String, MetricValue>,
}

impl FinancialRecord {
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let metrics = object
            .iter()
            .map(|(label, entry)| (label.clone(), MetricValue::from_json(entry)))
            .collect();
        Self { metrics }
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.metrics.get(metric.label())
    }

    /// Numeric value for the metric, if the model produced one.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.get(metric).and_then(|m| m.value)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
