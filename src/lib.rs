//! # Financial PDF Analyzer
//!
//! Extracts company identity and key financial metrics from PDF reports by
//! asking a hosted chat model (through OpenRouter), then shapes the results
//! into per-company tables, trend series and a CSV export.
//!
//! ## Core Concepts
//!
//! - **Identification**: the first call reads the start of the document and
//!   returns the company name, fiscal year, currency and document type
//! - **Metric extraction**: the second call receives the identified company
//!   and the selected metrics and returns one `{value, unit}` per metric
//! - **JSON recovery**: model output is untrusted text; the object between
//!   the first `{` and the last `}` is parsed or the document is abandoned
//! - **Result store**: one extraction per (company, fiscal year), last write wins
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_pdf_analyzer::*;
//!
//! let config = AnalyzerConfig::new(std::env::var("OPENROUTER_API_KEY")?)
//!     .with_model(AiModel::Gpt41)
//!     .with_metrics(vec![Metric::Ebitda, Metric::Ebit]);
//!
//! let documents = vec![read_document("bilancio_2023.pdf".as_ref())?];
//! let report = analyze_documents(config, &documents).await?;
//!
//! let mut out = std::fs::File::create("results.csv")?;
//! write_csv(&mut out, &report.store, &[Metric::Ebitda, Metric::Ebit])?;
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod store;

pub use config::{AnalyzerConfig, ConfigFile};
pub use error::{AnalyzerError, CompletionError, Result};
pub use export::*;
pub use ingestion::{read_document, PdfTextExtractor, TextExtractor};
pub use llm::{recover_json, CompletionBackend, ExtractionEvent, JsonRecovery, OpenRouterClient};
pub use pipeline::{DocumentReport, DocumentState, ExtractionPipeline, RunReport, RunSummary};
pub use schema::*;
pub use store::{ResultStore, StoredExtraction};

/// Runs the full pipeline against OpenRouter with PDF text extraction.
pub async fn analyze_documents(
    config: AnalyzerConfig,
    documents: &[DocumentSource],
) -> Result<RunReport> {
    config.validate()?;
    let client = OpenRouterClient::from_config(&config)?;
    ExtractionPipeline::new(client, PdfTextExtractor, config)
        .run(documents, None)
        .await
}
