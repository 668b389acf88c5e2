use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::Sender;

use crate::config::AnalyzerConfig;
use crate::error::{CompletionError, Result};
use crate::ingestion::TextExtractor;
use crate::llm::client::CompletionBackend;
use crate::llm::prompts::{build_identity_prompt, build_metrics_prompt, truncate_chars};
use crate::llm::recovery::recover_json;
use crate::llm::types::ExtractionEvent;
use crate::schema::{CompanyIdentity, DocumentSource, FinancialRecord};
use crate::store::{ResultStore, StoredExtraction};

/// Extracted text must be longer than this (after trimming) to be analyzed.
pub const MIN_TEXT_CHARS: usize = 100;

const PREVIEW_CHARS: usize = 1000;

/// Where processing of one document stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    InsufficientText,
    IdentityCallFailed(CompletionError),
    IdentityParseFailed,
    MetricsCallFailed(CompletionError),
    MetricsParseFailed,
    Completed,
}

impl DocumentState {
    pub fn is_completed(&self) -> bool {
        matches!(self, DocumentState::Completed)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentState::InsufficientText => write!(f, "could not extract meaningful text"),
            DocumentState::IdentityCallFailed(e) => {
                write!(f, "company identification request failed: {}", e)
            }
            DocumentState::IdentityParseFailed => {
                write!(f, "could not identify the company (no valid JSON in response)")
            }
            DocumentState::MetricsCallFailed(e) => {
                write!(f, "financial data request failed: {}", e)
            }
            DocumentState::MetricsParseFailed => {
                write!(f, "could not extract valid financial data (no valid JSON in response)")
            }
            DocumentState::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub name: String,
    pub state: DocumentState,
    /// Store keys, set once the company has been identified.
    pub company: Option<String>,
    pub fiscal_year: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub documents_processed: usize,
    pub companies_identified: usize,
    pub extractions_completed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub documents: Vec<DocumentReport>,
    pub store: ResultStore,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            documents_processed: self.documents.len(),
            companies_identified: self.store.company_count(),
            extractions_completed: self.store.extraction_count(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.state.is_completed())
    }
}

/// Runs documents through identification and metric extraction, one at a time.
pub struct ExtractionPipeline<B, E> {
    backend: B,
    extractor: E,
    config: AnalyzerConfig,
}

impl<B, E> ExtractionPipeline<B, E>
where
    B: CompletionBackend,
    E: TextExtractor,
{
    pub fn new(backend: B, extractor: E, config: AnalyzerConfig) -> Self {
        Self {
            backend,
            extractor,
            config,
        }
    }

    /// Processes `documents` in order. Fails only when the configuration is
    /// unusable; per-document failures end up in the report.
    pub async fn run(
        &self,
        documents: &[DocumentSource],
        progress: Option<Sender<ExtractionEvent>>,
    ) -> Result<RunReport> {
        self.config.validate()?;

        info!(
            "Analyzing {} document(s) with {} for {} metric(s)",
            documents.len(),
            self.config.model,
            self.config.metrics.len()
        );

        let total = documents.len();
        let mut report = RunReport::default();

        for (index, source) in documents.iter().enumerate() {
            self.send_event(
                &progress,
                ExtractionEvent::DocumentStarted {
                    index,
                    total,
                    name: source.name.clone(),
                },
            )
            .await;

            let document = self
                .process_document(index + 1, source, &mut report.store, &progress)
                .await;

            let event = if document.state.is_completed() {
                ExtractionEvent::DocumentCompleted {
                    name: document.name.clone(),
                    company: document.company.clone().unwrap_or_default(),
                }
            } else {
                ExtractionEvent::DocumentFailed {
                    name: document.name.clone(),
                    reason: document.state.to_string(),
                }
            };
            self.send_event(&progress, event).await;

            report.documents.push(document);
            self.send_event(
                &progress,
                ExtractionEvent::Progress {
                    done: index + 1,
                    total,
                },
            )
            .await;
        }

        let summary = report.summary();
        info!(
            "Run finished: {} processed, {} companies identified, {} extractions completed",
            summary.documents_processed, summary.companies_identified, summary.extractions_completed
        );

        Ok(report)
    }

    /// Takes one document to a terminal state. `position` is 1-based and
    /// names unidentified companies.
    pub async fn process_document(
        &self,
        position: usize,
        source: &DocumentSource,
        store: &mut ResultStore,
        progress: &Option<Sender<ExtractionEvent>>,
    ) -> DocumentReport {
        let mut report = DocumentReport {
            name: source.name.clone(),
            state: DocumentState::InsufficientText,
            company: None,
            fiscal_year: None,
        };

        let text = match self.extractor.extract_text(source) {
            Ok(text) => text,
            Err(e) => {
                warn!("Text extraction failed for {}: {}", source.name, e);
                return report;
            }
        };

        let chars = text.chars().count();
        self.send_event(
            progress,
            ExtractionEvent::TextExtracted {
                name: source.name.clone(),
                chars,
            },
        )
        .await;
        debug!(
            "Text preview for {}:\n{}",
            source.name,
            truncate_chars(&text, PREVIEW_CHARS)
        );

        if text.trim().chars().count() <= MIN_TEXT_CHARS {
            return report;
        }

        // Stage 1: who and when.
        self.send_event(
            progress,
            ExtractionEvent::IdentifyingCompany {
                name: source.name.clone(),
            },
        )
        .await;

        let identity_prompt = build_identity_prompt(&text);
        let identity_response = match self.ask(&identity_prompt).await {
            Ok(response) => response,
            Err(e) => {
                report.state = DocumentState::IdentityCallFailed(e);
                return report;
            }
        };
        debug!("Identification response for {}:\n{}", source.name, identity_response);

        let Some(identity_json) = recover_json(&identity_response).into_option() else {
            report.state = DocumentState::IdentityParseFailed;
            return report;
        };
        let identity = CompanyIdentity::from_json(&identity_json);
        let company = identity.company_key(position);
        let fiscal_year = identity.year_key();
        report.company = Some(company.clone());
        report.fiscal_year = Some(fiscal_year.clone());

        self.send_event(
            progress,
            ExtractionEvent::CompanyIdentified {
                name: source.name.clone(),
                company: company.clone(),
                fiscal_year: fiscal_year.clone(),
            },
        )
        .await;

        // Stage 2: the figures, in the context of the identified company.
        self.send_event(
            progress,
            ExtractionEvent::ExtractingMetrics {
                name: source.name.clone(),
                company: company.clone(),
            },
        )
        .await;

        let metrics_prompt = build_metrics_prompt(&text, &identity, &self.config.metrics);
        let metrics_response = match self.ask(&metrics_prompt).await {
            Ok(response) => response,
            Err(e) => {
                report.state = DocumentState::MetricsCallFailed(e);
                return report;
            }
        };
        debug!("Financial data response for {}:\n{}", company, metrics_response);

        let Some(metrics_json) = recover_json(&metrics_response).into_option() else {
            report.state = DocumentState::MetricsParseFailed;
            return report;
        };
        let record = FinancialRecord::from_json(&metrics_json);
        debug!("{} metric(s) extracted for {} {}", record.len(), company, fiscal_year);

        let replaced = store.upsert(
            company.clone(),
            fiscal_year.clone(),
            StoredExtraction {
                identity,
                record,
                source: source.name.clone(),
            },
        );
        if let Some(previous) = replaced {
            info!(
                "{} {} from {} replaces the data from {}",
                company, fiscal_year, source.name, previous.source
            );
        }

        report.state = DocumentState::Completed;
        report
    }

    async fn ask(&self, prompt: &str) -> std::result::Result<String, CompletionError> {
        self.backend
            .complete(prompt, self.config.model.id(), &self.config.api_key)
            .await
    }

    async fn send_event(&self, sender: &Option<Sender<ExtractionEvent>>, event: ExtractionEvent) {
        log_event(&event);
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }
}

fn log_event(event: &ExtractionEvent) {
    match event {
        ExtractionEvent::DocumentStarted { index, total, name } => {
            info!("[{}/{}] Processing {}", index + 1, total, name)
        }
        ExtractionEvent::TextExtracted { name, chars } => {
            debug!("{}: {} characters of text", name, chars)
        }
        ExtractionEvent::IdentifyingCompany { name } => info!("Identifying company for {}", name),
        ExtractionEvent::CompanyIdentified {
            name,
            company,
            fiscal_year,
        } => info!("{}: identified {} ({})", name, company, fiscal_year),
        ExtractionEvent::ExtractingMetrics { company, .. } => {
            info!("Extracting financial data for {}", company)
        }
        ExtractionEvent::DocumentCompleted { name, company } => {
            info!("Completed: {} - {}", name, company)
        }
        ExtractionEvent::DocumentFailed { name, reason } => warn!("{}: {}", name, reason),
        ExtractionEvent::Progress { done, total } => debug!("Progress {}/{}", done, total),
    }
}
