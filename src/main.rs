use anyhow::{bail, Context};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use financial_pdf_analyzer::config::ConfigFile;
use financial_pdf_analyzer::{
    company_table, export_filename, read_document, trend_series, write_csv, AiModel,
    ExtractionEvent, ExtractionPipeline, Metric, OpenRouterClient, PdfTextExtractor, RunReport,
};

/// Financial PDF Analyzer - extract key financial metrics from PDF reports
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// PDF reports to analyze, processed in the given order
    #[arg(required_unless_present = "list")]
    files: Vec<PathBuf>,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model identifier (see --list)
    #[arg(short, long)]
    model: Option<String>,

    /// Comma-separated metrics to extract (see --list)
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// TOML config file (defaults to ./.financial-analyzer.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV output path (defaults to analisi_finanziaria_<timestamp>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show prompts, raw model responses and extracted text previews
    #[arg(long)]
    debug: bool,

    /// List the available models and metrics and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.list {
        print_catalog();
        return Ok(());
    }

    let file_layer = match &cli.config {
        Some(path) => ConfigFile::load(path)
            .with_context(|| format!("reading config file {}", path.display()))?,
        None => ConfigFile::load_local()?.unwrap_or_default(),
    };
    let cli_layer = ConfigFile {
        api_key: cli.api_key.clone(),
        model: cli.model.clone(),
        metrics: (!cli.metrics.is_empty()).then(|| cli.metrics.clone()),
        timeout_secs: cli.timeout_secs,
        base_url: None,
    };
    let config = file_layer.merge(cli_layer).into_config()?;

    if let Err(e) = config.validate() {
        bail!("{} (set OPENROUTER_API_KEY or pass --api-key)", e);
    }

    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match read_document(path) {
            Ok(doc) => documents.push(doc),
            Err(e) => eprintln!("❌ Cannot read {}: {}", path.display(), e),
        }
    }
    if documents.is_empty() {
        bail!("no readable documents");
    }

    let metrics = config.metrics.clone();
    let client = OpenRouterClient::from_config(&config)?;
    let pipeline = ExtractionPipeline::new(client, PdfTextExtractor, config);

    let (tx, mut rx) = mpsc::channel::<ExtractionEvent>(32);
    let printer = async {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    };
    let (report, ()) = tokio::join!(pipeline.run(&documents, Some(tx)), printer);
    let report = report?;

    print_summary(&report);
    if report.store.is_empty() {
        println!("\nNo financial data extracted.");
        return Ok(());
    }

    for company in report.store.companies() {
        print_company(&report, company, &metrics);
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(export_filename(chrono::Local::now().naive_local())));
    let file = File::create(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    write_csv(file, &report.store, &metrics)?;
    println!("\n💾 Results exported to {}", output.display());

    Ok(())
}

fn print_catalog() {
    println!("Models:");
    for model in AiModel::ALL {
        let marker = if model == AiModel::default() { " (default)" } else { "" };
        println!("  {}{}", model, marker);
    }
    let defaults = Metric::default_selection();
    println!("\nMetrics:");
    for metric in Metric::ALL {
        let marker = if defaults.contains(&metric) { " (default)" } else { "" };
        println!("  {}{}", metric, marker);
    }
}

fn print_event(event: &ExtractionEvent) {
    match event {
        ExtractionEvent::DocumentStarted { name, .. } => println!("📄 Processing: {}", name),
        ExtractionEvent::DocumentCompleted { name, company } => {
            println!("✅ Completed: {} - {}", name, company)
        }
        ExtractionEvent::DocumentFailed { name, reason } => println!("❌ {}: {}", name, reason),
        ExtractionEvent::Progress { done, total } => println!("   [{}/{}]", done, total),
        _ => {}
    }
}

fn print_summary(report: &RunReport) {
    let summary = report.summary();
    println!("\n📊 Summary");
    println!("  Documents processed:   {}", summary.documents_processed);
    println!("  Companies identified:  {}", summary.companies_identified);
    println!("  Extractions completed: {}", summary.extractions_completed);
}

fn print_company(report: &RunReport, company: &str, metrics: &[Metric]) {
    println!("\n📈 {}", company);

    let rows = company_table(&report.store, company, metrics);
    let mut header = vec!["Anno".to_string()];
    header.extend(metrics.iter().map(|m| m.label().to_string()));
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        let cells = std::iter::once(&row.year).chain(row.cells.iter());
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("  {}", render(header.iter().collect()));
    for row in &rows {
        println!(
            "  {}",
            render(std::iter::once(&row.year).chain(row.cells.iter()).collect())
        );
    }

    for series in trend_series(&report.store, company, metrics)
        .iter()
        .filter(|s| s.is_plottable())
    {
        let points = series
            .points
            .iter()
            .map(|(year, value)| format!("{}: {}", year, value))
            .collect::<Vec<_>>()
            .join(" → ");
        println!("  📉 {}: {}", series.metric, points);
    }

    println!("  Sources:");
    for (year, extraction) in report.store.company_entries(company) {
        println!("    - {}: {}", year, extraction.source);
    }
}
