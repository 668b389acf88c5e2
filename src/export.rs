//! Flattening of a run's results into tables, trend series and CSV.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;

use crate::error::Result;
use crate::schema::{Metric, MetricValue};
use crate::store::ResultStore;

/// Shown in tables when a metric is missing or has no value.
pub const NOT_AVAILABLE: &str = "N/D";

pub const EXPORT_FIXED_COLUMNS: [&str; 3] = ["Azienda", "Anno", "Valuta"];

/// One table row for a company: the year and one rendered cell per metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub year: String,
    pub cells: Vec<String>,
}

/// Rows of the per-company table, years ascending.
pub fn company_table(store: &ResultStore, company: &str, metrics: &[Metric]) -> Vec<TableRow> {
    store
        .company_entries(company)
        .map(|(year, extraction)| TableRow {
            year: year.to_string(),
            cells: metrics
                .iter()
                .map(|m| render_cell(extraction.record.get(*m)))
                .collect(),
        })
        .collect()
}

/// `"<value> <unit>"`, or `N/D` when there is nothing to show. A zero value
/// is treated as missing.
pub fn render_cell(entry: Option<&MetricValue>) -> String {
    match entry {
        Some(MetricValue {
            value: Some(v),
            unit,
        }) if *v != 0.0 => {
            if unit.is_empty() {
                format!("{}", v)
            } else {
                format!("{} {}", v, unit)
            }
        }
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Numeric points of one metric across a company's years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub metric: Metric,
    pub points: Vec<(String, f64)>,
}

impl TrendSeries {
    /// A line needs at least two points.
    pub fn is_plottable(&self) -> bool {
        self.points.len() > 1
    }
}

/// One series per requested metric that has at least one numeric value.
/// Years that parse as integers sort numerically, the rest after them.
pub fn trend_series(store: &ResultStore, company: &str, metrics: &[Metric]) -> Vec<TrendSeries> {
    let mut years: Vec<(&str, &crate::store::StoredExtraction)> =
        store.company_entries(company).collect();
    years.sort_by_key(|(year, _)| year_sort_key(year));

    metrics
        .iter()
        .filter_map(|metric| {
            let points: Vec<(String, f64)> = years
                .iter()
                .filter_map(|(year, e)| {
                    e.record
                        .value(*metric)
                        .filter(|v| *v != 0.0)
                        .map(|v| (year.to_string(), v))
                })
                .collect();
            (!points.is_empty()).then_some(TrendSeries {
                metric: *metric,
                points,
            })
        })
        .collect()
}

fn year_sort_key(year: &str) -> (u8, i64, String) {
    match year.trim().parse::<i64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, year.to_string()),
    }
}

/// A flattened export row: company, year, currency and one raw value per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub company: String,
    pub year: String,
    pub currency: String,
    pub values: Vec<Option<f64>>,
}

pub fn export_rows(store: &ResultStore, metrics: &[Metric]) -> Vec<ExportRow> {
    store
        .iter()
        .map(|(company, year, extraction)| ExportRow {
            company: company.to_string(),
            year: year.to_string(),
            currency: extraction.identity.currency_or_unknown().to_string(),
            values: metrics.iter().map(|m| extraction.record.value(*m)).collect(),
        })
        .collect()
}

pub fn export_header(metrics: &[Metric]) -> Vec<String> {
    EXPORT_FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(metrics.iter().map(|m| m.label().to_string()))
        .collect()
}

/// Writes the header row and one row per (company, year). Missing values
/// are written as empty fields.
pub fn write_csv<W: Write>(writer: W, store: &ResultStore, metrics: &[Metric]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(export_header(metrics))?;

    for row in export_rows(store, metrics) {
        let mut record = vec![row.company, row.year, row.currency];
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|n| n.to_string()).unwrap_or_default()),
        );
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_filename(now: NaiveDateTime) -> String {
    format!("analisi_finanziaria_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CompanyIdentity, FinancialRecord};
    use crate::store::StoredExtraction;
    use chrono::NaiveDate;

    fn record(entries: &[(&str, Option<f64>)]) -> FinancialRecord {
        let mut record = FinancialRecord::default();
        for (label, value) in entries {
            record.metrics.insert(
                label.to_string(),
                MetricValue {
                    value: *value,
                    unit: "milioni".to_string(),
                },
            );
        }
        record
    }

    fn store_with(entries: &[(&str, &str, Option<&str>, FinancialRecord)]) -> ResultStore {
        let mut store = ResultStore::new();
        for (company, year, currency, rec) in entries {
            store.upsert(
                *company,
                *year,
                StoredExtraction {
                    identity: CompanyIdentity {
                        company_name: Some(company.to_string()),
                        fiscal_year: Some(year.to_string()),
                        currency: currency.map(str::to_string),
                        document_type: None,
                    },
                    record: rec.clone(),
                    source: format!("{}_{}.pdf", company, year),
                },
            );
        }
        store
    }

    #[test]
    fn test_render_cell() {
        let with_unit = MetricValue {
            value: Some(12.5),
            unit: "milioni".to_string(),
        };
        assert_eq!(render_cell(Some(&with_unit)), "12.5 milioni");

        let no_unit = MetricValue {
            value: Some(-3.0),
            unit: String::new(),
        };
        assert_eq!(render_cell(Some(&no_unit)), "-3");

        let zero = MetricValue {
            value: Some(0.0),
            unit: "milioni".to_string(),
        };
        assert_eq!(render_cell(Some(&zero)), NOT_AVAILABLE);
        assert_eq!(render_cell(None), NOT_AVAILABLE);
    }

    #[test]
    fn test_company_table_marks_missing_metrics() {
        let store = store_with(&[
            ("Rossi", "2023", Some("EUR"), record(&[("EBITDA", Some(10.0))])),
            ("Rossi", "2022", Some("EUR"), record(&[("EBITDA", None), ("EBIT", Some(4.0))])),
        ]);

        let rows = company_table(&store, "Rossi", &[Metric::Ebitda, Metric::Ebit]);
        assert_eq!(
            rows,
            vec![
                TableRow {
                    year: "2022".to_string(),
                    cells: vec!["N/D".to_string(), "4 milioni".to_string()],
                },
                TableRow {
                    year: "2023".to_string(),
                    cells: vec!["10 milioni".to_string(), "N/D".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_trend_series_only_numeric_points() {
        let store = store_with(&[
            ("Rossi", "2021", None, record(&[("EBITDA", Some(8.0))])),
            ("Rossi", "2022", None, record(&[("EBITDA", None)])),
            ("Rossi", "2023", None, record(&[("EBITDA", Some(10.0)), ("EBIT", Some(5.0))])),
        ]);

        let series = trend_series(
            &store,
            "Rossi",
            &[Metric::Ebitda, Metric::Ebit, Metric::NetIncome],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[0].points,
            vec![("2021".to_string(), 8.0), ("2023".to_string(), 10.0)]
        );
        assert!(series[0].is_plottable());
        assert_eq!(series[1].metric, Metric::Ebit);
        assert!(!series[1].is_plottable());
    }

    #[test]
    fn test_export_row_for_partial_record() {
        let store = store_with(&[("Rossi", "2023", Some("EUR"), record(&[("EBITDA", Some(12.0))]))]);

        let rows = export_rows(&store, &[Metric::Ebitda, Metric::Ebit]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Some(12.0), None]);
        assert_eq!(rows[0].currency, "EUR");
    }

    #[test]
    fn test_write_csv() {
        let store = store_with(&[
            ("Rossi", "2023", Some("EUR"), record(&[("EBITDA", Some(12.5))])),
            ("Verdi", "2023", None, record(&[("EBIT", Some(-1.0))])),
        ]);

        let mut buf = Vec::new();
        write_csv(&mut buf, &store, &[Metric::Ebitda, Metric::Ebit]).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        assert_eq!(
            csv,
            "Azienda,Anno,Valuta,EBITDA,EBIT\n\
             Rossi,2023,EUR,12.5,\n\
             Verdi,2023,Sconosciuta,,-1\n"
        );
    }

    #[test]
    fn test_csv_quotes_labels_with_commas() {
        let store = store_with(&[("Rossi, Bianchi & C.", "2023", Some("EUR"), record(&[]))]);
        let mut buf = Vec::new();
        write_csv(&mut buf, &store, &[Metric::NetFinancialPosition]).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        assert!(csv.starts_with("Azienda,Anno,Valuta,PFN (Posizione Finanziaria Netta)\n"));
        assert!(csv.contains("\"Rossi, Bianchi & C.\",2023,EUR,\n"));
    }

    #[test]
    fn test_export_filename() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(export_filename(now), "analisi_finanziaria_20240307_090501.csv");
    }
}
