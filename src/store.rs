use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{CompanyIdentity, FinancialRecord};

/// One completed extraction, keyed in the store by company and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExtraction {
    pub identity: CompanyIdentity,
    pub record: FinancialRecord,
    /// File name of the document the figures came from.
    pub source: String,
}

/// In-memory results of one run: company -> fiscal year -> extraction.
///
/// Holds at most one extraction per (company, year); a later upsert for the
/// same pair replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStore {
    companies: BTreeMap<String, BTreeMap<String, StoredExtraction>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; returns the extraction that was replaced, if any.
    pub fn upsert(
        &mut self,
        company: impl Into<String>,
        fiscal_year: impl Into<String>,
        extraction: StoredExtraction,
    ) -> Option<StoredExtraction> {
        self.companies
            .entry(company.into())
            .or_default()
            .insert(fiscal_year.into(), extraction)
    }

    pub fn get(&self, company: &str, fiscal_year: &str) -> Option<&StoredExtraction> {
        self.companies.get(company)?.get(fiscal_year)
    }

    pub fn companies(&self) -> impl Iterator<Item = &str> {
        self.companies.keys().map(String::as_str)
    }

    /// Years recorded for `company`, in ascending order.
    pub fn years(&self, company: &str) -> Vec<&str> {
        self.companies
            .get(company)
            .map(|years| years.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn company_entries(
        &self,
        company: &str,
    ) -> impl Iterator<Item = (&str, &StoredExtraction)> {
        self.companies
            .get(company)
            .into_iter()
            .flat_map(|years| years.iter().map(|(y, e)| (y.as_str(), e)))
    }

    /// Every (company, year, extraction) triple in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &StoredExtraction)> {
        self.companies.iter().flat_map(|(company, years)| {
            years
                .iter()
                .map(move |(year, e)| (company.as_str(), year.as_str(), e))
        })
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    pub fn extraction_count(&self) -> usize {
        self.companies.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}
