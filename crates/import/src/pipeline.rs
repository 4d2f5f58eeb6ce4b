use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tally_core::{
    BudgetAlert, BudgetEngine, LedgerStore, MonthPeriod, NewTransaction, StoreError,
    DEFAULT_CATEGORY,
};
use thiserror::Error;

use crate::ofx::OfxError;
use crate::record::{ParseOutcome, RowIssue};
use crate::rules::{CategoryRuleEngine, RulesError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Ofx,
}

impl ImportFormat {
    /// Picks the parser from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ImportError::MissingExtension(path.to_path_buf()))?;
        match ext.as_str() {
            "csv" => Ok(ImportFormat::Csv),
            "ofx" | "qfx" => Ok(ImportFormat::Ofx),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImportFormat::Csv => "CSV",
            ImportFormat::Ofx => "OFX",
        }
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// File-level failures. Row-level problems never surface here; they are
/// counted in [`ImportSummary::skipped`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file format '.{0}'. Please use .csv or .ofx")]
    UnsupportedFormat(String),
    #[error("File '{}' has no extension. Please use .csv or .ofx", .0.display())]
    MissingExtension(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Ofx(#[from] OfxError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub duplicates: usize,
    /// One entry per counted skip, in row order.
    pub diagnostics: Vec<RowIssue>,
    pub alerts: Vec<BudgetAlert>,
}

impl ImportSummary {
    fn skip(&mut self, issue: RowIssue) {
        tracing::warn!(row = issue.row, reason = %issue.reason, "row skipped");
        self.skipped += 1;
        self.diagnostics.push(issue);
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} skipped, {} duplicates skipped.",
            self.imported, self.skipped, self.duplicates
        )
    }
}

/// parse -> validate -> categorize -> dedup -> persist, one record at a time.
pub struct ImportPipeline<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    rules: &'a CategoryRuleEngine,
}

impl<'a, S: LedgerStore + ?Sized> ImportPipeline<'a, S> {
    pub fn new(store: &'a S, rules: &'a CategoryRuleEngine) -> Self {
        Self { store, rules }
    }

    /// Imports one file. The format is resolved before the file is touched.
    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary, ImportError> {
        let format = ImportFormat::from_path(path)?;
        let data = tokio::fs::read(path).await.map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), %format, bytes = data.len(), "importing file");
        self.import_bytes(format, &data).await
    }

    pub async fn import_bytes(
        &self,
        format: ImportFormat,
        data: &[u8],
    ) -> Result<ImportSummary, ImportError> {
        let outcome = match format {
            ImportFormat::Csv => crate::csv::parse(data),
            ImportFormat::Ofx => crate::ofx::parse(data)?.into_outcome(),
        };
        let summary = self.persist(outcome).await;
        tracing::info!(
            %format,
            imported = summary.imported,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            "import finished"
        );
        Ok(summary)
    }

    async fn persist(&self, outcome: ParseOutcome) -> ImportSummary {
        let mut summary = ImportSummary::default();
        // Parse-time skips and persist-time skips are reported in row order.
        let mut pending_skips = outcome.skipped.into_iter().peekable();
        let mut touched: BTreeSet<(String, MonthPeriod)> = BTreeSet::new();

        for record in outcome.records {
            while let Some(issue) = pending_skips.next_if(|i| i.row < record.row) {
                summary.skip(issue);
            }

            let category = match record.category.as_deref() {
                Some(explicit) => explicit,
                None => self
                    .rules
                    .categorize(&record.description)
                    .unwrap_or(DEFAULT_CATEGORY),
            };

            let tx = match NewTransaction::new(record.date, &record.description, record.amount, category) {
                Ok(tx) => tx,
                Err(e) => {
                    summary.skip(RowIssue::new(record.row, e));
                    continue;
                }
            };

            match self.store.transaction_exists(&tx).await {
                Ok(true) => {
                    tracing::debug!(row = record.row, description = %tx.description, "duplicate skipped");
                    summary.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    summary.skip(RowIssue::new(record.row, e));
                    continue;
                }
            }

            match self.store.create_transaction(&tx).await {
                Ok(stored) => {
                    tracing::debug!(row = record.row, id = stored.id.0, category = %stored.category, "row imported");
                    summary.imported += 1;
                    if stored.is_expense() {
                        touched.insert((stored.category, MonthPeriod::containing(stored.date)));
                    }
                }
                Err(e) => summary.skip(RowIssue::new(record.row, e)),
            }
        }
        for issue in pending_skips {
            summary.skip(issue);
        }

        let budgets = BudgetEngine::new(self.store);
        for (category, period) in touched {
            match budgets.check_alert(&category, period).await {
                Ok(Some(alert)) => summary.alerts.push(alert),
                Ok(None) => {}
                Err(e) => tracing::warn!(%category, %period, error = %e, "budget check failed"),
            }
        }

        summary
    }
}
