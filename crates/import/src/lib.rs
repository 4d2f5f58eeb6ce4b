pub mod csv;
pub mod ofx;
pub mod pipeline;
pub mod record;
pub mod rules;

pub use self::csv::CsvError;
pub use ofx::{OfxError, OfxStatement, OfxTransaction};
pub use pipeline::{ImportError, ImportFormat, ImportPipeline, ImportSummary};
pub use record::{ParseOutcome, ParsedRecord, RowIssue};
pub use rules::{add_rule, import_rule_file, parse_rule_file, CategoryRuleEngine, RulesError};

use std::path::Path;
use tally_core::LedgerStore;

/// Loads the stored rules and imports `path` against them.
pub async fn import_file<S: LedgerStore + ?Sized>(
    store: &S,
    path: &Path,
) -> Result<ImportSummary, ImportError> {
    let rules = CategoryRuleEngine::load(store).await?;
    ImportPipeline::new(store, &rules).import_file(path).await
}
