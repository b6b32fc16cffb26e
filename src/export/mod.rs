//! Result export: spreadsheets per result set and the session archive.

mod archive;
mod xlsx;

pub use archive::create_zip_from_folder;
pub use xlsx::{build_workbook, XlsxExporter, SHEET_NAME};

use crate::db::Row;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes one result set somewhere under a session folder.
#[async_trait]
pub trait ResultExporter: Send + Sync {
    /// Exports `rows` produced by statement `statement_index` (zero based) on
    /// `backend_name` and returns the path of the written file.
    async fn export(
        &self,
        rows: &[Row],
        statement_index: usize,
        backend_name: &str,
        session_folder: &Path,
    ) -> Result<PathBuf>;
}

/// File name for an exported result set, e.g. `local_query_1.xlsx`.
///
/// Path separators in the backend name are replaced so the file always lands
/// directly in the exports folder.
pub fn export_file_name(backend_name: &str, statement_index: usize, extension: &str) -> String {
    let backend: String = backend_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{backend}_query_{}.{extension}", statement_index + 1)
}
