use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use crate::app::ports::{CleanedFile, CleanedSourcePort};
use crate::pipeline::processing::schema::SchemaCatalog;
use crate::pipeline::storage::{ImportMode, ImportResult, Store, TableImporter, TableSpec};

#[derive(Debug, Default)]
pub struct BatchImportStats {
    pub results: Vec<ImportResult>,
    /// Files that could not be imported, with the error
    pub skipped: Vec<(String, String)>,
}

impl BatchImportStats {
    pub fn rows_imported(&self) -> usize {
        self.results.iter().map(|r| r.rows_imported).sum()
    }

    pub fn rows_failed(&self) -> usize {
        self.results.iter().map(|r| r.rows_failed).sum()
    }
}

/// Use case for loading cleaned files into the store, one table per dataset
pub struct ImportUseCase {
    catalog: Arc<SchemaCatalog>,
    source: Box<dyn CleanedSourcePort>,
    store: Store,
    mode: ImportMode,
    importer: TableImporter,
}

impl ImportUseCase {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        source: Box<dyn CleanedSourcePort>,
        store: Store,
        mode: ImportMode,
    ) -> Self {
        Self {
            catalog,
            source,
            store,
            mode,
            importer: TableImporter::new(),
        }
    }

    /// Import one cleaned file. The store connection lives only for this call.
    pub async fn import_file(&self, file: &CleanedFile) -> Result<ImportResult> {
        let schema = self.catalog.get_schema(&file.table_name)?;
        let records = self.source.read_cleaned(file, schema).await?;

        let table = TableSpec::for_schema(schema);
        let mut conn = self.store.connect()?;
        let result = self.importer.import(&mut conn, &table, &records, self.mode)?;
        Ok(result)
    }

    /// Import every cleaned file found by the source. A file that fails is
    /// logged and skipped; the others still load.
    pub async fn import_all(&self) -> Result<BatchImportStats> {
        let files = self.source.list_cleaned().await?;
        let mut stats = BatchImportStats::default();

        for file in &files {
            match self.import_file(file).await {
                Ok(result) => stats.results.push(result),
                Err(e) => {
                    error!(file = %file.path.display(), table = %file.table_name, error = %e, "import failed");
                    stats.skipped.push((file.table_name.clone(), e.to_string()));
                }
            }
        }

        info!(
            tables = stats.results.len(),
            skipped = stats.skipped.len(),
            imported = stats.rows_imported(),
            failed = stats.rows_failed(),
            mode = %self.mode,
            database = %self.store.path().display(),
            "import run finished"
        );
        Ok(stats)
    }
}
