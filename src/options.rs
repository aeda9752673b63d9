use crate::types::BackupError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// User supplied options for a backup run.
///
/// `None`, `false` and empty lists mean the corresponding flag was not
/// given. The flag checks only look at which flags
/// are present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub dbname: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_table_file: Option<PathBuf>,
    pub exclude_table_file: Option<PathBuf>,
    /// Tables read from `include_table_file`, as `schema.table`.
    pub include_tables: Vec<String>,
    /// Tables read from `exclude_table_file`, as `schema.table`.
    pub exclude_tables: Vec<String>,
    pub data_only: bool,
    pub metadata_only: bool,
    pub leaf_partition_data: bool,
    pub single_data_file: bool,
    pub no_compression: bool,
    pub compression_level: Option<i32>,
    /// Also back up the metadata of every other database in the cluster.
    pub globals: bool,
    pub debug: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl BackupOptions {
    /// Command line names of the flags that were given.
    pub fn set_flags(&self) -> Vec<&'static str> {
        let flags = [
            ("dbname", self.dbname.is_some()),
            ("backup-dir", self.backup_dir.is_some()),
            ("include-schema", !self.include_schemas.is_empty()),
            ("exclude-schema", !self.exclude_schemas.is_empty()),
            ("include-table-file", self.include_table_file.is_some()),
            ("exclude-table-file", self.exclude_table_file.is_some()),
            ("data-only", self.data_only),
            ("metadata-only", self.metadata_only),
            ("leaf-partition-data", self.leaf_partition_data),
            ("single-data-file", self.single_data_file),
            ("no-compression", self.no_compression),
            ("compression-level", self.compression_level.is_some()),
            ("globals", self.globals),
            ("debug", self.debug),
            ("quiet", self.quiet),
            ("verbose", self.verbose),
        ];
        flags
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::TRACE
        } else if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

/// Read a table filter file: one `schema.table` per line, blank lines
/// ignored.
pub fn read_table_file(path: &Path) -> Result<Vec<String>, BackupError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
