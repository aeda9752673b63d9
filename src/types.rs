use std::fmt;
use std::io;
use thiserror::Error;

/// Catalog object identifier.
pub type Oid = u32;

/// Error type used for backup errors.
///
/// There is no recoverable error in this crate: every variant aborts the
/// run, and any output written before the failure must be discarded.
#[derive(Error, Debug)]
pub enum BackupError {
    /// An IO error occured while writing an output stream or the table of
    /// contents.
    #[error("IO error writing data")]
    IOError(#[from] io::Error),
    /// A catalog record held a value that can not be interpreted. This should
    /// only happen if the catalog-query layer has a bug.
    #[error("catalog data error: {0}")]
    InvalidCatalogData(String),
    /// The catalog-query layer failed.
    #[error("catalog error: {0}")]
    Catalog(String),
    /// A mandatory flag was not given.
    #[error("Flag --{0} must be set")]
    MissingFlag(String),
    /// Flags that exclude each other were combined.
    #[error("The following flags may not be specified together: {}", .0.join(", "))]
    ConflictingFlags(Vec<String>),
    #[error("invalid flag value: {0}")]
    InvalidFlagValue(String),
    #[error("Schema {0} does not exist")]
    SchemaNotFound(String),
    #[error("Table {0} does not exist")]
    TableNotFound(String),
    /// A filter table name is not of the form `schema.table`.
    #[error("Table {0} is not correctly fully-qualified.  Please ensure that it is in the format schema.table and that it is properly quoted.")]
    InvalidTableName(String),
    #[error("Cannot filter on {0}, as it is an intermediate partition table.  Only parent partition tables and leaf partition tables may be specified.")]
    IntermediatePartition(String),
    /// The table of contents could not be encoded, decoded or is inconsistent.
    #[error("table of contents error: {0}")]
    TocFormat(String),
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> BackupError {
        BackupError::TocFormat(e.to_string())
    }
}

/// Enumeration of output sections.
///
/// Every section is written to its own stream, and every table of contents
/// entry belongs to exactly one section. Restore processes the sections in
/// this order:
///
/// 1. Global
/// 1. Predata
/// 1. Postdata
/// 1. Statistics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Section {
    /// Cluster-wide objects: roles, databases, tablespaces, resource
    /// management.
    Global = 1,
    /// Entries that must be processed before table data is loaded.
    Predata,
    /// Entries that must be processed after table data is loaded.
    Postdata,
    /// Planner statistics.
    Statistics,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Global,
        Section::Predata,
        Section::Postdata,
        Section::Statistics,
    ];

    /// Name used for the section's output file.
    pub fn file_name(&self) -> &'static str {
        match self {
            Section::Global => "global",
            Section::Predata => "predata",
            Section::Postdata => "postdata",
            Section::Statistics => "statistics",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Quote an identifier for use in SQL.
///
/// The result is always double-quoted, with embedded double quotes doubled.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
