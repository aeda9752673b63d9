use chrono::Local;
use clap::Parser;
use gpglobals::{
    read_table_file, validate_flag_combinations, validate_run, write_sections, BackupError,
    BackupOptions, CatalogSnapshot, Section, SectionWriters,
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};

/// Back up cluster-wide metadata with a table of contents.
#[derive(Parser, Debug)]
#[command(name = "gpglobals", version)]
struct Cli {
    /// Catalog snapshot to read objects from.
    #[arg(long)]
    catalog: PathBuf,
    /// Database to back up.
    #[arg(long)]
    dbname: Option<String>,
    /// Directory for the output files. Defaults to the current directory.
    #[arg(long)]
    backup_dir: Option<PathBuf>,
    #[arg(long = "include-schema")]
    include_schema: Vec<String>,
    #[arg(long = "exclude-schema")]
    exclude_schema: Vec<String>,
    #[arg(long)]
    include_table_file: Option<PathBuf>,
    #[arg(long)]
    exclude_table_file: Option<PathBuf>,
    #[arg(long)]
    data_only: bool,
    #[arg(long)]
    metadata_only: bool,
    #[arg(long)]
    leaf_partition_data: bool,
    #[arg(long)]
    single_data_file: bool,
    #[arg(long)]
    no_compression: bool,
    #[arg(long, allow_negative_numbers = true)]
    compression_level: Option<i32>,
    /// Also back up the metadata of all other databases.
    #[arg(long)]
    globals: bool,
    #[arg(long)]
    debug: bool,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    /// Build the backup options. Flag combinations are checked before the
    /// table files are read.
    fn options(&self) -> Result<BackupOptions, BackupError> {
        let mut options = BackupOptions {
            dbname: self.dbname.clone(),
            backup_dir: self.backup_dir.clone(),
            include_schemas: self.include_schema.clone(),
            exclude_schemas: self.exclude_schema.clone(),
            include_table_file: self.include_table_file.clone(),
            exclude_table_file: self.exclude_table_file.clone(),
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            data_only: self.data_only,
            metadata_only: self.metadata_only,
            leaf_partition_data: self.leaf_partition_data,
            single_data_file: self.single_data_file,
            no_compression: self.no_compression,
            compression_level: self.compression_level,
            globals: self.globals,
            debug: self.debug,
            quiet: self.quiet,
            verbose: self.verbose,
        };
        validate_flag_combinations(&options)?;

        if let Some(path) = &self.include_table_file {
            options.include_tables = read_table_file(path)?;
        }
        if let Some(path) = &self.exclude_table_file {
            options.exclude_tables = read_table_file(path)?;
        }
        Ok(options)
    }
}

fn output_path(dir: &Path, timestamp: &str, name: &str) -> PathBuf {
    dir.join(format!("gpbackup_{}_{}", timestamp, name))
}

fn write_backup(
    options: &BackupOptions,
    catalog: &CatalogSnapshot,
    section_paths: &[PathBuf; 4],
    toc_path: &Path,
) -> Result<(), BackupError> {
    let open = |path: &PathBuf| -> Result<BufWriter<File>, BackupError> {
        Ok(BufWriter::new(File::create(path)?))
    };
    let mut writers = SectionWriters::new(
        open(&section_paths[0])?,
        open(&section_paths[1])?,
        open(&section_paths[2])?,
        open(&section_paths[3])?,
    );
    let toc = write_sections(options, &catalog.globals, &mut writers)?;

    let mut toc_file = BufWriter::new(File::create(toc_path)?);
    toc.write_to(&mut toc_file)?;
    toc_file.flush()?;
    Ok(())
}

fn remove_partial_output(paths: &[&Path]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove partial output")
            }
        }
    }
}

/// Write all section files and the table of contents. On failure every
/// file that may have been created is removed again.
fn write_outputs(
    options: &BackupOptions,
    catalog: &CatalogSnapshot,
    section_paths: &[PathBuf; 4],
    toc_path: &Path,
) -> Result<(), BackupError> {
    if let Err(e) = write_backup(options, catalog, section_paths, toc_path) {
        let mut paths: Vec<&Path> = section_paths.iter().map(PathBuf::as_path).collect();
        paths.push(toc_path);
        remove_partial_output(&paths);
        return Err(e);
    }
    Ok(())
}

fn run(options: &BackupOptions, catalog_path: &Path) -> Result<(), BackupError> {
    let catalog = CatalogSnapshot::read_from(&mut File::open(catalog_path)?)?;
    validate_run(options, &catalog)?;

    let dir = options
        .backup_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    info!(timestamp = %timestamp, dir = %dir.display(), "starting backup");

    let section_paths =
        Section::ALL.map(|s| output_path(&dir, &timestamp, &format!("{}.sql", s.file_name())));
    let toc_path = output_path(&dir, &timestamp, "toc.json");
    write_outputs(options, &catalog, &section_paths, &toc_path)?;
    info!(path = %toc_path.display(), "wrote table of contents");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let options = match cli.options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(options.log_level())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&options, &cli.catalog) {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogSnapshot {
        let mut catalog = CatalogSnapshot::default();
        catalog.globals.databases.push(gpglobals::DatabaseName {
            oid: 1,
            name: String::from("\"testdb\""),
            tablespace: String::from("pg_default"),
        });
        catalog
    }

    fn options() -> BackupOptions {
        BackupOptions {
            dbname: Some(String::from("testdb")),
            ..Default::default()
        }
    }

    #[test]
    fn flags_are_checked_before_table_files() {
        let cli = Cli::parse_from([
            "gpglobals",
            "--catalog",
            "catalog.json",
            "--include-table-file",
            "/nonexistent/tables.txt",
        ]);
        assert!(matches!(cli.options(), Err(BackupError::MissingFlag(f)) if f == "dbname"));

        let cli = Cli::parse_from([
            "gpglobals",
            "--catalog",
            "catalog.json",
            "--dbname",
            "testdb",
            "--include-schema",
            "public",
            "--include-table-file",
            "/nonexistent/tables.txt",
        ]);
        assert!(matches!(cli.options(), Err(BackupError::ConflictingFlags(_))));
    }

    #[test]
    fn table_files_are_read() -> Result<(), BackupError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tables.txt");
        fs::write(&path, "public.t1\n")?;
        let path = path.to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "gpglobals",
            "--catalog",
            "catalog.json",
            "--dbname",
            "testdb",
            "--exclude-table-file",
            path.as_str(),
        ]);
        assert_eq!(cli.options()?.exclude_tables, vec![String::from("public.t1")]);
        Ok(())
    }

    #[test]
    fn writes_sections_and_toc() -> Result<(), BackupError> {
        let dir = tempfile::tempdir()?;
        let section_paths =
            Section::ALL.map(|s| output_path(dir.path(), "20240101000000", s.file_name()));
        let toc_path = output_path(dir.path(), "20240101000000", "toc.json");
        write_outputs(&options(), &catalog(), &section_paths, &toc_path)?;

        for path in &section_paths {
            assert!(path.exists());
        }
        assert!(toc_path.exists());
        Ok(())
    }

    #[test]
    fn failed_toc_write_removes_sections() -> Result<(), BackupError> {
        let dir = tempfile::tempdir()?;
        let section_paths =
            Section::ALL.map(|s| output_path(dir.path(), "20240101000000", s.file_name()));
        let toc_path = dir.path().join("missing").join("toc.json");

        let result = write_outputs(&options(), &catalog(), &section_paths, &toc_path);
        assert!(matches!(result, Err(BackupError::IOError(_))));
        for path in &section_paths {
            assert!(!path.exists(), "{} was left behind", path.display());
        }
        Ok(())
    }

    #[test]
    fn failed_section_create_removes_earlier_sections() -> Result<(), BackupError> {
        let dir = tempfile::tempdir()?;
        let mut section_paths =
            Section::ALL.map(|s| output_path(dir.path(), "20240101000000", s.file_name()));
        section_paths[2] = dir.path().join("missing").join("postdata.sql");
        let toc_path = output_path(dir.path(), "20240101000000", "toc.json");

        let result = write_outputs(&options(), &catalog(), &section_paths, &toc_path);
        assert!(matches!(result, Err(BackupError::IOError(_))));
        assert!(!section_paths[0].exists());
        assert!(!section_paths[1].exists());
        assert!(!toc_path.exists());
        Ok(())
    }
}
