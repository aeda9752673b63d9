//! A complete backup run.
//!
//! All checks run before the first byte is written. After that every section
//! is written by its own worker with its own [`Toc`]; the tables of contents
//! are merged once all workers are done. Any error ends the run without a
//! table of contents.
use crate::catalog::{Catalog, GlobalObjects};
use crate::globals::{
    print_create_database_statement, print_create_resource_group_statements,
    print_create_resource_queue_statements, print_create_role_statements,
    print_create_tablespace_statements, print_database_gucs, print_role_membership_statements,
    print_session_gucs,
};
use crate::io::ByteCountWriter;
use crate::options::BackupOptions;
use crate::toc::Toc;
use crate::types::{BackupError, Section};
use crate::validate::{validate_filter_lists, validate_flag_combinations, validate_flag_values};
use std::io::prelude::*;
use std::panic;
use std::thread;
use tracing::{debug, info};

/// Output streams, one per section.
#[derive(Debug)]
pub struct SectionWriters<W: Write> {
    pub global: ByteCountWriter<W>,
    pub predata: ByteCountWriter<W>,
    pub postdata: ByteCountWriter<W>,
    pub statistics: ByteCountWriter<W>,
}

impl<W: Write> SectionWriters<W> {
    pub fn new(global: W, predata: W, postdata: W, statistics: W) -> SectionWriters<W> {
        SectionWriters {
            global: ByteCountWriter::new(global),
            predata: ByteCountWriter::new(predata),
            postdata: ByteCountWriter::new(postdata),
            statistics: ByteCountWriter::new(statistics),
        }
    }

    pub fn get(&self, section: Section) -> &ByteCountWriter<W> {
        match section {
            Section::Global => &self.global,
            Section::Predata => &self.predata,
            Section::Postdata => &self.postdata,
            Section::Statistics => &self.statistics,
        }
    }
}

/// Run the flag checks and the filter checks.
pub fn validate_run(options: &BackupOptions, catalog: &dyn Catalog) -> Result<(), BackupError> {
    debug!("validating flags");
    validate_flag_combinations(options)?;
    validate_flag_values(options)?;
    validate_filter_lists(catalog, options)?;
    Ok(())
}

/// Write the global section.
///
/// Tablespaces come before the database, which may be created in one of
/// them. Roles and resource management are skipped when the backup is
/// restricted to a set of schemas.
pub fn backup_global_section<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    dbname: &str,
    globals: &GlobalObjects,
    options: &BackupOptions,
) -> Result<(), BackupError> {
    print_session_gucs(out, toc, Section::Global, &globals.session_gucs)?;

    debug!(count = globals.tablespaces.len(), "writing CREATE TABLESPACE statements");
    print_create_tablespace_statements(out, toc, &globals.tablespaces, &globals.tablespace_metadata)?;

    debug!(database = dbname, "writing CREATE DATABASE statement");
    print_create_database_statement(
        out,
        toc,
        dbname,
        &globals.databases,
        &globals.database_metadata,
        options.globals,
    )?;
    print_database_gucs(out, toc, &globals.database_gucs, dbname)?;

    if !options.include_schemas.is_empty() {
        info!("schema filter given, skipping roles and resource management");
        return Ok(());
    }

    debug!(count = globals.resource_queues.len(), "writing resource queue statements");
    print_create_resource_queue_statements(
        out,
        toc,
        &globals.resource_queues,
        &globals.resource_queue_metadata,
    )?;
    debug!(count = globals.resource_groups.len(), "writing resource group statements");
    print_create_resource_group_statements(
        out,
        toc,
        &globals.resource_groups,
        &globals.resource_group_metadata,
    )?;
    debug!(count = globals.roles.len(), "writing CREATE ROLE statements");
    print_create_role_statements(out, toc, &globals.roles, &globals.role_metadata)?;
    debug!(count = globals.role_members.len(), "writing GRANT statements");
    print_role_membership_statements(out, toc, &globals.role_members)?;
    Ok(())
}

/// Validate, then write all four sections and return the table of contents.
pub fn run_backup<W: Write + Send>(
    options: &BackupOptions,
    catalog: &dyn Catalog,
    globals: &GlobalObjects,
    writers: &mut SectionWriters<W>,
) -> Result<Toc, BackupError> {
    validate_run(options, catalog)?;
    write_sections(options, globals, writers)
}

/// Write all four sections, each from its own thread, and return the merged
/// table of contents. `options` must have passed [`validate_run`].
pub fn write_sections<W: Write + Send>(
    options: &BackupOptions,
    globals: &GlobalObjects,
    writers: &mut SectionWriters<W>,
) -> Result<Toc, BackupError> {
    let dbname = options
        .dbname
        .as_deref()
        .ok_or_else(|| BackupError::MissingFlag(String::from("dbname")))?;

    let SectionWriters {
        global,
        predata,
        postdata,
        statistics,
    } = writers;

    let results = thread::scope(|s| {
        let global_worker = s.spawn(move || -> Result<Toc, BackupError> {
            let mut toc = Toc::new();
            backup_global_section(global, &mut toc, dbname, globals, options)?;
            global.flush()?;
            Ok(toc)
        });
        let preamble_workers: Vec<_> = [
            (Section::Predata, predata),
            (Section::Postdata, postdata),
            (Section::Statistics, statistics),
        ]
        .into_iter()
        .map(|(section, out)| {
            s.spawn(move || -> Result<Toc, BackupError> {
                let mut toc = Toc::new();
                print_session_gucs(out, &mut toc, section, &globals.session_gucs)?;
                out.flush()?;
                Ok(toc)
            })
        })
        .collect();

        std::iter::once(global_worker)
            .chain(preamble_workers)
            .map(|worker| worker.join())
            .collect::<Vec<_>>()
    });

    let mut toc = Toc::new();
    for result in results {
        match result {
            Ok(section_toc) => toc.merge(section_toc?),
            Err(e) => panic::resume_unwind(e),
        }
    }
    toc.validate()?;

    info!(
        global = toc.entries(Section::Global).len(),
        predata = toc.entries(Section::Predata).len(),
        postdata = toc.entries(Section::Postdata).len(),
        statistics = toc.entries(Section::Statistics).len(),
        "backup complete"
    );
    Ok(toc)
}
