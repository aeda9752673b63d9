//! Backup of Greenplum cluster-wide metadata
//!
//! This crate writes the roles, role memberships, databases, tablespaces,
//! resource queues, resource groups and session settings of a cluster as
//! SQL statements, and builds a table of contents that records the exact
//! byte range each object occupies in its output stream. A restore can use
//! the table of contents to replay any subset of the objects without parsing
//! the statements.
//!
//! ```rust
//! use gpglobals::{print_create_role_statements, ByteCountWriter, MetadataMap, Role, Section, Toc};
//!
//! let mut out = ByteCountWriter::new(Vec::new());
//! let mut toc = Toc::new();
//! let role = Role {
//!     name: String::from("r"),
//!     superuser: true,
//!     ..Default::default()
//! };
//! print_create_role_statements(&mut out, &mut toc, &[role], &MetadataMap::new()).unwrap();
//!
//! let entry = toc.find_entry(Section::Global, "ROLE", "r").unwrap();
//! assert_eq!(entry.start_byte, 0);
//! assert_eq!(entry.end_byte, out.byte_count());
//! ```
mod backup;
mod catalog;
mod globals;
mod io;
mod metadata;
mod options;
mod toc;
mod types;
mod validate;

pub use backup::{
    backup_global_section, run_backup, validate_run, write_sections, SectionWriters,
};
pub use catalog::{
    Catalog, CatalogSnapshot, DatabaseName, GlobalObjects, PartitionLevel, Relation,
    ResourceGroup, ResourceQueue, Role, RoleMember, SessionGucs, Tablespace, TimeConstraint,
};
pub use globals::{
    print_create_database_statement, print_create_resource_group_statements,
    print_create_resource_queue_statements, print_create_role_statements,
    print_create_tablespace_statements, print_database_gucs, print_role_membership_statements,
    print_session_gucs,
};
pub use io::ByteCountWriter;
pub use metadata::{print_object_metadata, AclEntry, MetadataMap, ObjectMetadata};
pub use options::{read_table_file, BackupOptions};
pub use toc::{Toc, TocEntry};
pub use types::{quote_ident, BackupError, Oid, Section};
pub use validate::{
    validate_compression_level, validate_filter_lists, validate_filter_schemas,
    validate_filter_tables, validate_flag_combinations, validate_flag_values, validate_fqns,
};
