//! Checks that run before anything is written.
//!
//! Every check fails on the first problem it finds and names the exact
//! schema, table or flag at fault.
use crate::catalog::{Catalog, PartitionLevel};
use crate::options::BackupOptions;
use crate::types::{BackupError, Oid};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Groups of flags of which at most one may be given.
const EXCLUSIVE_FLAGS: &[&[&str]] = &[
    &["debug", "quiet", "verbose"],
    &["data-only", "metadata-only"],
    &["include-schema", "include-table-file"],
    &["exclude-schema", "include-schema"],
    &["exclude-schema", "exclude-table-file", "include-table-file"],
    &["exclude-table-file", "leaf-partition-data"],
    &["metadata-only", "leaf-partition-data"],
    &["metadata-only", "single-data-file"],
    &["no-compression", "compression-level"],
];

const MANDATORY_FLAGS: &[&str] = &["dbname"];

/// Check which flags were combined. Does not look at flag values.
pub fn validate_flag_combinations(options: &BackupOptions) -> Result<(), BackupError> {
    let set = options.set_flags();
    for flag in MANDATORY_FLAGS {
        if !set.contains(flag) {
            return Err(BackupError::MissingFlag(flag.to_string()));
        }
    }
    for group in EXCLUSIVE_FLAGS {
        let given: Vec<String> = group
            .iter()
            .filter(|f| set.contains(f))
            .map(|f| f.to_string())
            .collect();
        if given.len() > 1 {
            return Err(BackupError::ConflictingFlags(given));
        }
    }
    Ok(())
}

pub fn validate_compression_level(level: i32) -> Result<(), BackupError> {
    // 0 is the default and means no level was chosen
    if !(0..=9).contains(&level) {
        return Err(BackupError::InvalidFlagValue(String::from(
            "Compression level must be between 1 and 9",
        )));
    }
    Ok(())
}

pub fn validate_flag_values(options: &BackupOptions) -> Result<(), BackupError> {
    if let Some(dir) = &options.backup_dir {
        if !dir.is_absolute() {
            return Err(BackupError::InvalidFlagValue(format!(
                "Absolute path required for backup directory: {}",
                dir.display()
            )));
        }
    }
    if let Some(level) = options.compression_level {
        validate_compression_level(level)?;
    }
    Ok(())
}

fn is_valid_ident(ident: &str) -> bool {
    if ident.len() > 2 && ident.starts_with('"') && ident.ends_with('"') {
        return true;
    }
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Check that every name is a schema-qualified table name. Each part is
/// either a lowercase identifier or a double-quoted one.
pub fn validate_fqns(tables: &[String]) -> Result<(), BackupError> {
    for table in tables {
        let valid = table
            .match_indices('.')
            .any(|(i, _)| is_valid_ident(&table[..i]) && is_valid_ident(&table[i + 1..]));
        if !valid {
            return Err(BackupError::InvalidTableName(table.clone()));
        }
    }
    Ok(())
}

/// Check that every schema in `schemas` exists.
pub fn validate_filter_schemas(
    catalog: &dyn Catalog,
    schemas: &[String],
) -> Result<(), BackupError> {
    if schemas.is_empty() {
        return Ok(());
    }
    let found = catalog.existing_schemas(schemas)?;
    if found.len() < schemas.len() {
        let found: HashSet<&str> = found.iter().map(String::as_str).collect();
        if let Some(missing) = schemas.iter().find(|s| !found.contains(s.as_str())) {
            return Err(BackupError::SchemaNotFound(missing.clone()));
        }
    }
    Ok(())
}

/// Check that every table in `tables` exists and is not an intermediate
/// partition.
pub fn validate_filter_tables(catalog: &dyn Catalog, tables: &[String]) -> Result<(), BackupError> {
    if tables.is_empty() {
        return Ok(());
    }
    validate_fqns(tables)?;
    let found: HashMap<String, Oid> = catalog
        .existing_tables(tables)?
        .into_iter()
        .map(|r| (r.name, r.oid))
        .collect();
    let partitions = catalog.partition_levels()?;
    for table in tables {
        let oid = found
            .get(table)
            .ok_or_else(|| BackupError::TableNotFound(table.clone()))?;
        if partitions.get(oid) == Some(&PartitionLevel::Intermediate) {
            return Err(BackupError::IntermediatePartition(table.clone()));
        }
    }
    Ok(())
}

pub fn validate_filter_lists(
    catalog: &dyn Catalog,
    options: &BackupOptions,
) -> Result<(), BackupError> {
    debug!("validating schema and table filters");
    validate_filter_schemas(catalog, &options.exclude_schemas)?;
    validate_filter_schemas(catalog, &options.include_schemas)?;
    validate_filter_tables(catalog, &options.exclude_tables)?;
    validate_filter_tables(catalog, &options.include_tables)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, Relation};
    use std::path::PathBuf;

    fn options() -> BackupOptions {
        BackupOptions {
            dbname: Some(String::from("testdb")),
            ..Default::default()
        }
    }

    fn catalog() -> CatalogSnapshot {
        let tables = [
            (1, "public.t1"),
            (2, "public.sales"),
            (3, "public.sales_1_prt_2010"),
            (4, "public.sales_1_prt_2010_2_prt_jan"),
            (5, "\"Mixed\".\"Case\""),
        ];
        CatalogSnapshot {
            schemas: vec![String::from("public"), String::from("\"Mixed\"")],
            tables: tables
                .iter()
                .map(|(oid, name)| Relation {
                    oid: *oid,
                    name: name.to_string(),
                })
                .collect(),
            partitions: HashMap::from([
                (2, PartitionLevel::Parent),
                (3, PartitionLevel::Intermediate),
                (4, PartitionLevel::Leaf),
            ]),
            ..Default::default()
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn dbname_is_mandatory() {
        assert!(matches!(
            validate_flag_combinations(&BackupOptions::default()),
            Err(BackupError::MissingFlag(flag)) if flag == "dbname"
        ));
        assert!(validate_flag_combinations(&options()).is_ok());
    }

    #[test]
    fn exclusive_flags() {
        let conflicts = [
            BackupOptions {
                data_only: true,
                metadata_only: true,
                ..options()
            },
            BackupOptions {
                include_schemas: names(&["public"]),
                exclude_schemas: names(&["other"]),
                ..options()
            },
            BackupOptions {
                no_compression: true,
                compression_level: Some(3),
                ..options()
            },
            BackupOptions {
                metadata_only: true,
                single_data_file: true,
                ..options()
            },
        ];
        for o in conflicts {
            assert!(
                matches!(validate_flag_combinations(&o), Err(BackupError::ConflictingFlags(_))),
                "{:?} should conflict",
                o.set_flags()
            );
        }
    }

    #[test]
    fn conflict_names_the_given_flags() {
        let o = BackupOptions {
            debug: true,
            verbose: true,
            ..options()
        };
        match validate_flag_combinations(&o) {
            Err(BackupError::ConflictingFlags(flags)) => {
                assert_eq!(flags, vec!["debug", "verbose"])
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn compatible_flags() {
        let o = BackupOptions {
            include_schemas: names(&["public"]),
            metadata_only: true,
            compression_level: Some(5),
            globals: true,
            verbose: true,
            ..options()
        };
        assert!(validate_flag_combinations(&o).is_ok());
    }

    #[test]
    fn flag_values() {
        assert!(validate_compression_level(0).is_ok());
        assert!(validate_compression_level(9).is_ok());
        assert!(validate_compression_level(10).is_err());
        assert!(validate_compression_level(-1).is_err());

        let o = BackupOptions {
            backup_dir: Some(PathBuf::from("relative/dir")),
            ..options()
        };
        assert!(matches!(
            validate_flag_values(&o),
            Err(BackupError::InvalidFlagValue(_))
        ));
        let o = BackupOptions {
            backup_dir: Some(PathBuf::from("/data/backups")),
            compression_level: Some(1),
            ..options()
        };
        assert!(validate_flag_values(&o).is_ok());
    }

    #[test]
    fn fqns() {
        assert!(validate_fqns(&names(&["public.t1", "\"Mixed\".\"Case\"", "_s.t_2"])).is_ok());
        assert!(validate_fqns(&names(&["\"a.b\".c"])).is_ok());
        for bad in ["t1", "public.", ".t1", "Public.t1", "public.1t", "\"\".t1", "public.\"\""] {
            assert!(
                matches!(validate_fqns(&names(&[bad])), Err(BackupError::InvalidTableName(n)) if n == bad),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn missing_schema_is_named() {
        let result = validate_filter_schemas(&catalog(), &names(&["public", "nope"]));
        assert!(matches!(result, Err(BackupError::SchemaNotFound(s)) if s == "nope"));
        assert!(validate_filter_schemas(&catalog(), &names(&["public", "\"Mixed\""])).is_ok());
        assert!(validate_filter_schemas(&catalog(), &[]).is_ok());
    }

    #[test]
    fn missing_table_is_named() {
        let result = validate_filter_tables(&catalog(), &names(&["public.t1", "public.missing"]));
        match result {
            Err(e @ BackupError::TableNotFound(_)) => {
                assert_eq!(e.to_string(), "Table public.missing does not exist")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn intermediate_partition_is_rejected() {
        assert!(validate_filter_tables(
            &catalog(),
            &names(&["public.sales", "public.sales_1_prt_2010_2_prt_jan", "public.t1"])
        )
        .is_ok());

        let result = validate_filter_tables(&catalog(), &names(&["public.sales_1_prt_2010"]));
        match result {
            Err(e @ BackupError::IntermediatePartition(_)) => assert_eq!(
                e.to_string(),
                "Cannot filter on public.sales_1_prt_2010, as it is an intermediate partition table.  Only parent partition tables and leaf partition tables may be specified."
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn filter_lists() {
        let o = BackupOptions {
            include_schemas: names(&["public"]),
            exclude_tables: names(&["public.t1"]),
            include_tables: names(&["public.gone"]),
            ..options()
        };
        assert!(matches!(
            validate_filter_lists(&catalog(), &o),
            Err(BackupError::TableNotFound(t)) if t == "public.gone"
        ));
    }
}
