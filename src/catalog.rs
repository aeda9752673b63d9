//! Catalog records consumed by the emitters, and the catalog interface used
//! by filter validation.
//!
//! Records are produced by a catalog-query layer outside this crate. String
//! fields are trusted as-is: the emitters do not validate or re-quote them
//! unless documented otherwise.
use crate::metadata::MetadataMap;
use crate::types::{BackupError, Oid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::prelude::*;

/// A time window during which a role may not log in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConstraint {
    pub start_day: u32,
    pub start_time: String,
    pub end_day: u32,
    pub end_time: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub oid: Oid,
    pub name: String,
    pub superuser: bool,
    pub inherit: bool,
    pub create_role: bool,
    pub create_db: bool,
    pub can_login: bool,
    /// -1 means no limit.
    pub connection_limit: i64,
    /// Already encrypted; emitted verbatim.
    pub password: String,
    pub valid_until: String,
    pub res_queue: String,
    pub ext_http: bool,
    pub ext_gpfdist_readable: bool,
    pub ext_gpfdist_writable: bool,
    pub ext_hdfs_readable: bool,
    pub ext_hdfs_writable: bool,
    pub time_constraints: Vec<TimeConstraint>,
}

impl Default for Role {
    fn default() -> Self {
        Role {
            oid: 0,
            name: String::new(),
            superuser: false,
            inherit: true,
            create_role: false,
            create_db: false,
            can_login: false,
            connection_limit: -1,
            password: String::new(),
            valid_until: String::new(),
            res_queue: String::from("pg_default"),
            ext_http: false,
            ext_gpfdist_readable: false,
            ext_gpfdist_writable: false,
            ext_hdfs_readable: false,
            ext_hdfs_writable: false,
            time_constraints: Vec::new(),
        }
    }
}

/// Membership of `member` in `role`. All names are already quoted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMember {
    pub role: String,
    pub member: String,
    pub grantor: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tablespace {
    pub oid: Oid,
    pub tablespace: String,
    pub filespace: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQueue {
    pub oid: Oid,
    pub name: String,
    /// -1 means unlimited.
    pub active_statements: i64,
    /// Decimal text as stored in the catalog; -1 means unlimited.
    pub max_cost: String,
    pub cost_overcommit: bool,
    /// Decimal text as stored in the catalog.
    pub min_cost: String,
    pub priority: String,
    /// "-1" means unlimited.
    pub memory_limit: String,
}

impl Default for ResourceQueue {
    fn default() -> Self {
        ResourceQueue {
            oid: 0,
            name: String::new(),
            active_statements: -1,
            max_cost: String::from("-1.00"),
            cost_overcommit: false,
            min_cost: String::from("0.00"),
            priority: String::from("medium"),
            memory_limit: String::from("-1"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub oid: Oid,
    pub name: String,
    pub cpu_rate_limit: i64,
    pub memory_limit: i64,
    pub concurrency: i64,
    pub memory_shared_quota: i64,
    pub memory_spill_ratio: i64,
}

/// A database in the cluster. `name` is already quoted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseName {
    pub oid: Oid,
    pub name: String,
    pub tablespace: String,
}

/// Settings of the backup session that a restore must reproduce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGucs {
    pub client_encoding: String,
    pub default_with_oids: String,
}

impl Default for SessionGucs {
    fn default() -> Self {
        SessionGucs {
            client_encoding: String::from("UTF8"),
            default_with_oids: String::from("off"),
        }
    }
}

/// Everything the global section is built from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalObjects {
    pub session_gucs: SessionGucs,
    pub databases: Vec<DatabaseName>,
    pub database_metadata: MetadataMap,
    /// Per-database settings, e.g. `search_path TO public`.
    pub database_gucs: Vec<String>,
    pub resource_queues: Vec<ResourceQueue>,
    pub resource_queue_metadata: MetadataMap,
    pub resource_groups: Vec<ResourceGroup>,
    pub resource_group_metadata: MetadataMap,
    pub roles: Vec<Role>,
    pub role_metadata: MetadataMap,
    pub role_members: Vec<RoleMember>,
    pub tablespaces: Vec<Tablespace>,
    pub tablespace_metadata: MetadataMap,
}

/// Position of a table in a partition hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionLevel {
    #[serde(rename = "p")]
    Parent,
    #[serde(rename = "i")]
    Intermediate,
    #[serde(rename = "l")]
    Leaf,
}

/// A table known to the catalog, by schema-qualified name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub oid: Oid,
    pub name: String,
}

/// Lookups the filter validator needs from the live catalog.
pub trait Catalog {
    /// Return those of `schemas` that exist.
    fn existing_schemas(&self, schemas: &[String]) -> Result<Vec<String>, BackupError>;

    /// Return those of `tables` that exist. Names are `schema.table`.
    fn existing_tables(&self, tables: &[String]) -> Result<Vec<Relation>, BackupError>;

    /// Partition level of every table that takes part in a partition
    /// hierarchy. Tables that are not partitioned are absent.
    fn partition_levels(&self) -> Result<HashMap<Oid, PartitionLevel>, BackupError>;
}

/// A catalog captured as a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub globals: GlobalObjects,
    pub schemas: Vec<String>,
    pub tables: Vec<Relation>,
    pub partitions: HashMap<Oid, PartitionLevel>,
}

impl CatalogSnapshot {
    pub fn read_from(f: &mut (impl Read + ?Sized)) -> Result<CatalogSnapshot, BackupError> {
        serde_json::from_reader(f).map_err(|e| BackupError::Catalog(e.to_string()))
    }
}

impl Catalog for CatalogSnapshot {
    fn existing_schemas(&self, schemas: &[String]) -> Result<Vec<String>, BackupError> {
        Ok(self
            .schemas
            .iter()
            .filter(|s| schemas.contains(s))
            .cloned()
            .collect())
    }

    fn existing_tables(&self, tables: &[String]) -> Result<Vec<Relation>, BackupError> {
        Ok(self
            .tables
            .iter()
            .filter(|t| tables.contains(&t.name))
            .cloned()
            .collect())
    }

    fn partition_levels(&self) -> Result<HashMap<Oid, PartitionLevel>, BackupError> {
        Ok(self.partitions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_snapshot() -> Result<(), BackupError> {
        let mut input = &br#"{
            "globals": {
                "session_gucs": {"client_encoding": "UTF8", "default_with_oids": "off"},
                "roles": [{"oid": 10, "name": "gpadmin", "superuser": true, "can_login": true}],
                "role_metadata": {"10": {"comment": "admin"}},
                "resource_queues": [{"oid": 6055, "name": "pg_default", "active_statements": 20}]
            },
            "schemas": ["public"],
            "tables": [{"oid": 16384, "name": "public.sales"}],
            "partitions": {"16384": "p"}
        }"#[..];

        let snapshot = CatalogSnapshot::read_from(&mut input)?;
        let role = &snapshot.globals.roles[0];
        assert!(role.superuser);
        assert!(role.inherit);
        assert_eq!(role.connection_limit, -1);
        assert_eq!(role.res_queue, "pg_default");
        assert_eq!(snapshot.globals.role_metadata[&10].comment, "admin");

        let queue = &snapshot.globals.resource_queues[0];
        assert_eq!(queue.active_statements, 20);
        assert_eq!(queue.memory_limit, "-1");

        assert_eq!(
            snapshot.partition_levels()?.get(&16384),
            Some(&PartitionLevel::Parent)
        );
        Ok(())
    }

    #[test]
    fn snapshot_lookups() -> Result<(), BackupError> {
        let snapshot = CatalogSnapshot {
            schemas: vec![String::from("public"), String::from("sales")],
            tables: vec![
                Relation {
                    oid: 1,
                    name: String::from("public.t1"),
                },
                Relation {
                    oid: 2,
                    name: String::from("public.t2"),
                },
            ],
            ..Default::default()
        };

        assert_eq!(
            snapshot.existing_schemas(&[String::from("sales"), String::from("nope")])?,
            vec![String::from("sales")]
        );
        assert_eq!(
            snapshot.existing_tables(&[String::from("public.t2")])?,
            vec![Relation {
                oid: 2,
                name: String::from("public.t2"),
            }]
        );
        Ok(())
    }

    #[test]
    fn malformed_snapshot_is_a_catalog_error() {
        let mut input = &b"{\"schemas\": 3}"[..];
        assert!(matches!(
            CatalogSnapshot::read_from(&mut input),
            Err(BackupError::Catalog(_))
        ));
    }
}
