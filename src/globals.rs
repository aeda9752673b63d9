//! Statements for cluster-wide objects.
//!
//! Every function here writes to a [`ByteCountWriter`] and records what it
//! wrote in a [`Toc`]. Global objects always go to [`Section::Global`],
//! except the session settings which are repeated in every section.
use crate::catalog::{
    DatabaseName, ResourceGroup, ResourceQueue, Role, RoleMember, SessionGucs, Tablespace,
};
use crate::io::ByteCountWriter;
use crate::metadata::{print_object_metadata, MetadataMap};
use crate::toc::Toc;
use crate::types::{quote_ident, BackupError, Section};
use std::io::prelude::*;
use tracing::warn;

const DEFAULT_RESOURCE_QUEUE: &str = "pg_default";
const DEFAULT_TABLESPACE: &str = "pg_default";
const DEFAULT_PRIORITY: &str = "medium";
const BUILTIN_RESOURCE_GROUPS: [&str; 2] = ["default_group", "admin_group"];

type Attribute<'a> = (bool, &'a dyn Fn() -> String);

/// Render the attributes whose predicate holds, in list order.
fn render_attributes(attributes: &[Attribute<'_>]) -> Vec<String> {
    attributes
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, render)| render())
        .collect()
}

fn keyword(set: bool, yes: &str, no: &str) -> String {
    let word = if set { yes } else { no };
    word.to_string()
}

/// Write the session settings preamble to `section`.
///
/// The same block is written to every section so each stream can be
/// replayed on its own.
pub fn print_session_gucs<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    section: Section,
    gucs: &SessionGucs,
) -> Result<(), BackupError> {
    toc.emit(out, section, "", "", "SESSION GUCS", |out| {
        write!(
            out,
            "SET statement_timeout = 0;
SET check_function_bodies = false;
SET client_min_messages = error;
SET client_encoding = '{}';
SET standard_conforming_strings = on;
SET default_with_oids = {};
",
            gucs.client_encoding, gucs.default_with_oids
        )
    })
}

/// Write `CREATE DATABASE` for `dbname` and its metadata.
///
/// With `backup_globals` the metadata of every other database in
/// `all_dbs` is written as well, without a `CREATE DATABASE`.
pub fn print_create_database_statement<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    dbname: &str,
    all_dbs: &[DatabaseName],
    db_metadata: &MetadataMap,
    backup_globals: bool,
) -> Result<(), BackupError> {
    let quoted = quote_ident(dbname);
    match all_dbs.iter().find(|db| db.name == quoted) {
        Some(db) => {
            toc.emit(out, Section::Global, "", &quoted, "DATABASE", |out| {
                write!(out, "\n\nCREATE DATABASE {}", quoted)?;
                if db.tablespace != DEFAULT_TABLESPACE {
                    write!(out, " TABLESPACE {}", db.tablespace)?;
                }
                out.write_str(";")
            })?;
            toc.emit(out, Section::Global, "", &quoted, "DATABASE METADATA", |out| {
                print_object_metadata(out, db_metadata.get(&db.oid), &quoted, "DATABASE")
            })?;
        }
        None => warn!(database = %quoted, "database not found in catalog, skipping CREATE DATABASE"),
    }

    if backup_globals {
        for db in all_dbs.iter().filter(|db| db.name != quoted) {
            toc.emit(out, Section::Global, "", &db.name, "DATABASE OTHER", |out| {
                print_object_metadata(out, db_metadata.get(&db.oid), &db.name, "DATABASE")
            })?;
        }
    }
    Ok(())
}

/// Write one `ALTER DATABASE ... SET` per setting.
pub fn print_database_gucs<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    gucs: &[String],
    dbname: &str,
) -> Result<(), BackupError> {
    let quoted = quote_ident(dbname);
    for guc in gucs {
        toc.emit(out, Section::Global, "", dbname, "DATABASE GUC", |out| {
            write!(out, "\nALTER DATABASE {} SET {};", quoted, guc)
        })?;
    }
    Ok(())
}

fn parse_cost(queue: &ResourceQueue, field: &str, value: &str) -> Result<f64, BackupError> {
    value.parse::<f64>().map_err(|e| {
        BackupError::InvalidCatalogData(format!(
            "resource queue {}: invalid {} {:?}: {}",
            queue.name, field, value, e
        ))
    })
}

fn resource_queue_attributes(queue: &ResourceQueue) -> Result<Vec<String>, BackupError> {
    let max_cost = parse_cost(queue, "max_cost", &queue.max_cost)?;
    let min_cost = parse_cost(queue, "min_cost", &queue.min_cost)?;

    let attributes: [Attribute<'_>; 6] = [
        (queue.active_statements != -1, &|| {
            format!("ACTIVE_STATEMENTS={}", queue.active_statements)
        }),
        (max_cost > -1.0, &|| format!("MAX_COST={}", queue.max_cost)),
        (queue.cost_overcommit, &|| "COST_OVERCOMMIT=TRUE".to_string()),
        (min_cost > 0.0, &|| format!("MIN_COST={}", queue.min_cost)),
        (queue.priority != DEFAULT_PRIORITY, &|| {
            format!("PRIORITY={}", queue.priority.to_uppercase())
        }),
        (queue.memory_limit != "-1", &|| {
            format!("MEMORY_LIMIT='{}'", queue.memory_limit)
        }),
    ];
    Ok(render_attributes(&attributes))
}

/// Write a `CREATE RESOURCE QUEUE` per queue. The default queue already
/// exists in every cluster, so it is altered instead.
///
/// A cost that does not parse as a number aborts with
/// [`BackupError::InvalidCatalogData`].
pub fn print_create_resource_queue_statements<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    queues: &[ResourceQueue],
    queue_metadata: &MetadataMap,
) -> Result<(), BackupError> {
    for queue in queues {
        let attributes = resource_queue_attributes(queue)?;
        let action = if queue.name == DEFAULT_RESOURCE_QUEUE {
            "ALTER"
        } else {
            "CREATE"
        };
        let quoted = quote_ident(&queue.name);
        toc.emit(out, Section::Global, "", &queue.name, "RESOURCE QUEUE", |out| {
            write!(
                out,
                "\n\n{} RESOURCE QUEUE {} WITH ({});",
                action,
                quoted,
                attributes.join(", ")
            )?;
            print_object_metadata(out, queue_metadata.get(&queue.oid), &quoted, "RESOURCE QUEUE")
        })?;
    }
    Ok(())
}

/// Write resource group statements.
///
/// The built-in groups can not be created, so each of their limits is
/// altered with a separate statement.
pub fn print_create_resource_group_statements<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    groups: &[ResourceGroup],
    group_metadata: &MetadataMap,
) -> Result<(), BackupError> {
    for group in groups {
        let metadata = group_metadata.get(&group.oid);
        if BUILTIN_RESOURCE_GROUPS.contains(&group.name.as_str()) {
            let settings = [
                ("MEMORY_LIMIT", group.memory_limit),
                ("MEMORY_SHARED_QUOTA", group.memory_shared_quota),
                ("MEMORY_SPILL_RATIO", group.memory_spill_ratio),
                ("CONCURRENCY", group.concurrency),
                ("CPU_RATE_LIMIT", group.cpu_rate_limit),
            ];
            for (setting, value) in settings {
                toc.emit(out, Section::Global, "", &group.name, "RESOURCE GROUP", |out| {
                    write!(
                        out,
                        "\n\nALTER RESOURCE GROUP {} SET {} {};",
                        group.name, setting, value
                    )
                })?;
            }
            toc.emit(out, Section::Global, "", &group.name, "RESOURCE GROUP", |out| {
                print_object_metadata(out, metadata, &group.name, "RESOURCE GROUP")
            })?;
        } else {
            toc.emit(out, Section::Global, "", &group.name, "RESOURCE GROUP", |out| {
                write!(
                    out,
                    "\n\nCREATE RESOURCE GROUP {} WITH (CPU_RATE_LIMIT={}, MEMORY_LIMIT={}, CONCURRENCY={}, MEMORY_SHARED_QUOTA={}, MEMORY_SPILL_RATIO={});",
                    group.name,
                    group.cpu_rate_limit,
                    group.memory_limit,
                    group.concurrency,
                    group.memory_shared_quota,
                    group.memory_spill_ratio
                )?;
                print_object_metadata(out, metadata, &group.name, "RESOURCE GROUP")
            })?;
        }
    }
    Ok(())
}

fn role_attributes(role: &Role) -> Vec<String> {
    let attributes: [Attribute<'_>; 14] = [
        (true, &|| keyword(role.superuser, "SUPERUSER", "NOSUPERUSER")),
        (true, &|| keyword(role.inherit, "INHERIT", "NOINHERIT")),
        (true, &|| keyword(role.create_role, "CREATEROLE", "NOCREATEROLE")),
        (true, &|| keyword(role.create_db, "CREATEDB", "NOCREATEDB")),
        (true, &|| keyword(role.can_login, "LOGIN", "NOLOGIN")),
        (role.connection_limit != -1, &|| {
            format!("CONNECTION LIMIT {}", role.connection_limit)
        }),
        (!role.password.is_empty(), &|| {
            format!("PASSWORD '{}'", role.password)
        }),
        (!role.valid_until.is_empty(), &|| {
            format!("VALID UNTIL '{}'", role.valid_until)
        }),
        (true, &|| format!("RESOURCE QUEUE {}", quote_ident(&role.res_queue))),
        (role.ext_http, &|| "CREATEEXTTABLE (protocol='http')".to_string()),
        (role.ext_gpfdist_readable, &|| {
            "CREATEEXTTABLE (protocol='gpfdist', type='readable')".to_string()
        }),
        (role.ext_gpfdist_writable, &|| {
            "CREATEEXTTABLE (protocol='gpfdist', type='writable')".to_string()
        }),
        (role.ext_hdfs_readable, &|| {
            "CREATEEXTTABLE (protocol='gphdfs', type='readable')".to_string()
        }),
        (role.ext_hdfs_writable, &|| {
            "CREATEEXTTABLE (protocol='gphdfs', type='writable')".to_string()
        }),
    ];
    render_attributes(&attributes)
}

/// Write each role as `CREATE ROLE` followed by an `ALTER ROLE` carrying
/// its attributes, its login time constraints and its metadata. The whole
/// role is a single table of contents entry.
pub fn print_create_role_statements<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    roles: &[Role],
    role_metadata: &MetadataMap,
) -> Result<(), BackupError> {
    for role in roles {
        let quoted = quote_ident(&role.name);
        let attributes = role_attributes(role);
        toc.emit(out, Section::Global, "", &role.name, "ROLE", |out| {
            write!(
                out,
                "\n\nCREATE ROLE {};\nALTER ROLE {} WITH {};",
                quoted,
                quoted,
                attributes.join(" ")
            )?;
            for constraint in &role.time_constraints {
                write!(
                    out,
                    "\nALTER ROLE {} DENY BETWEEN DAY {} TIME '{}' AND DAY {} TIME '{}';",
                    quoted,
                    constraint.start_day,
                    constraint.start_time,
                    constraint.end_day,
                    constraint.end_time
                )?;
            }
            print_object_metadata(out, role_metadata.get(&role.oid), &quoted, "ROLE")
        })?;
    }
    Ok(())
}

/// Write one `GRANT` per role membership, in input order.
pub fn print_role_membership_statements<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    members: &[RoleMember],
) -> Result<(), BackupError> {
    if members.is_empty() {
        return Ok(());
    }
    out.write_str("\n\n")?;
    for member in members {
        toc.emit(out, Section::Global, "", &member.member, "ROLE GRANT", |out| {
            write!(out, "\nGRANT {} TO {}", member.role, member.member)?;
            if member.is_admin {
                out.write_str(" WITH ADMIN OPTION")?;
            }
            write!(out, " GRANTED BY {};", member.grantor)
        })?;
    }
    Ok(())
}

pub fn print_create_tablespace_statements<W: Write>(
    out: &mut ByteCountWriter<W>,
    toc: &mut Toc,
    tablespaces: &[Tablespace],
    tablespace_metadata: &MetadataMap,
) -> Result<(), BackupError> {
    for tablespace in tablespaces {
        toc.emit(out, Section::Global, "", &tablespace.tablespace, "TABLESPACE", |out| {
            write!(
                out,
                "\n\nCREATE TABLESPACE {} FILESPACE {};",
                tablespace.tablespace, tablespace.filespace
            )?;
            print_object_metadata(
                out,
                tablespace_metadata.get(&tablespace.oid),
                &tablespace.tablespace,
                "TABLESPACE",
            )
        })?;
    }
    Ok(())
}
