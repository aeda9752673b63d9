use crate::io::ByteCountWriter;
use crate::types::{BackupError, Oid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::prelude::*;

/// Privileges granted to one grantee.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Role receiving the privileges. An empty grantee means PUBLIC.
    #[serde(default)]
    pub grantee: String,
    /// Privilege keywords, e.g. `CONNECT` or `CREATE`.
    #[serde(default)]
    pub privileges: Vec<String>,
    /// Privileges granted `WITH GRANT OPTION`.
    #[serde(default)]
    pub grantable: Vec<String>,
}

/// Ownership, comment and access privileges of a catalog object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default)]
    pub privileges: Vec<AclEntry>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub comment: String,
}

/// Object metadata by catalog object id. A missing id means the object has
/// no metadata to emit.
pub type MetadataMap = HashMap<Oid, ObjectMetadata>;

/// Roles and resource management objects have no owner and no ACL.
fn has_owner(object_type: &str) -> bool {
    !matches!(object_type, "ROLE" | "RESOURCE QUEUE" | "RESOURCE GROUP")
}

impl ObjectMetadata {
    pub fn comment_statement(&self, name: &str, object_type: &str) -> Option<String> {
        if self.comment.is_empty() {
            return None;
        }
        Some(format!(
            "\n\nCOMMENT ON {} {} IS '{}';",
            object_type,
            name,
            self.comment.replace('\'', "''")
        ))
    }

    pub fn owner_statement(&self, name: &str, object_type: &str) -> Option<String> {
        if self.owner.is_empty() || !has_owner(object_type) {
            return None;
        }
        Some(format!(
            "\n\nALTER {} {} OWNER TO {};",
            object_type, name, self.owner
        ))
    }

    pub fn privileges_statements(&self, name: &str, object_type: &str) -> Option<String> {
        if self.privileges.is_empty() || !has_owner(object_type) {
            return None;
        }
        let mut statements = format!("\n\nREVOKE ALL ON {} {} FROM PUBLIC;", object_type, name);
        if !self.owner.is_empty() {
            statements.push_str(&format!(
                "\nREVOKE ALL ON {} {} FROM {};",
                object_type, name, self.owner
            ));
        }
        for acl in &self.privileges {
            let grantee = if acl.grantee.is_empty() {
                "PUBLIC"
            } else {
                acl.grantee.as_str()
            };
            if !acl.privileges.is_empty() {
                statements.push_str(&format!(
                    "\nGRANT {} ON {} {} TO {};",
                    acl.privileges.join(","),
                    object_type,
                    name,
                    grantee
                ));
            }
            if !acl.grantable.is_empty() {
                statements.push_str(&format!(
                    "\nGRANT {} ON {} {} TO {} WITH GRANT OPTION;",
                    acl.grantable.join(","),
                    object_type,
                    name,
                    grantee
                ));
            }
        }
        Some(statements)
    }
}

/// Write the comment, owner and privilege statements for an object.
///
/// `name` must already be quoted. Writes nothing when `metadata` is `None`
/// or carries nothing that applies to `object_type`.
pub fn print_object_metadata<W: Write>(
    out: &mut ByteCountWriter<W>,
    metadata: Option<&ObjectMetadata>,
    name: &str,
    object_type: &str,
) -> Result<(), BackupError> {
    let Some(metadata) = metadata else {
        return Ok(());
    };
    let statements = [
        metadata.comment_statement(name, object_type),
        metadata.owner_statement(name, object_type),
        metadata.privileges_statements(name, object_type),
    ];
    for statement in statements.iter().flatten() {
        out.write_str(statement)?;
    }
    Ok(())
}
