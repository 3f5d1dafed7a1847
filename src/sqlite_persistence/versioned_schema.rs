use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

/// Offset added to schema versions before writing them to `PRAGMA user_version`,
/// so databases not created by this server are never mistaken for version 0.
pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn parse(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            _ => None,
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    def.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    def.push_str(&format!(" DEFAULT {}", default_value));
                }
                def
            })
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(&format!("CREATE TABLE {} ({});", self.name, columns), params![])?;

        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    /// Check that the live table has exactly the expected columns and indices.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? >= 1,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                actual.len(),
                self.columns.len()
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in actual.iter().zip(self.columns) {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if SqlType::parse(sql_type) != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                );
            }
            if *non_null != expected.non_null || *is_pk != expected.is_primary_key {
                bail!(
                    "Table {} column {} constraint mismatch",
                    self.name,
                    expected.name
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Open (or create) a database at `path` and bring it to the latest of `schemas`.
///
/// A new file gets the latest schema directly. An existing file is validated
/// against the schema matching its stored version and then migrated forward
/// inside a single transaction.
pub fn open_versioned(
    path: &Path,
    schemas: &'static [VersionedSchema],
    label: &str,
) -> Result<Connection> {
    let latest = schemas
        .last()
        .with_context(|| format!("No schema defined for {} database", label))?;
    let is_new_db = !path.exists();

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open {} database at {:?}", label, path))?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    if is_new_db {
        info!("Creating new {} database at {:?}", label, path);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    let schema = schemas
        .iter()
        .find(|s| s.version as i64 == db_version)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?;
    schema
        .validate(&conn)
        .with_context(|| format!("{} schema validation failed for version {}", label, db_version))?;

    if schema.version < latest.version {
        info!(
            "Migrating {} database from version {} to {}",
            label, schema.version, latest.version
        );
        let tx = conn.transaction()?;
        for next in schemas.iter().filter(|s| s.version > schema.version) {
            if let Some(migration) = next.migration {
                migration(&tx).with_context(|| {
                    format!("Failed to run {} migration to version {}", label, next.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOTES_V1: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("body", &SqlType::Text, non_null = true),
        ],
        indices: &[("idx_notes_body", "body")],
    };

    const NOTES_V2: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("body", &SqlType::Text, non_null = true),
            sqlite_column!("pinned", &SqlType::Integer, non_null = true, default_value = Some("0")),
        ],
        indices: &[("idx_notes_body", "body")],
    };

    fn add_pinned(conn: &Connection) -> Result<()> {
        conn.execute(
            "ALTER TABLE notes ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        Ok(())
    }

    const V1_ONLY: &[VersionedSchema] = &[VersionedSchema {
        version: 1,
        tables: &[NOTES_V1],
        migration: None,
    }];

    const V1_AND_V2: &[VersionedSchema] = &[
        VersionedSchema {
            version: 1,
            tables: &[NOTES_V1],
            migration: None,
        },
        VersionedSchema {
            version: 2,
            tables: &[NOTES_V2],
            migration: Some(add_pinned),
        },
    ];

    #[test]
    fn test_create_and_validate() {
        let conn = Connection::open_in_memory().unwrap();
        V1_AND_V2[1].create(&conn).unwrap();
        V1_AND_V2[1].validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, (BASE_DB_VERSION + 2) as i64);
    }

    #[test]
    fn test_validate_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        NOTES_V1.create(&conn).unwrap();
        assert!(NOTES_V2.validate(&conn).is_err());
    }

    #[test]
    fn test_validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
            [],
        )
        .unwrap();
        let err = NOTES_V1.validate(&conn).unwrap_err();
        assert!(err.to_string().contains("missing index"));
    }

    #[test]
    fn test_open_versioned_migrates_forward() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.db");

        {
            let conn = open_versioned(&path, V1_ONLY, "notes").unwrap();
            conn.execute("INSERT INTO notes (body) VALUES ('hello')", [])
                .unwrap();
        }

        let conn = open_versioned(&path, V1_AND_V2, "notes").unwrap();
        V1_AND_V2[1].validate(&conn).unwrap();
        let pinned: i64 = conn
            .query_row("SELECT pinned FROM notes WHERE body = 'hello'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(pinned, 0);
    }
}
