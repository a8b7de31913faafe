use anyhow::{bail, Result};
use rusqlite::{params, types::Type, Connection};
use tracing::info;

/// Offset added to `PRAGMA user_version` so that a database created by an
/// unrelated tool (version 0, 1, ...) is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 77000;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // unused_mut is only mutated when optional field assignments are
            // passed to the macro (e.g., `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
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
    Blob,
}

impl SqlType {
    fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut create_sql = format!("CREATE TABLE {} (", self.name);
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!("{} {}", column.name, column.sql_type.sql_name()));
            if column.is_primary_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                create_sql.push_str(" NOT NULL");
            }
            if column.is_unique {
                create_sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                create_sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(foreign_key) = column.foreign_key {
                create_sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    foreign_key.foreign_table,
                    foreign_key.foreign_column,
                    match foreign_key.on_delete {
                        ForeignKeyOnChange::NoAction => "NO ACTION",
                        ForeignKeyOnChange::Restrict => "RESTRICT",
                        ForeignKeyOnChange::SetNull => "SET NULL",
                        ForeignKeyOnChange::SetDefault => "SET DEFAULT",
                        ForeignKeyOnChange::Cascade => "CASCADE",
                    }
                ));
            }
        }

        for unique_constraint in self.unique_constraints {
            create_sql.push_str(&format!(", UNIQUE ({})", unique_constraint.join(", ")));
        }
        create_sql.push_str(");");
        conn.execute(&create_sql, params![])?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
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
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
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
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
            let actual_columns: Vec<Column<'_, String>> = stmt
                .query_map(params![], |row| {
                    let name = row.get::<usize, String>(1)?;
                    let sql_type = match row.get::<_, String>(2)?.as_str() {
                        "TEXT" => &SqlType::Text,
                        "INTEGER" => &SqlType::Integer,
                        "REAL" => &SqlType::Real,
                        "BLOB" => &SqlType::Blob,
                        _ => {
                            return Err(rusqlite::Error::InvalidColumnType(
                                2,
                                "".to_string(),
                                Type::Text,
                            ))
                        }
                    };
                    Ok(Column {
                        name,
                        sql_type,
                        non_null: row.get::<_, i32>(3)? == 1,
                        default_value: row.get::<_, Option<String>>(4)?,
                        is_primary_key: row.get::<_, i32>(5)? == 1,
                        is_unique: false,
                        foreign_key: None,
                    })
                })?
                .collect::<Result<_, _>>()?;

            if actual_columns.len() != table.columns.len() {
                bail!(
                    "Table {} has {} columns, expected {}. Found: {}, expected: {}",
                    table.name,
                    actual_columns.len(),
                    table.columns.len(),
                    actual_columns
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    table
                        .columns
                        .iter()
                        .map(|c| c.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }

            for (actual_column, expected_column) in
                actual_columns.iter().zip(table.columns.iter())
            {
                if actual_column.name != expected_column.name {
                    bail!(
                        "Table {} column name mismatch: expected {}, got {}",
                        table.name,
                        expected_column.name,
                        actual_column.name
                    );
                }
                if actual_column.sql_type != expected_column.sql_type {
                    bail!(
                        "Table {} column {} type mismatch: expected {:?}, got {:?}",
                        table.name,
                        expected_column.name,
                        expected_column.sql_type,
                        actual_column.sql_type
                    );
                }
                if actual_column.non_null != expected_column.non_null {
                    bail!(
                        "Table {} column {} non-null mismatch: expected {}, got {}",
                        table.name,
                        expected_column.name,
                        expected_column.non_null,
                        actual_column.non_null
                    );
                }
                if actual_column.is_primary_key != expected_column.is_primary_key {
                    bail!(
                        "Table {} column {} primary key mismatch: expected {}, got {}",
                        table.name,
                        expected_column.name,
                        expected_column.is_primary_key,
                        actual_column.is_primary_key
                    );
                }
            }

            for (index_name, _columns) in table.indices {
                let index_exists: bool = conn
                    .query_row(
                        "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                        params![index_name, table.name],
                        |_| Ok(true),
                    )
                    .unwrap_or(false);
                if !index_exists {
                    bail!("Table {} is missing index '{}'", table.name, index_name);
                }
            }

            // SQLite reports unique constraints as unique indices in index_list
            if !table.unique_constraints.is_empty() {
                let mut stmt =
                    conn.prepare(&format!("PRAGMA index_list({})", table.name))?;
                let unique_indices: Vec<String> = stmt
                    .query_map([], |row| {
                        let name: String = row.get(1)?;
                        let is_unique: i32 = row.get(2)?;
                        Ok((name, is_unique))
                    })?
                    .filter_map(|r| r.ok())
                    .filter(|(_, is_unique)| *is_unique == 1)
                    .map(|(name, _)| name)
                    .collect();

                let mut unique_index_columns: Vec<Vec<String>> = Vec::new();
                for index_name in &unique_indices {
                    let mut idx_stmt =
                        conn.prepare(&format!("PRAGMA index_info({})", index_name))?;
                    let mut cols: Vec<String> = idx_stmt
                        .query_map([], |row| row.get::<_, String>(2))?
                        .filter_map(|r| r.ok())
                        .collect();
                    cols.sort();
                    unique_index_columns.push(cols);
                }

                for expected_columns in table.unique_constraints {
                    let mut expected_sorted: Vec<&str> = expected_columns.to_vec();
                    expected_sorted.sort_unstable();
                    let found = unique_index_columns.iter().any(|actual| {
                        actual.iter().map(|s| s.as_str()).collect::<Vec<_>>() == expected_sorted
                    });
                    if !found {
                        bail!(
                            "Table {} is missing unique constraint on columns ({})",
                            table.name,
                            expected_columns.join(", ")
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bring a database up to the latest schema: create it from scratch when
/// empty, run pending migrations otherwise, and validate the result.
pub fn migrate_if_needed(
    conn: &mut Connection,
    schemas: &[VersionedSchema],
    db_name: &str,
) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = schemas.len() - 1;
    let latest_schema = &schemas[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating {} db schema at version {}", db_name, latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version < latest_version {
        let tx = conn.transaction()?;
        for schema in schemas.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating {} db from version {} to {}",
                    db_name, current_version, schema.version
                );
                migration_fn(&tx)?;
                current_version = schema.version;
            }
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        tx.commit()?;
    }

    latest_schema.validate(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TABLE: Table = Table {
        name: "thing",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("owner", &SqlType::Text, non_null = true),
            sqlite_column!("rank", &SqlType::Integer, non_null = true),
            sqlite_column!(
                "created",
                &SqlType::Integer,
                default_value = Some(DEFAULT_TIMESTAMP)
            ),
        ],
        indices: &[("idx_thing_owner", "owner")],
        unique_constraints: &[&["owner", "rank"]],
    };

    const TEST_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
        version: 0,
        tables: &[TEST_TABLE],
        migration: None,
    }];

    #[test]
    fn creates_and_validates_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_if_needed(&mut conn, TEST_SCHEMAS, "test").unwrap();

        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION);

        // A second run against the already-created db validates cleanly
        migrate_if_needed(&mut conn, TEST_SCHEMAS, "test").unwrap();
    }

    #[test]
    fn unique_constraint_is_enforced() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_if_needed(&mut conn, TEST_SCHEMAS, "test").unwrap();

        conn.execute(
            "INSERT INTO thing (id, owner, rank) VALUES ('a', 'u1', 1)",
            [],
        )
        .unwrap();
        let duplicate = conn.execute(
            "INSERT INTO thing (id, owner, rank) VALUES ('b', 'u1', 1)",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn validation_rejects_mismatched_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE thing (id TEXT PRIMARY KEY)", [])
            .unwrap();
        conn.pragma_update(None, "user_version", BASE_DB_VERSION)
            .unwrap();
        assert!(migrate_if_needed(&mut conn, TEST_SCHEMAS, "test").is_err());
    }
}
