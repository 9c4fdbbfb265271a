use serde::Serialize;

use crate::error::Result;
use crate::sqlite::connection::Connection;

/// One attached database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub seq: i64,
    pub name: String,
    /// Backing file, empty for in-memory and temporary databases.
    pub file: String,
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    /// Declared type as written in the schema, possibly empty.
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 if not part of it.
    pub primary_key: i64,
}

/// One foreign-key constraint, possibly spanning several columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub id: i64,
    /// Referenced (parent) table.
    pub table: String,
    pub from: Vec<String>,
    /// Referenced columns; an empty name means the parent's primary key.
    pub to: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// One index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    /// `c` for `CREATE INDEX`, `u` for UNIQUE constraints, `pk` for primary keys.
    pub origin: String,
    pub partial: bool,
}

impl Connection {
    /// Databases attached to this connection, `main` first.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn databases(&self) -> Result<Vec<DatabaseInfo>> {
        let mut stmt = self.prepare("SELECT seq, name, file FROM pragma_database_list ORDER BY seq")?;
        let mut rows = stmt.query()?;
        let mut out = Vec::new();
        while let Some(row) = rows.step()? {
            let (seq, name, file) = row.scan()?;
            out.push(DatabaseInfo { seq, name, file });
        }
        Ok(out)
    }

    /// User tables of the main database, by name; internal `sqlite_` tables are excluded.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let mut rows = stmt.query()?;
        let mut out = Vec::new();
        while let Some(row) = rows.step()? {
            out.push(row.get(0)?);
        }
        Ok(out)
    }

    /// Columns of `table` in declaration order; empty if the table does not exist.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let mut rows = stmt.query_with(crate::params![table])?;
        let mut out = Vec::new();
        while let Some(row) = rows.step()? {
            let (cid, name, decl_type, not_null, default_value, primary_key) = row.scan()?;
            out.push(ColumnInfo {
                cid,
                name,
                decl_type,
                not_null,
                default_value,
                primary_key,
            });
        }
        Ok(out)
    }

    /// Foreign keys declared on `table`, one entry per constraint.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = self.prepare(
            "SELECT id, \"table\", \"from\", \"to\", on_update, on_delete \
             FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let mut rows = stmt.query_with(crate::params![table])?;
        let mut out: Vec<ForeignKey> = Vec::new();
        while let Some(row) = rows.step()? {
            let (id, parent, from, to, on_update, on_delete): (i64, String, String, String, String, String) =
                row.scan()?;
            match out.last_mut() {
                Some(fk) if fk.id == id => {
                    fk.from.push(from);
                    fk.to.push(to);
                }
                _ => out.push(ForeignKey {
                    id,
                    table: parent,
                    from: vec![from],
                    to: vec![to],
                    on_update,
                    on_delete,
                }),
            }
        }
        Ok(out)
    }

    /// Indexes on `table`.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let mut stmt = self.prepare(
            "SELECT name, \"unique\", origin, partial FROM pragma_index_list(?1) ORDER BY name",
        )?;
        let mut rows = stmt.query_with(crate::params![table])?;
        let mut out = Vec::new();
        while let Some(row) = rows.step()? {
            let (name, unique, origin, partial) = row.scan()?;
            out.push(IndexInfo {
                name,
                unique,
                origin,
                partial,
            });
        }
        Ok(out)
    }

    /// Columns covered by `index`, in key order.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the catalog query fails.
    pub fn index_columns(&self, index: &str) -> Result<Vec<String>> {
        let mut stmt = self.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let mut rows = stmt.query_with(crate::params![index])?;
        let mut out = Vec::new();
        while let Some(row) = rows.step()? {
            out.push(row.get(0)?);
        }
        Ok(out)
    }
}
