//! Schema introspection over any [`Connection`].
//!
//! Structured metadata comes from `PRAGMA table_xinfo`, `index_list` and
//! `index_info`; what the pragmas do not expose (constraint names,
//! collations, generated expressions, foreign keys, check constraints) is
//! parsed from the DDL stored in `sqlite_master`. Every call reads the
//! catalog afresh.

use sqlbridge_core::{
    Connection, Error, Result, SchemaError, SchemaErrorKind, Value, quote_table_name,
};

use crate::ddl::{TableDefinition, parse_create_index, parse_create_table};
use crate::defaults::extract_default;
use crate::descriptors::{
    CheckConstraintDescriptor, ColumnDescriptor, ForeignKeyDescriptor, GeneratedKind,
    IndexDescriptor,
};

const MASTER: &str = "(SELECT * FROM sqlite_master UNION ALL SELECT * FROM sqlite_temp_master)";

/// Reads schema descriptors through a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Introspector;

impl Introspector {
    pub fn new() -> Self {
        Self
    }

    /// Names of all user tables, sorted.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn tables<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {} WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
            MASTER
        );
        conn.exec_query(&sql, &[])?
            .iter()
            .map(|row| row.get_as::<String>(0))
            .collect()
    }

    pub fn table_exists<C: Connection + ?Sized>(&self, conn: &mut C, table: &str) -> Result<bool> {
        Ok(self.table_sql(conn, table)?.is_some())
    }

    /// Stored `CREATE TABLE` text.
    pub fn table_sql<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Option<String>> {
        let sql = format!(
            "SELECT sql FROM {} WHERE type = 'table' AND name = ? COLLATE NOCASE",
            MASTER
        );
        let row = conn.select_one(&sql, &[Value::from(table)])?;
        row.map(|row| row.get_as::<Option<String>>(0))
            .transpose()
            .map(Option::flatten)
    }

    /// Parsed definition of `table`.
    ///
    /// # Errors
    ///
    /// [`SchemaErrorKind::TableNotFound`] when the table does not exist.
    pub fn table_definition<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<TableDefinition> {
        match self.table_sql(conn, table)? {
            Some(sql) => parse_create_table(&sql),
            None => Err(table_not_found(table)),
        }
    }

    /// Whether `name` is a view.
    pub fn view_exists<C: Connection + ?Sized>(&self, conn: &mut C, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE type = 'view' AND name = ? COLLATE NOCASE",
            MASTER
        );
        Ok(conn.select_one(&sql, &[Value::from(name)])?.is_some())
    }

    // Views carry no constraints, so they read as an empty definition.
    fn relation_definition<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<TableDefinition> {
        match self.table_sql(conn, table)? {
            Some(sql) => parse_create_table(&sql),
            None if self.view_exists(conn, table)? => Ok(TableDefinition::default()),
            None => Err(table_not_found(table)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub fn columns<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let sql = format!("PRAGMA table_xinfo({})", quote_table_name(table));
        let rows = conn.exec_query(&sql, &[])?;
        if rows.is_empty() {
            return Err(table_not_found(table));
        }
        let definition = self.relation_definition(conn, table)?;

        let pk_count = rows
            .iter()
            .filter(|row| row.get_named::<i64>("pk").is_ok_and(|pk| pk > 0))
            .count();

        rows.iter()
            .map(|row| {
                let name: String = row.get_named("name")?;
                let sql_type: String = row.get_named::<Option<String>>("type")?.unwrap_or_default();
                let notnull: i64 = row.get_named("notnull")?;
                let raw_default: Option<String> = row.get_named("dflt_value")?;
                let pk: i64 = row.get_named("pk")?;
                let hidden: i64 = row.get_named("hidden")?;

                let parsed = definition.column(&name);
                let generated = match hidden {
                    2 => Some(GeneratedKind::Virtual),
                    3 => Some(GeneratedKind::Stored),
                    _ => None,
                };
                let (default, mut default_function) = extract_default(raw_default.as_deref());
                if generated.is_some() {
                    default_function = parsed.and_then(|c| c.generated_expression.clone());
                }
                let rowid_alias = pk == 1 && pk_count == 1 && sql_type.eq_ignore_ascii_case("INTEGER");

                Ok(ColumnDescriptor {
                    name,
                    sql_type,
                    nullable: notnull == 0,
                    default,
                    default_function,
                    collation: parsed.and_then(|c| c.collation.clone()),
                    generated,
                    primary_key_position: u32::try_from(pk).ok().filter(|&p| p > 0),
                    auto_increment: rowid_alias || parsed.is_some_and(|c| c.autoincrement),
                })
            })
            .collect()
    }

    /// Primary key columns in key order.
    pub fn primary_keys<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_table_name(table));
        let mut keyed = conn
            .exec_query(&sql, &[])?
            .iter()
            .filter_map(|row| {
                let pk = row.get_named::<i64>("pk").ok().filter(|&pk| pk > 0)?;
                Some(row.get_named::<String>("name").map(|name| (pk, name)))
            })
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by_key(|(pk, _)| *pk);
        Ok(keyed.into_iter().map(|(_, name)| name).collect())
    }

    /// The primary key column when the key has exactly one column.
    pub fn primary_key<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Option<String>> {
        let mut keys = self.primary_keys(conn, table)?;
        Ok(if keys.len() == 1 { keys.pop() } else { None })
    }

    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub fn indexes<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Vec<IndexDescriptor>> {
        let sql = format!("PRAGMA index_list({})", quote_table_name(table));
        let list = conn.exec_query(&sql, &[])?;

        let mut indexes = Vec::new();
        for row in &list {
            let name: String = row.get_named("name")?;
            if name.starts_with("sqlite_") {
                continue;
            }
            let unique = row.get_named::<i64>("unique")? != 0;

            let info_sql = format!("PRAGMA index_info({})", quote_table_name(&name));
            let info = conn.exec_query(&info_sql, &[])?;
            let names: Vec<Option<String>> = info
                .iter()
                .map(|r| r.get_named::<Option<String>>("name"))
                .collect::<Result<_>>()?;

            let index_sql = conn
                .select_one(
                    &format!("SELECT sql FROM {} WHERE type = 'index' AND name = ?", MASTER),
                    &[Value::from(name.as_str())],
                )?
                .map(|r| r.get_as::<Option<String>>(0))
                .transpose()?
                .flatten();
            let parsed = index_sql.as_deref().map(parse_create_index).transpose()?;

            let is_expression = names.iter().any(Option::is_none);
            let (columns, expression) = if is_expression {
                (Vec::new(), parsed.as_ref().map(|p| p.key.clone()))
            } else {
                (names.into_iter().flatten().collect(), None)
            };

            indexes.push(IndexDescriptor {
                name,
                table: table.to_string(),
                columns,
                unique,
                expression,
                where_clause: parsed.and_then(|p| p.where_clause),
            });
        }
        Ok(indexes)
    }

    /// Foreign keys in declaration order, with implicit targets resolved to
    /// the referenced table's primary key (`id` when it has none).
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub fn foreign_keys<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>> {
        let mut foreign_keys = self.relation_definition(conn, table)?.foreign_keys;
        for fk in &mut foreign_keys {
            if fk.to_columns.is_empty() {
                let keys = self.primary_keys(conn, &fk.to_table)?;
                fk.to_columns = if keys.is_empty() {
                    vec!["id".to_string()]
                } else {
                    keys
                };
            }
        }
        Ok(foreign_keys)
    }

    pub fn check_constraints<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        table: &str,
    ) -> Result<Vec<CheckConstraintDescriptor>> {
        Ok(self.relation_definition(conn, table)?.check_constraints)
    }
}

fn table_not_found(table: &str) -> Error {
    Error::Schema(SchemaError {
        kind: SchemaErrorKind::TableNotFound,
        message: format!("Could not find table '{}'", table),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbridge_core::{Row, RowSet, row::ColumnInfo};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Connection that answers from canned result sets keyed by SQL prefix.
    #[derive(Default)]
    struct Canned {
        answers: HashMap<String, RowSet>,
        master: HashMap<String, String>,
    }

    fn row_set(columns: &[&str], rows: Vec<Vec<Value>>) -> RowSet {
        let info = Arc::new(ColumnInfo::new(columns.iter().map(|c| c.to_string()).collect()));
        let rows = rows
            .into_iter()
            .map(|values| Row::with_columns(Arc::clone(&info), values))
            .collect();
        RowSet::new(info, rows)
    }

    impl Connection for Canned {
        fn exec_query(&mut self, sql: &str, binds: &[Value]) -> Result<RowSet> {
            if sql.starts_with("SELECT sql FROM") {
                let name = binds[0].as_str().unwrap_or_default().to_string();
                let hit = self
                    .master
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                    .map(|(_, v)| vec![Value::Text(v.clone())]);
                return Ok(row_set(&["sql"], hit.into_iter().collect()));
            }
            Ok(self.answers.get(sql).cloned().unwrap_or_default())
        }

        fn exec_update(&mut self, _sql: &str, _binds: &[Value]) -> Result<u64> {
            Ok(0)
        }

        fn ping(&mut self) -> Result<()> {
            Ok(())
        }

        fn transaction_open(&self) -> bool {
            false
        }

        fn reset(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn xinfo_row(name: &str, ty: &str, notnull: i64, dflt: Option<&str>, pk: i64, hidden: i64) -> Vec<Value> {
        vec![
            Value::from(name),
            Value::from(ty),
            Value::Integer(notnull),
            dflt.map_or(Value::Null, Value::from),
            Value::Integer(pk),
            Value::Integer(hidden),
        ]
    }

    fn posts() -> Canned {
        let mut conn = Canned::default();
        conn.master.insert(
            "posts".into(),
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, author_name text COLLATE RTRIM REFERENCES authors, \
             slug text GENERATED ALWAYS AS (lower(author_name)) VIRTUAL, \
             created_at datetime DEFAULT CURRENT_TIMESTAMP)"
                .into(),
        );
        conn.answers.insert(
            "PRAGMA table_xinfo(\"posts\")".into(),
            row_set(
                &["name", "type", "notnull", "dflt_value", "pk", "hidden"],
                vec![
                    xinfo_row("id", "INTEGER", 0, None, 1, 0),
                    xinfo_row("author_name", "text", 0, None, 0, 0),
                    xinfo_row("slug", "text", 0, None, 0, 2),
                    xinfo_row("created_at", "datetime", 0, Some("CURRENT_TIMESTAMP"), 0, 0),
                ],
            ),
        );
        conn.answers.insert(
            "PRAGMA table_info(\"authors\")".into(),
            row_set(
                &["name", "pk"],
                vec![vec![Value::from("name"), Value::Integer(1)]],
            ),
        );
        conn
    }

    #[test]
    fn columns_merge_pragma_and_ddl() {
        let mut conn = posts();
        let columns = Introspector::new().columns(&mut conn, "posts").unwrap();
        assert_eq!(columns.len(), 4);

        assert!(columns[0].auto_increment);
        assert_eq!(columns[0].primary_key_position, Some(1));
        assert_eq!(columns[1].collation.as_deref(), Some("RTRIM"));
        assert!(columns[2].is_virtual());
        assert_eq!(columns[2].default_function.as_deref(), Some("lower(author_name)"));
        assert_eq!(columns[3].default, None);
        assert_eq!(columns[3].default_function.as_deref(), Some("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn implicit_foreign_key_target_resolves_to_primary_key() {
        let mut conn = posts();
        let fks = Introspector::new().foreign_keys(&mut conn, "posts").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].to_table, "authors");
        assert_eq!(fks[0].to_columns, ["name"]);
        assert_eq!(fks[0].name, None);
    }

    #[test]
    fn views_read_from_pragmas_alone() {
        let mut conn = Canned::default();
        conn.answers.insert(
            "PRAGMA table_xinfo(\"recent\")".into(),
            row_set(
                &["name", "type", "notnull", "dflt_value", "pk", "hidden"],
                vec![xinfo_row("title", "TEXT", 0, None, 0, 0)],
            ),
        );
        conn.answers.insert(
            format!("SELECT 1 FROM {} WHERE type = 'view' AND name = ? COLLATE NOCASE", MASTER),
            row_set(&["1"], vec![vec![Value::Integer(1)]]),
        );

        let introspector = Introspector::new();
        let columns = introspector.columns(&mut conn, "recent").unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].collation, None);
        assert!(introspector.foreign_keys(&mut conn, "recent").unwrap().is_empty());
        assert!(introspector.check_constraints(&mut conn, "recent").unwrap().is_empty());
        assert!(!introspector.table_exists(&mut conn, "recent").unwrap());
    }

    #[test]
    fn missing_table_is_reported() {
        let mut conn = Canned::default();
        match Introspector::new().columns(&mut conn, "ghosts") {
            Err(Error::Schema(e)) => assert_eq!(e.kind, SchemaErrorKind::TableNotFound),
            other => panic!("unexpected {other:?}"),
        }
        assert!(Introspector::new().foreign_keys(&mut conn, "ghosts").is_err());
    }
}
