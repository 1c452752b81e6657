//! Read-only snapshots of schema objects.

use std::fmt;

use sqlbridge_core::{ColumnHint, Value};

/// How a generated column is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKind {
    /// Computed on read.
    Virtual,
    /// Computed on write and stored in the row.
    Stored,
}

/// A table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type as written in the DDL (may be empty).
    pub sql_type: String,
    pub nullable: bool,
    /// Literal default value, when the default is a constant.
    pub default: Option<Value>,
    /// SQL expression for function defaults (`CURRENT_TIMESTAMP`,
    /// `lower(...)`) and for generated columns.
    pub default_function: Option<String>,
    pub collation: Option<String>,
    pub generated: Option<GeneratedKind>,
    /// 1-based position in the primary key, if the column is part of it.
    pub primary_key_position: Option<u32>,
    /// The column is the rowid alias or was declared `AUTOINCREMENT`.
    pub auto_increment: bool,
}

impl ColumnDescriptor {
    pub fn is_primary_key(&self) -> bool {
        self.primary_key_position.is_some()
    }

    /// Generated column computed on read.
    pub fn is_virtual(&self) -> bool {
        self.generated == Some(GeneratedKind::Virtual)
    }

    pub fn is_generated(&self) -> bool {
        self.generated.is_some()
    }

    /// Casting hint for values written to this column.
    pub fn hint(&self) -> ColumnHint {
        ColumnHint::new(self.sql_type.clone())
    }
}

impl From<&ColumnDescriptor> for ColumnHint {
    fn from(column: &ColumnDescriptor) -> Self {
        column.hint()
    }
}

/// Action taken on the referencing rows when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ReferentialAction {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Cascade => "CASCADE",
        }
    }

    /// Parse an action as written (`set null`, `SET NULL`, `cascade`...).
    pub fn from_sql(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            "CASCADE" => Some(ReferentialAction::Cascade),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// When a deferrable foreign key is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferrable {
    /// `DEFERRABLE INITIALLY IMMEDIATE` (or bare `DEFERRABLE`).
    Immediate,
    /// `DEFERRABLE INITIALLY DEFERRED`.
    Deferred,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDescriptor {
    /// Constraint name; `None` when the DDL gives none.
    pub name: Option<String>,
    pub from_table: String,
    pub columns: Vec<String>,
    pub to_table: String,
    /// Referenced columns. Introspection fills in the target's primary key
    /// when the DDL omits them.
    pub to_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub deferrable: Option<Deferrable>,
}

impl ForeignKeyDescriptor {
    /// First source column.
    pub fn column(&self) -> &str {
        self.columns.first().map_or("", String::as_str)
    }

    /// First referenced column.
    pub fn primary_key(&self) -> &str {
        self.to_columns.first().map_or("", String::as_str)
    }
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub table: String,
    /// Indexed columns in key order; empty for expression indexes.
    pub columns: Vec<String>,
    pub unique: bool,
    /// Key expression text for expression indexes.
    pub expression: Option<String>,
    /// `WHERE` predicate of a partial index.
    pub where_clause: Option<String>,
}

/// A `CHECK` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraintDescriptor {
    pub name: Option<String>,
    pub expression: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referential_action_round_trip() {
        for action in [
            ReferentialAction::NoAction,
            ReferentialAction::Restrict,
            ReferentialAction::SetNull,
            ReferentialAction::SetDefault,
            ReferentialAction::Cascade,
        ] {
            assert_eq!(ReferentialAction::from_sql(action.as_sql()), Some(action));
        }
        assert_eq!(
            ReferentialAction::from_sql("set   null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::from_sql("explode"), None);
    }

    #[test]
    fn column_hint_uses_declared_type() {
        let column = ColumnDescriptor {
            name: "active".into(),
            sql_type: "boolean".into(),
            nullable: true,
            default: None,
            default_function: None,
            collation: None,
            generated: None,
            primary_key_position: None,
            auto_increment: false,
        };
        assert!(ColumnHint::from(&column).is_integer_like());
        assert!(!column.is_primary_key());
    }
}
