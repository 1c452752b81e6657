//! Schema introspection for sqlbridge.
//!
//! [`Introspector`] reads tables, columns, indexes, primary keys, foreign
//! keys and check constraints through any [`sqlbridge_core::Connection`].
//! Details the engine's pragmas do not report are recovered by
//! [`parse_create_table`], a tokenizing parser for stored DDL.

pub mod ddl;
pub mod defaults;
pub mod descriptors;
pub mod introspect;

pub use ddl::{
    ColumnDefinition, IndexDefinition, TableDefinition, parse_create_index, parse_create_table,
};
pub use defaults::extract_default;
pub use descriptors::{
    CheckConstraintDescriptor, ColumnDescriptor, Deferrable, ForeignKeyDescriptor, GeneratedKind,
    IndexDescriptor, ReferentialAction,
};
pub use introspect::Introspector;
