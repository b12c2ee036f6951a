// src/transport/wide_column.rs - Cassandra-style wide-column client and CQL rendering

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{Page, TransportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqlType {
    Text,
    /// 32-bit signed integer
    Int,
    BigInt,
}

impl CqlType {
    pub fn as_cql(&self) -> &'static str {
        match self {
            CqlType::Text => "text",
            CqlType::Int => "int",
            CqlType::BigInt => "bigint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlValue {
    Text(String),
    Int(i32),
    BigInt(i64),
    Null,
}

impl CqlValue {
    pub fn cql_type(&self) -> Option<CqlType> {
        match self {
            CqlValue::Text(_) => Some(CqlType::Text),
            CqlValue::Int(_) => Some(CqlType::Int),
            CqlValue::BigInt(_) => Some(CqlType::BigInt),
            CqlValue::Null => None,
        }
    }
}

pub type CqlRow = BTreeMap<String, CqlValue>;

/// Table definition with a single-column primary key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub keyspace: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<(String, CqlType)>,
}

impl TableSchema {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn column_type(&self, column: &str) -> Option<CqlType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cql_type)| *cql_type)
    }

    pub fn create_keyspace_statement(keyspace: &str, replication_factor: u32) -> String {
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            keyspace, replication_factor
        )
    }

    pub fn create_table_statement(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, cql_type)| {
                if *name == self.primary_key {
                    format!("{} {} PRIMARY KEY", name, cql_type.as_cql())
                } else {
                    format!("{} {}", name, cql_type.as_cql())
                }
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified_name(),
            columns.join(", ")
        )
    }

    /// Prepared INSERT; Cassandra inserts overwrite rows with the same key
    pub fn insert_statement(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|(name, _)| name.as_str()).collect();
        let markers = vec!["?"; names.len()];
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(),
            names.join(", "),
            markers.join(", ")
        )
    }

    pub fn select_statement(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|(name, _)| name.as_str()).collect();
        format!("SELECT {} FROM {}", names.join(", "), self.qualified_name())
    }
}

/// Paged CQL session. Paging state is an opaque byte token.
#[async_trait]
pub trait WideColumnClient: Send + Sync {
    async fn open(&self) -> TransportResult<()>;

    async fn create_keyspace(&self, keyspace: &str, replication_factor: u32) -> TransportResult<()>;

    async fn create_table(&self, schema: &TableSchema) -> TransportResult<()>;

    async fn insert_row(&self, schema: &TableSchema, row: CqlRow) -> TransportResult<()>;

    async fn select_page(
        &self,
        schema: &TableSchema,
        paging_state: Option<Vec<u8>>,
        page_size: usize,
    ) -> TransportResult<Page<CqlRow, Vec<u8>>>;

    async fn close(&self);
}
