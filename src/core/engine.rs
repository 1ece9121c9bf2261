use crate::client::{Client, FetchContext};
use crate::domain::model::Item;
use crate::domain::schema::{Resource, Row, Table, TableDef};
use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

type SyncFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// 已驗證的表格集合；設定錯誤在註冊時就失敗
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Vec<Table>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(defs: Vec<TableDef>) -> Result<Self> {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, def: TableDef) -> Result<()> {
        let table = def.build()?;

        let mut known: HashSet<&str> = self
            .tables
            .iter()
            .flat_map(|t| t.table_names())
            .collect();
        for name in table.table_names() {
            if !known.insert(name) {
                return Err(SyncError::config(format!(
                    "table '{}' is registered more than once",
                    name
                )));
            }
        }

        tracing::debug!(
            "Registered table {} ({} columns, {} relations)",
            table.name(),
            table.columns().len(),
            table.relations().len()
        );
        self.tables.push(table);
        Ok(())
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        fn find<'a>(tables: &'a [Table], name: &str) -> Option<&'a Table> {
            tables.iter().find_map(|t| {
                if t.name() == name {
                    Some(t)
                } else {
                    find(t.relations(), name)
                }
            })
        }
        find(&self.tables, name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableRows {
    pub columns: Vec<String>,
    #[serde(skip)]
    pub rows: Vec<Row>,
}

/// A column that could not be resolved for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionIssue {
    pub table: String,
    pub column: String,
    pub primary_key: String,
    pub message: String,
}

/// A child table whose fetch failed for one parent row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchIssue {
    pub table: String,
    pub parent_key: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables: BTreeMap<String, TableRows>,
    pub resolution_issues: Vec<ResolutionIssue>,
    pub fetch_issues: Vec<FetchIssue>,
}

impl SyncReport {
    pub fn new(tables: &[Table]) -> Self {
        fn add(out: &mut BTreeMap<String, TableRows>, table: &Table) {
            out.insert(
                table.name().to_string(),
                TableRows {
                    columns: table.column_names(),
                    rows: Vec::new(),
                },
            );
            for relation in table.relations() {
                add(out, relation);
            }
        }

        let mut out = BTreeMap::new();
        for table in tables {
            add(&mut out, table);
        }

        Self {
            started_at: Utc::now(),
            finished_at: None,
            tables: out,
            resolution_issues: Vec::new(),
            fetch_issues: Vec::new(),
        }
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }

    fn push_row(&mut self, table: &Table, row: Row) {
        self.tables
            .entry(table.name().to_string())
            .or_insert_with(|| TableRows {
                columns: table.column_names(),
                rows: Vec::new(),
            })
            .rows
            .push(row);
    }
}

/// 執行同步：每個表格一個 producer（表格的 resolver）與一個 consumer（欄位解析）
pub struct SyncEngine {
    client: Client,
    registry: TableRegistry,
    channel_capacity: usize,
}

impl SyncEngine {
    pub fn new(client: Client, registry: TableRegistry) -> Self {
        Self {
            client,
            registry,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub async fn sync(&self, ctx: &FetchContext) -> Result<SyncReport> {
        let mut report = SyncReport::new(self.registry.tables());
        self.sync_into(ctx, &mut report).await?;
        Ok(report)
    }

    /// Rows collected before a failure stay in `report`.
    pub async fn sync_into(&self, ctx: &FetchContext, report: &mut SyncReport) -> Result<()> {
        for table in self.registry.tables() {
            tracing::info!("Syncing table {}", table.name());
            self.sync_table(ctx, table, None, report).await?;
            tracing::info!(
                "Table {} synced: {} rows",
                table.name(),
                report.rows(table.name()).len()
            );
        }
        report.finished_at = Some(Utc::now());
        Ok(())
    }

    fn sync_table<'a>(
        &'a self,
        ctx: &'a FetchContext,
        table: &'a Table,
        parent: Option<&'a Resource>,
        report: &'a mut SyncReport,
    ) -> SyncFuture<'a> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(self.channel_capacity);

            let producer = table.resolver().resolve(ctx, &self.client, parent, tx);
            let consumer = async move {
                let mut rx = rx;
                while let Some(item) = rx.recv().await {
                    self.resolve_item(ctx, table, parent, item, report).await?;
                }
                Ok::<(), SyncError>(())
            };

            let (fetched, consumed) = tokio::join!(producer, consumer);
            consumed?;
            fetched
        })
    }

    async fn resolve_item(
        &self,
        ctx: &FetchContext,
        table: &Table,
        parent: Option<&Resource>,
        item: Item,
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut resource = match Resource::new(item) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!("{}: could not read record: {}", table.name(), e);
                report.resolution_issues.push(ResolutionIssue {
                    table: table.name().to_string(),
                    column: String::new(),
                    primary_key: String::new(),
                    message: e.to_string(),
                });
                return Ok(());
            }
        };

        let mut failed = Vec::new();
        for column in table.columns() {
            if let Err(e) = table.resolve_column(&self.client, parent, &mut resource, column) {
                failed.push((column.name.clone(), e.to_string()));
            }
        }

        let key_values: Vec<String> = table
            .primary_keys()
            .iter()
            .map(|name| resource.get(name).map(|v| v.to_text()).unwrap_or_default())
            .collect();
        let primary_key = key_values.join("/");

        for (column, message) in failed {
            tracing::warn!(
                "{}: column {} of row {} not resolved: {}",
                table.name(),
                column,
                primary_key,
                message
            );
            report.resolution_issues.push(ResolutionIssue {
                table: table.name().to_string(),
                column,
                primary_key: primary_key.clone(),
                message,
            });
        }

        // 主鍵不可為 Null
        if key_values.iter().any(String::is_empty) {
            tracing::warn!("{}: dropping row with null primary key", table.name());
            report.resolution_issues.push(ResolutionIssue {
                table: table.name().to_string(),
                column: table.primary_keys().join(","),
                primary_key: primary_key.clone(),
                message: "primary key is null".to_string(),
            });
            return Ok(());
        }

        report.push_row(table, resource.to_row(table.columns()));

        for relation in table.relations() {
            match self.sync_table(ctx, relation, Some(&resource), report).await {
                Ok(()) => {}
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        "{}: fetch for parent {} failed: {}",
                        relation.name(),
                        primary_key,
                        e
                    );
                    report.fetch_issues.push(FetchIssue {
                        table: relation.name().to_string(),
                        parent_key: Some(primary_key.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
