use crate::client::{Client, FetchContext};
use crate::domain::model::Item;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Bool,
    Int,
    Json,
    StringList,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Bool => "bool",
            ColumnType::Int => "int64",
            ColumnType::Json => "json",
            ColumnType::StringList => "list<string>",
            ColumnType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// 記錄型別中的一個欄位：JSON key 與對應的欄位型別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructField {
    pub json_key: &'static str,
    pub column_type: ColumnType,
}

impl StructField {
    pub const fn new(json_key: &'static str, column_type: ColumnType) -> Self {
        Self {
            json_key,
            column_type,
        }
    }
}

/// A record whose shape is declared statically so a schema can be derived from it.
pub trait TableRecord {
    const FIELDS: &'static [StructField];
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    Json(String),
    List(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) | CellValue::Json(s) => Some(s),
            _ => None,
        }
    }

    /// 把 JSON 值轉成指定型別的欄位值，型別不符時回傳原因
    pub fn from_json(value: &Value, column_type: ColumnType) -> std::result::Result<Self, String> {
        if value.is_null() {
            return Ok(CellValue::Null);
        }

        match column_type {
            ColumnType::String => value
                .as_str()
                .map(|s| CellValue::String(s.to_string()))
                .ok_or_else(|| format!("expected a string, got {}", value)),
            ColumnType::Bool => value
                .as_bool()
                .map(CellValue::Bool)
                .ok_or_else(|| format!("expected a bool, got {}", value)),
            ColumnType::Int => value
                .as_i64()
                .map(CellValue::Int)
                .ok_or_else(|| format!("expected an integer, got {}", value)),
            ColumnType::Json => serde_json::to_string(value)
                .map(CellValue::Json)
                .map_err(|e| e.to_string()),
            ColumnType::StringList => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("expected a list, got {}", value))?;
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| format!("expected a list of strings, got {}", item))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(CellValue::List)
            }
            ColumnType::Timestamp => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| format!("expected an RFC 3339 string, got {}", value))?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| CellValue::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
            }
        }
    }

    /// 輸出成 CSV 用的文字，Null 為空字串
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::String(s) | CellValue::Json(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::List(items) => Value::from(items.clone()).to_string(),
            CellValue::Timestamp(ts) => ts.to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::String(s) | CellValue::Json(s) => Value::String(s.clone()),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::from(*i),
            CellValue::List(items) => Value::from(items.clone()),
            CellValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
        }
    }
}

pub type ResolverFn = fn(&Client, &mut Resource, &Column) -> Result<()>;

#[derive(Clone)]
pub enum ColumnResolver {
    /// Reads a top-level key of the serialized record.
    Field(&'static str),
    /// Reads a top-level key of the parent resource's record.
    ParentField(&'static str),
    Custom(ResolverFn),
}

impl fmt::Debug for ColumnResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnResolver::Field(key) => write!(f, "Field({})", key),
            ColumnResolver::ParentField(key) => write!(f, "ParentField({})", key),
            ColumnResolver::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub resolver: ColumnResolver,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, resolver: ColumnResolver) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            resolver,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// 從記錄型別自動產生欄位，並標記主鍵
#[derive(Debug, Clone)]
pub struct Transform {
    fields: &'static [StructField],
    primary_keys: &'static [&'static str],
}

impl Transform {
    pub fn with_struct<T: TableRecord>(primary_keys: &'static [&'static str]) -> Self {
        Self {
            fields: T::FIELDS,
            primary_keys,
        }
    }

    pub fn columns(&self) -> Result<Vec<Column>> {
        for key in self.primary_keys {
            if !self.fields.iter().any(|f| f.json_key == *key) {
                return Err(SyncError::config(format!(
                    "primary key '{}' is not a field of the record",
                    key
                )));
            }
        }

        Ok(self
            .fields
            .iter()
            .map(|field| Column {
                name: to_snake_case(field.json_key),
                column_type: field.column_type,
                primary_key: self.primary_keys.contains(&field.json_key),
                resolver: ColumnResolver::Field(field.json_key),
            })
            .collect())
    }
}

/// `primaryEmail` -> `primary_email`, `isEnrolledIn2Sv` -> `is_enrolled_in2_sv`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(ch);
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// 一筆正在解析中的記錄，以及目前已寫入的欄位值
#[derive(Debug, Clone)]
pub struct Resource {
    item: Item,
    record: Value,
    values: HashMap<String, CellValue>,
}

impl Resource {
    pub fn new(item: Item) -> Result<Self> {
        let record = item.to_json()?;
        Ok(Self {
            item,
            record,
            values: HashMap::new(),
        })
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn field(&self, json_key: &str) -> Option<&Value> {
        self.record.get(json_key)
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        self.values.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// 依欄位順序輸出，未設定的欄位為 Null
    pub fn to_row(&self, columns: &[Column]) -> Row {
        Row {
            values: columns
                .iter()
                .map(|c| self.values.get(&c.name).cloned().unwrap_or(CellValue::Null))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<CellValue>,
}

/// Streams raw records of one table into the host's channel.
#[async_trait]
pub trait TableResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &FetchContext,
        client: &Client,
        parent: Option<&Resource>,
        res: mpsc::Sender<Item>,
    ) -> Result<()>;
}

/// 表格的宣告，註冊時經由 `build` 驗證
#[derive(Default)]
pub struct TableDef {
    pub name: String,
    pub description: String,
    pub transform: Option<Transform>,
    pub columns: Vec<Column>,
    pub relations: Vec<TableDef>,
    pub resolver: Option<Arc<dyn TableResolver>>,
}

impl TableDef {
    pub fn build(self) -> Result<Table> {
        if self.name.trim().is_empty() {
            return Err(SyncError::config("table name cannot be empty"));
        }

        let resolver = self.resolver.ok_or_else(|| {
            SyncError::config(format!("table '{}' has no resolver", self.name))
        })?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(SyncError::config(format!(
                    "table '{}' declares a column with an empty name",
                    self.name
                )));
            }
            if !seen.insert(column.name.clone()) {
                return Err(SyncError::config(format!(
                    "table '{}' declares column '{}' more than once",
                    self.name, column.name
                )));
            }
        }

        // 明確宣告的欄位在前，同名的自動欄位被覆蓋
        let mut columns = self.columns;
        if let Some(transform) = &self.transform {
            for generated in transform.columns()? {
                match columns.iter_mut().find(|c| c.name == generated.name) {
                    Some(explicit) => explicit.primary_key |= generated.primary_key,
                    None => columns.push(generated),
                }
            }
        }

        if columns.is_empty() {
            return Err(SyncError::config(format!(
                "table '{}' has no columns",
                self.name
            )));
        }

        let mut relation_names = HashSet::new();
        let mut relations = Vec::with_capacity(self.relations.len());
        for relation in self.relations {
            let relation = relation.build()?;
            if relation.name == self.name || !relation_names.insert(relation.name.clone()) {
                return Err(SyncError::config(format!(
                    "table '{}' declares relation '{}' more than once",
                    self.name, relation.name
                )));
            }
            relations.push(relation);
        }

        Ok(Table {
            name: self.name,
            description: self.description,
            columns,
            relations,
            resolver,
        })
    }
}

/// A validated table descriptor.
pub struct Table {
    name: String,
    description: String,
    columns: Vec<Column>,
    relations: Vec<Table>,
    resolver: Arc<dyn TableResolver>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn relations(&self) -> &[Table] {
        &self.relations
    }

    pub fn resolver(&self) -> &Arc<dyn TableResolver> {
        &self.resolver
    }

    /// Names of this table and all of its relations, depth first.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for relation in &self.relations {
            names.extend(relation.table_names());
        }
        names
    }

    /// 解析單一欄位，並把結果寫入 resource
    pub fn resolve_column(
        &self,
        client: &Client,
        parent: Option<&Resource>,
        resource: &mut Resource,
        column: &Column,
    ) -> Result<()> {
        match &column.resolver {
            ColumnResolver::Field(key) => {
                let value = match resource.field(key) {
                    Some(value) => CellValue::from_json(value, column.column_type)
                        .map_err(|msg| SyncError::resolution(&self.name, &column.name, msg))?,
                    None => CellValue::Null,
                };
                resource.set(&column.name, value);
                Ok(())
            }
            ColumnResolver::ParentField(key) => {
                let parent = parent.ok_or_else(|| {
                    SyncError::resolution(&self.name, &column.name, "no parent resource")
                })?;
                let value = match parent.field(key) {
                    Some(value) => CellValue::from_json(value, column.column_type)
                        .map_err(|msg| SyncError::resolution(&self.name, &column.name, msg))?,
                    None => CellValue::Null,
                };
                resource.set(&column.name, value);
                Ok(())
            }
            ColumnResolver::Custom(resolve) => resolve(client, resource, column),
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("relations", &self.relations)
            .finish()
    }
}
