pub mod user_aliases;
pub mod users;

use crate::client::Client;
use crate::domain::schema::{CellValue, Column, ColumnResolver, ColumnType, Resource, TableDef};
use crate::utils::error::Result;

/// `customer_id` 來自 client 設定，不是記錄本身
pub fn customer_id_column() -> Column {
    Column::new(
        "customer_id",
        ColumnType::String,
        ColumnResolver::Custom(resolve_customer_id),
    )
}

fn resolve_customer_id(client: &Client, resource: &mut Resource, column: &Column) -> Result<()> {
    resource.set(&column.name, CellValue::String(client.customer_id().to_string()));
    Ok(())
}

/// Top-level tables exposed by this source.
pub fn tables() -> Vec<TableDef> {
    vec![users::users_table()]
}
