use crate::client::{Client, FetchContext};
use crate::domain::model::{Item, ListUsersRequest, Projection, RawUser};
use crate::domain::schema::{
    CellValue, Column, ColumnResolver, ColumnType, Resource, TableDef, TableResolver, Transform,
};
use crate::resources::{customer_id_column, user_aliases::user_aliases_table};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const TABLE_NAME: &str = "googleworkspace_users";

pub fn users_table() -> TableDef {
    TableDef {
        name: TABLE_NAME.to_string(),
        description: "Google Workspace Users".to_string(),
        transform: Some(Transform::with_struct::<RawUser>(&["id"])),
        columns: vec![
            customer_id_column(),
            Column::new(
                "first_name",
                ColumnType::String,
                ColumnResolver::Custom(resolve_first_name),
            ),
            Column::new(
                "last_name",
                ColumnType::String,
                ColumnResolver::Custom(resolve_last_name),
            ),
            Column::new(
                "organizations",
                ColumnType::Json,
                ColumnResolver::Custom(resolve_organizations),
            ),
        ],
        relations: vec![user_aliases_table()],
        resolver: Some(Arc::new(FetchUsers)),
    }
}

fn user<'a>(resource: &'a Resource, column: &Column) -> Result<&'a RawUser> {
    resource
        .item()
        .as_user()
        .ok_or_else(|| SyncError::resolution(TABLE_NAME, &column.name, "record is not a user"))
}

fn resolve_first_name(_client: &Client, resource: &mut Resource, column: &Column) -> Result<()> {
    let given = user(resource, column)?
        .name
        .as_ref()
        .and_then(|name| name.given_name.clone());
    if let Some(given) = given {
        resource.set(&column.name, CellValue::String(given));
    }
    Ok(())
}

fn resolve_last_name(_client: &Client, resource: &mut Resource, column: &Column) -> Result<()> {
    let family = user(resource, column)?
        .name
        .as_ref()
        .and_then(|name| name.family_name.clone());
    if let Some(family) = family {
        resource.set(&column.name, CellValue::String(family));
    }
    Ok(())
}

/// `organizations` 的型別在 API 中未定義，只有是陣列時才輸出
#[derive(Debug, Clone, PartialEq)]
pub enum OrganizationsShape<'a> {
    Known(&'a [Value]),
    Unknown,
}

impl<'a> OrganizationsShape<'a> {
    pub fn of(value: &'a Option<Value>) -> Self {
        match value {
            Some(Value::Array(items)) => OrganizationsShape::Known(items),
            _ => OrganizationsShape::Unknown,
        }
    }
}

fn resolve_organizations(_client: &Client, resource: &mut Resource, column: &Column) -> Result<()> {
    let encoded = match OrganizationsShape::of(&user(resource, column)?.organizations) {
        OrganizationsShape::Known(orgs) => serde_json::to_string(orgs)
            .map_err(|e| SyncError::resolution(TABLE_NAME, &column.name, e.to_string()))?,
        OrganizationsShape::Unknown => return Ok(()),
    };
    resource.set(&column.name, CellValue::Json(encoded));
    Ok(())
}

/// Walks every page of `users.list` for the client's customer.
pub struct FetchUsers;

#[async_trait]
impl TableResolver for FetchUsers {
    async fn resolve(
        &self,
        ctx: &FetchContext,
        client: &Client,
        _parent: Option<&Resource>,
        res: mpsc::Sender<Item>,
    ) -> Result<()> {
        let mut request = ListUsersRequest {
            customer: client.customer_id().to_string(),
            projection: Projection::Full,
            max_results: client.page_size(),
            page_token: None,
        };

        let mut page_number = 0usize;
        loop {
            ctx.check()?;
            page_number += 1;

            let page = client.directory().list_users(&request).await?;
            tracing::debug!(
                "{}: page {} returned {} users",
                TABLE_NAME,
                page_number,
                page.users.len()
            );

            let next = page.next_token().map(str::to_string);
            for user in page.users {
                ctx.send(&res, Item::User(user)).await?;
            }

            match next {
                Some(token) => request.page_token = Some(token),
                None => return Ok(()),
            }
        }
    }
}
