use crate::client::{Client, FetchContext};
use crate::domain::model::{Item, UserAlias};
use crate::domain::schema::{
    Column, ColumnResolver, ColumnType, Resource, TableDef, TableResolver, Transform,
};
use crate::resources::customer_id_column;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const TABLE_NAME: &str = "googleworkspace_user_aliases";

/// 使用者別名，以父表的 `id` 連結
pub fn user_aliases_table() -> TableDef {
    TableDef {
        name: TABLE_NAME.to_string(),
        description: "Google Workspace User Aliases".to_string(),
        transform: Some(Transform::with_struct::<UserAlias>(&["alias"])),
        columns: vec![
            customer_id_column(),
            Column::new(
                "user_id",
                ColumnType::String,
                ColumnResolver::ParentField("id"),
            )
            .primary_key(),
        ],
        relations: vec![],
        resolver: Some(Arc::new(FetchUserAliases)),
    }
}

pub struct FetchUserAliases;

#[async_trait]
impl TableResolver for FetchUserAliases {
    async fn resolve(
        &self,
        ctx: &FetchContext,
        client: &Client,
        parent: Option<&Resource>,
        res: mpsc::Sender<Item>,
    ) -> Result<()> {
        let user = parent.and_then(|p| p.item().as_user()).ok_or_else(|| {
            SyncError::config(format!("{} must be synced as a relation of users", TABLE_NAME))
        })?;

        ctx.check()?;
        let page = client.directory().list_user_aliases(&user.id).await?;
        tracing::debug!("{}: user {} has {} aliases", TABLE_NAME, user.id, page.aliases.len());

        for alias in page.aliases {
            ctx.send(&res, Item::Alias(alias)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AliasesPage, ListUsersRequest, RawUser, UsersPage};
    use crate::domain::ports::DirectoryApi;
    use crate::domain::schema::CellValue;

    struct AliasDirectory;

    #[async_trait]
    impl DirectoryApi for AliasDirectory {
        async fn list_users(&self, _request: &ListUsersRequest) -> Result<UsersPage> {
            Ok(UsersPage::default())
        }

        async fn list_user_aliases(&self, user_key: &str) -> Result<AliasesPage> {
            Ok(AliasesPage {
                aliases: vec![
                    UserAlias {
                        alias: format!("{}-a@example.com", user_key),
                        id: Some(user_key.to_string()),
                        ..Default::default()
                    },
                    UserAlias {
                        alias: format!("{}-b@example.com", user_key),
                        id: Some(user_key.to_string()),
                        ..Default::default()
                    },
                ],
            })
        }
    }

    fn parent(id: &str) -> Resource {
        Resource::new(Item::User(RawUser {
            id: id.to_string(),
            ..Default::default()
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetches_aliases_of_parent() {
        let client = Client::new("C0123", Arc::new(AliasDirectory));
        let parent = parent("1001");
        let (tx, mut rx) = mpsc::channel(4);

        FetchUserAliases
            .resolve(&FetchContext::new(), &client, Some(&parent), tx)
            .await
            .unwrap();

        let mut aliases = Vec::new();
        while let Some(Item::Alias(alias)) = rx.recv().await {
            aliases.push(alias.alias);
        }
        assert_eq!(aliases, vec!["1001-a@example.com", "1001-b@example.com"]);
    }

    #[tokio::test]
    async fn test_requires_parent_user() {
        let client = Client::new("C0123", Arc::new(AliasDirectory));
        let (tx, _rx) = mpsc::channel(4);
        let result = FetchUserAliases
            .resolve(&FetchContext::new(), &client, None, tx)
            .await;
        assert!(matches!(result, Err(SyncError::ConfigError { .. })));
    }

    #[test]
    fn test_user_id_links_to_parent() {
        let table = user_aliases_table().build().unwrap();
        assert_eq!(table.primary_keys(), vec!["user_id", "alias"]);

        let client = Client::new("C0123", Arc::new(AliasDirectory));
        let parent = parent("1001");
        let mut resource = Resource::new(Item::Alias(UserAlias {
            alias: "ann.lee@example.com".to_string(),
            ..Default::default()
        }))
        .unwrap();
        for column in table.columns() {
            table
                .resolve_column(&client, Some(&parent), &mut resource, column)
                .unwrap();
        }

        assert_eq!(
            resource.get("user_id"),
            Some(&CellValue::String("1001".to_string()))
        );
        assert_eq!(
            resource.get("alias"),
            Some(&CellValue::String("ann.lee@example.com".to_string()))
        );
        assert_eq!(resource.get("primary_email"), Some(&CellValue::Null));
    }
}
