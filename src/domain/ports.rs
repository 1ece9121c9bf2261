use crate::domain::model::{AliasesPage, ListUsersRequest, UsersPage};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn customer_id(&self) -> &str;
    fn base_url(&self) -> &str;
    fn access_token(&self) -> Option<&str>;
    fn page_size(&self) -> u32;
    fn timeout_seconds(&self) -> Option<u64>;
    fn formats(&self) -> &[String];
    fn zip_output(&self) -> bool;
}

/// 目錄服務 API；每個方法對應一次 HTTP 呼叫，不做重試
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn list_users(&self, request: &ListUsersRequest) -> Result<UsersPage>;
    async fn list_user_aliases(&self, user_key: &str) -> Result<AliasesPage>;
}
