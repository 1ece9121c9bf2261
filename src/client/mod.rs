pub mod directory;

use crate::domain::ports::{ConfigProvider, DirectoryApi};
use crate::utils::error::{Result, SyncError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

pub use directory::DirectoryHttpClient;

pub const DEFAULT_CUSTOMER_ID: &str = "my_customer";
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Session shared by every table of a sync run.
#[derive(Clone)]
pub struct Client {
    customer_id: String,
    page_size: u32,
    directory: Arc<dyn DirectoryApi>,
}

impl Client {
    pub fn new(customer_id: impl Into<String>, directory: Arc<dyn DirectoryApi>) -> Self {
        Self {
            customer_id: customer_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            directory,
        }
    }

    /// 依設定建立 HTTP 目錄客戶端
    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let directory = DirectoryHttpClient::new(
            config.base_url(),
            config.access_token().map(str::to_string),
            config.timeout_seconds().map(Duration::from_secs),
        )?;
        Ok(Self::new(config.customer_id(), Arc::new(directory)).with_page_size(config.page_size()))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn directory(&self) -> &dyn DirectoryApi {
        self.directory.as_ref()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("customer_id", &self.customer_id)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// 可取消的 fetch 上下文
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `SyncError::Cancelled` once the context has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// 推送一筆記錄；channel 滿時等待，期間被取消則回傳 Cancelled
    pub async fn send<T: Send>(&self, res: &mpsc::Sender<T>, item: T) -> Result<()> {
        let item = match res.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(SyncError::ChannelClosed),
            Err(TrySendError::Full(item)) => item,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            sent = res.send(item) => sent.map_err(|_| SyncError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_cancel_only_fails_when_full() {
        let ctx = FetchContext::new();
        let (tx, mut rx) = mpsc::channel(1);

        ctx.send(&tx, 1).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));

        ctx.cancel();
        // 有空位時照常送出，滿了才回報取消
        ctx.send(&tx, 2).await.unwrap();
        assert!(matches!(ctx.send(&tx, 3).await, Err(SyncError::Cancelled)));
        assert!(matches!(ctx.check(), Err(SyncError::Cancelled)));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_send_to_closed_channel() {
        let ctx = FetchContext::new();
        let (tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);
        assert!(matches!(ctx.send(&tx, 1).await, Err(SyncError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_channel() {
        let ctx = FetchContext::new();
        let (tx, _rx) = mpsc::channel(1);
        ctx.send(&tx, 1).await.unwrap();

        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.send(&tx, 2).await });
        ctx.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }
}
