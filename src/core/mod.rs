pub mod engine;
pub mod load;

pub use crate::domain::model::{Item, RawUser, UserAlias};
pub use crate::domain::ports::{ConfigProvider, DirectoryApi, Storage};
pub use crate::utils::error::Result;
