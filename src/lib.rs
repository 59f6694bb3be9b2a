pub mod backend;
pub use backend::*;

pub mod cache;
pub use cache::FolderMessageCache;

pub mod domain;
pub use domain::*;

pub mod notify;

pub mod refresh;
pub use refresh::{FolderHandle, RefreshSnapshot, RefreshState};

pub mod session;
pub use session::CacheSession;

pub mod store;
