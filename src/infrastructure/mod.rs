pub mod archive;
pub mod chrome_session;
pub mod download_tracker;
pub mod js_executor;
pub mod page_driver;
pub mod token_cache;

pub use archive::{DocumentArchive, HashedArchive};
pub use chrome_session::ChromeSession;
pub use download_tracker::DownloadTracker;
pub use js_executor::JsExecutor;
pub use page_driver::{DownloadMode, Locator, PageDriver, WaitUntil};
pub use token_cache::TokenCache;
