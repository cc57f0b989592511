pub mod document_fetcher;
pub mod file_ops;
pub mod json_path;
pub mod oauth2_client;
pub mod pkce;
pub mod placeholders;

pub use document_fetcher::DocumentFetcher;
pub use file_ops::SupplierDirs;
pub use json_path::extract_json_values;
pub use oauth2_client::OAuth2Client;
pub use pkce::PkcePair;
