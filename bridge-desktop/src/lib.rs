//! # Desktop Bridge Implementations
//!
//! Default adapters for native hosts (macOS, Windows, Linux):
//! - `SettingsStore` on a SQLite key-value table (`sqlx`)
//! - `HttpClient` on `reqwest`
//! - `SocketConnector` on `tokio-tungstenite`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TungsteniteConnector};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = SqliteSettingsStore::new("/tmp/live/settings.db".into()).await.unwrap();
//!     let http = ReqwestHttpClient::new().unwrap();
//!     let sockets = TungsteniteConnector::new();
//!     // Hand these to CoreConfig::builder()
//! }
//! ```

mod http;
mod settings;
mod socket;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
pub use socket::TungsteniteConnector;
