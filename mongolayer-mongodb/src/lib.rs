//! MongoDB backend for mongolayer.
//!
//! [`MongoDbStore`] implements `StoreBackend` for one database of a deployment,
//! passing expressions to the official driver untouched. [`MongoConnection`] owns
//! the driver client and one `Registry` per database in use.
//!
//! Enable it through the facade crate:
//!
//! ```toml
//! [dependencies]
//! mongolayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::{mongodb::MongoConnection, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> MongoLayerResult<()> {
//!     let mut connection = MongoConnection::builder("mongodb://localhost:27017/app")
//!         .app_name("billing")
//!         .build()
//!         .await?;
//!
//!     connection.registry_mut("app")?.load::<Invoice>("invoices")?;
//!
//!     let invoices = connection.registry("app")?.get::<Invoice>()?;
//!     let open = invoices.find_many(Filter::eq("status", "open")).await?;
//!
//!     connection.shutdown().await
//! }
//! ```

pub mod connection;
pub mod store;

pub use connection::{ConnectionConfig, MongoConnection, MongoConnectionBuilder};
pub use store::MongoDbStore;
