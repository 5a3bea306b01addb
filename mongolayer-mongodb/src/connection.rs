//! Connection management: one driver client, one [`Registry`] per database.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mongodb::{Client, options::ClientOptions};

use mongolayer_core::{
    codec::CodecOptions,
    error::{MongoLayerError, MongoLayerResult},
    registry::{DuplicatePolicy, Registry},
};

use crate::store::MongoDbStore;

/// Serializable connection settings.
///
/// ```ignore
/// let config: ConnectionConfig = serde_json::from_str(r#"{
///     "uri": "mongodb://localhost:27017/app",
///     "app_name": "billing",
///     "codec": { "uuid_representation": "string" }
/// }"#)?;
/// let connection = MongoConnection::from_config(config).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub uri: String,
    /// Overrides the default database named by `uri`.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub codec: CodecOptions,
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: None,
            app_name: None,
            codec: CodecOptions::default(),
        }
    }

    /// Parses settings from a JSON string.
    pub fn from_json(json: &str) -> MongoLayerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`MongoConnection`].
#[derive(Debug, Clone)]
pub struct MongoConnectionBuilder {
    dsn: String,
    database: Option<String>,
    app_name: Option<String>,
    codec: CodecOptions,
    policy: DuplicatePolicy,
}

impl MongoConnectionBuilder {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            database: None,
            app_name: None,
            codec: CodecOptions::default(),
            policy: DuplicatePolicy::default(),
        }
    }

    /// Codec options handed to every registry the connection creates.
    pub fn codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Uses `database` as the default database instead of the one in the DSN.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parses the DSN and creates the client.
    ///
    /// The driver connects lazily, so this does not wait for a server. If a
    /// default database is known, its registry is loaded before returning.
    pub async fn build(self) -> MongoLayerResult<MongoConnection> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| MongoLayerError::Initialization(format!("Invalid connection string: {e}")))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }

        let default_database = self
            .database
            .or_else(|| options.default_database.clone());

        let client = Client::with_options(options)
            .map_err(|e| MongoLayerError::Initialization(format!("Failed to create client: {e}")))?;

        let mut connection = MongoConnection {
            client,
            default_database,
            codec: self.codec,
            policy: self.policy,
            registries: HashMap::new(),
        };

        if let Some(name) = connection.default_database.clone() {
            connection.load_database(name);
        }

        debug!(
            default_database = connection.default_database.as_deref(),
            "opened MongoDB connection"
        );

        Ok(connection)
    }
}

/// A MongoDB client together with the registries of the databases in use.
///
/// ```ignore
/// let mut connection = MongoConnection::builder("mongodb://localhost:27017/app")
///     .build()
///     .await?;
///
/// let registry = connection.load_database("app");
/// registry.load::<User>("users")?;
///
/// let users = connection.registry("app")?.get::<User>()?;
/// ```
#[derive(Debug)]
pub struct MongoConnection {
    client: Client,
    default_database: Option<String>,
    codec: CodecOptions,
    policy: DuplicatePolicy,
    registries: HashMap<String, Registry<MongoDbStore>>,
}

impl MongoConnection {
    pub fn builder(dsn: impl Into<String>) -> MongoConnectionBuilder {
        MongoConnectionBuilder::new(dsn)
    }

    pub async fn from_config(config: ConnectionConfig) -> MongoLayerResult<Self> {
        let mut builder = MongoConnectionBuilder::new(config.uri).codec(config.codec);

        if let Some(database) = config.database {
            builder = builder.database(database);
        }
        if let Some(app_name) = config.app_name {
            builder = builder.app_name(app_name);
        }

        builder.build().await
    }

    /// Returns the default database name.
    pub fn default_database(&self) -> MongoLayerResult<&str> {
        self.default_database
            .as_deref()
            .ok_or_else(|| MongoLayerError::Initialization("No default database configured".to_string()))
    }

    /// Returns the registry for `name`, creating an empty one on first use.
    pub fn load_database(&mut self, name: impl Into<String>) -> &mut Registry<MongoDbStore> {
        let name = name.into();
        let client = &self.client;
        let codec = self.codec;
        let policy = self.policy;

        self.registries
            .entry(name)
            .or_insert_with_key(|name| {
                debug!(database = %name, "loading database registry");

                Registry::new(MongoDbStore::new(client.clone(), name.clone()))
                    .with_codec(codec)
                    .with_policy(policy)
            })
    }

    pub fn load_databases<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.load_database(name);
        }
    }

    pub fn registry(&self, name: &str) -> MongoLayerResult<&Registry<MongoDbStore>> {
        self.registries
            .get(name)
            .ok_or_else(|| MongoLayerError::NotRegistered(format!("database {name}")))
    }

    pub fn registry_mut(&mut self, name: &str) -> MongoLayerResult<&mut Registry<MongoDbStore>> {
        self.registries
            .get_mut(name)
            .ok_or_else(|| MongoLayerError::NotRegistered(format!("database {name}")))
    }

    /// Registry of the default database.
    pub fn default_registry(&self) -> MongoLayerResult<&Registry<MongoDbStore>> {
        self.registry(self.default_database()?)
    }

    /// Names of the databases with a loaded registry, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registries
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// A backend for `name` outside of any registry.
    pub fn store(&self, name: impl Into<String>) -> MongoDbStore {
        MongoDbStore::new(self.client.clone(), name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn codec(&self) -> &CodecOptions {
        &self.codec
    }

    /// Closes the client and drops every registry.
    pub async fn shutdown(self) -> MongoLayerResult<()> {
        debug!("shutting down MongoDB connection");
        self.client.shutdown().await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongolayer_core::codec::UuidRepresentation;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        name: String,
    }

    #[tokio::test]
    async fn loads_default_database_from_dsn() {
        let connection = MongoConnection::builder("mongodb://localhost:27017/app")
            .build()
            .await
            .unwrap();

        assert_eq!(connection.default_database().unwrap(), "app");
        assert!(connection.registry("app").is_ok());
        assert_eq!(connection.default_registry().unwrap().backend().database(), "app");
        assert_eq!(connection.database_names(), vec!["app".to_string()]);
    }

    #[tokio::test]
    async fn missing_default_database() {
        let connection = MongoConnection::builder("mongodb://localhost:27017")
            .build()
            .await
            .unwrap();

        assert!(matches!(connection.default_database(), Err(MongoLayerError::Initialization(_))));
        assert!(connection.database_names().is_empty());
    }

    #[tokio::test]
    async fn unknown_registry_is_not_registered() {
        let mut connection = MongoConnection::builder("mongodb://localhost:27017/app")
            .build()
            .await
            .unwrap();

        assert!(matches!(connection.registry("other"), Err(MongoLayerError::NotRegistered(_))));
        assert!(matches!(connection.registry_mut("other"), Err(MongoLayerError::NotRegistered(_))));

        connection.load_databases(["other", "audit"]);
        assert_eq!(connection.database_names(), vec!["app", "audit", "other"]);
    }

    #[tokio::test]
    async fn load_database_keeps_existing_registrations() {
        let mut connection = MongoConnection::builder("mongodb://localhost:27017/app")
            .build()
            .await
            .unwrap();

        let handle = connection
            .load_database("app")
            .load::<Account>("accounts")
            .unwrap();

        let again = connection.load_database("app").get::<Account>().unwrap();
        assert!(std::sync::Arc::ptr_eq(&handle, &again));
        assert_eq!(again.backend().database(), "app");
    }

    #[tokio::test]
    async fn invalid_dsn_fails_initialization() {
        let result = MongoConnection::builder("not a connection string").build().await;

        assert!(matches!(result, Err(MongoLayerError::Initialization(_))));
    }

    #[tokio::test]
    async fn opens_from_json_config() {
        let config = ConnectionConfig::from_json(r#"{
            "uri": "mongodb://localhost:27017/app",
            "database": "reports",
            "codec": { "uuid_representation": "string" }
        }"#)
        .unwrap();

        assert_eq!(config.app_name, None);
        assert_eq!(config.codec.uuid_representation, UuidRepresentation::String);

        let connection = MongoConnection::from_config(config).await.unwrap();

        assert_eq!(connection.default_database().unwrap(), "reports");
        assert_eq!(connection.registry("reports").unwrap().codec().uuid_representation, UuidRepresentation::String);
        assert!(connection.registry("app").is_err());
    }

    #[test]
    fn config_defaults() {
        let config = ConnectionConfig::from_json(r#"{ "uri": "mongodb://localhost" }"#).unwrap();

        assert_eq!(config, ConnectionConfig::new("mongodb://localhost"));
        assert!(ConnectionConfig::from_json("{}").is_err());
    }
}
