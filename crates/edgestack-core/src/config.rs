//! Configuration for the edge layer.
//!
//! All configuration is driven by environment variables so the same binary
//! runs unchanged in a cloud function and on a local socket.

/// Global configuration for EdgeStack.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeConfig {
    /// Bind address for the socket transport.
    pub listen: String,
    /// Maximum inbound hop count before a request is rejected.
    pub recursion_limit: u32,
    /// Base URL of the asset storage origin.
    pub asset_origin: String,
    /// Base URL of the locally-running user application process.
    pub app_origin: String,
    /// Log level.
    pub log_level: String,
    /// Optional path to a declarative routes JSON file.
    pub routes_file: Option<String>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3210".to_owned(),
            recursion_limit: 5,
            asset_origin: "http://127.0.0.1:3211".to_owned(),
            app_origin: "http://127.0.0.1:3000".to_owned(),
            log_level: "info".to_owned(),
            routes_file: None,
        }
    }
}

impl EdgeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("EDGE_LISTEN") {
            config.listen = v;
        }
        if let Ok(v) = std::env::var("EDGE_RECURSION_LIMIT") {
            if let Ok(limit) = v.parse() {
                config.recursion_limit = limit;
            }
        }
        if let Ok(v) = std::env::var("EDGE_ASSET_ORIGIN") {
            config.asset_origin = v;
        }
        if let Ok(v) = std::env::var("EDGE_APP_ORIGIN") {
            config.app_origin = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("EDGE_ROUTES_FILE") {
            config.routes_file = Some(v);
        }

        config
    }
}
