use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Payment gateway (bill creation / status query) credentials.
#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    /// Collection the bills are created under.
    pub collection_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CLEANING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CLEANING_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let db_url = env::var("CLEANING_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("CLEANING_DATABASE_URL must be set"))?;
        let max_connections = env::var("CLEANING_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("CLEANING_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let gateway_base_url = env::var("GATEWAY_API_BASE_URL")
            .unwrap_or_else(|_| "https://gateway.example.com/api/v3".to_string());
        let gateway_api_key = env::var("GATEWAY_API_KEY").unwrap_or_default();
        let gateway_webhook_secret = env::var("GATEWAY_WEBHOOK_SECRET").unwrap_or_default();
        let gateway_collection_id = env::var("GATEWAY_COLLECTION_ID").unwrap_or_default();

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            gateway: GatewayConfig {
                api_base_url: gateway_base_url,
                api_key: Secret::new(gateway_api_key),
                webhook_secret: Secret::new(gateway_webhook_secret),
                collection_id: gateway_collection_id,
            },
            service_name: "cleaning-service".to_string(),
        })
    }
}
