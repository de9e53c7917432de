use anyhow::Context;

/// Process configuration, read once at boot and injected into `AppState`.
/// Nothing re-reads the environment at request time.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub api_key: Option<String>,
    pub service_identity: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Blank counts as unset: the gate then rejects every request.
        let api_key = std::env::var("MATERIAL_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let service_identity = std::env::var("SERVICE_IDENTITY")
            .unwrap_or_else(|_| "material-registry-api".into())
            .trim()
            .to_string();
        if service_identity.is_empty() {
            anyhow::bail!("SERVICE_IDENTITY must not be blank");
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            api_key,
            service_identity,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a number")?,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
