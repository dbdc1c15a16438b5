use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    /// Admin login name. The credential pair lives in the environment, never
    /// in source.
    pub admin_usuario: String,
    /// Argon2 PHC string for the admin password, produced by `hashpass`.
    pub admin_senha_hash: String,
    /// Upper bound for a single patient lookup during appointment enrichment.
    pub paciente_lookup_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let admin_usuario = env::var("ADMIN_USUARIO")?;
        let admin_senha_hash = env::var("ADMIN_SENHA_HASH")?;
        let paciente_lookup_timeout_ms = env::var("PACIENTE_LOOKUP_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(2000);

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            admin_usuario,
            admin_senha_hash,
            paciente_lookup_timeout_ms,
        })
    }
}
