use std::net::SocketAddr;

use clap::Parser;
use dental_db::DbConfig;

/// API REST da clínica odontológica
#[derive(Debug, Clone, Parser)]
#[command(name = "dental-api", version, about)]
pub struct Cli {
    /// Endereço de escuta
    #[arg(long, env = "DENTAL_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Arquivo SQLite
    #[arg(long, env = "DENTAL_DB_PATH", default_value = "data/dental.db")]
    pub db_path: String,

    /// Frase-senha que desbloqueia a chave mestra das anotações clínicas
    #[arg(long, env = "DENTAL_KEY_PHRASE", hide_env_values = true)]
    pub key_phrase: String,

    #[arg(long, env = "DENTAL_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Segredo HMAC dos tokens de acesso
    #[arg(long, env = "DENTAL_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Validade do token, de 1 minuto a 1 ano
    #[arg(
        long,
        env = "DENTAL_TOKEN_TTL_MINUTES",
        default_value_t = 480,
        value_parser = clap::value_parser!(i64).range(1..=crate::auth::MAX_TOKEN_TTL_MINUTES)
    )]
    pub token_ttl_minutes: i64,

    /// E-mail do administrador criado quando o banco não tem usuários
    #[arg(long, env = "DENTAL_ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "DENTAL_ADMIN_PASSWORD", hide_env_values = true, requires = "admin_email")]
    pub admin_password: Option<String>,

    /// Origem liberada para CORS (pode repetir)
    #[arg(long = "cors-origin", env = "DENTAL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Máximo de requisições atendidas ao mesmo tempo
    #[arg(long, env = "DENTAL_CONCURRENCY_LIMIT", default_value_t = 256)]
    pub concurrency_limit: usize,

    /// Logs em JSON
    #[arg(long, env = "DENTAL_LOG_JSON")]
    pub log_json: bool,

    /// Registra cada comando SQL executado
    #[arg(long)]
    pub trace_sql: bool,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            db_path: self.db_path.clone(),
            key_phrase: self.key_phrase.clone(),
            max_connections: self.max_connections,
            trace_level: u8::from(self.trace_sql),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            cors_origins: self.cors_origins.clone(),
            concurrency_limit: self.concurrency_limit,
        }
    }
}

/// Camadas HTTP do roteador
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub cors_origins: Vec<String>,
    pub concurrency_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            concurrency_limit: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "dental-api",
            "--key-phrase",
            "frase",
            "--jwt-secret",
            "segredo",
            "--cors-origin",
            "http://localhost:4200",
            "--cors-origin",
            "http://localhost:8100",
            "--max-connections",
            "9",
        ])
        .unwrap();

        assert_eq!(cli.bind.port(), 8080);
        assert_eq!(cli.cors_origins.len(), 2);
        let db = cli.db_config();
        assert_eq!(db.max_connections, 9);
        assert_eq!(db.trace_level, 0);
        assert_eq!(db.db_path, "data/dental.db");
    }

    #[test]
    fn token_ttl_must_be_within_a_year() {
        let parse = |ttl: &str| {
            Cli::try_parse_from([
                "dental-api",
                "--key-phrase",
                "frase",
                "--jwt-secret",
                "segredo",
                "--token-ttl-minutes",
                ttl,
            ])
        };
        assert_eq!(parse("60").unwrap().token_ttl_minutes, 60);
        assert!(parse("0").is_err());
        assert!(parse("525601").is_err());
        assert!(parse("9223372036854775807").is_err());
    }

    #[test]
    fn admin_email_requires_password() {
        let parsed = Cli::try_parse_from([
            "dental-api",
            "--key-phrase",
            "frase",
            "--jwt-secret",
            "segredo",
            "--admin-email",
            "admin@clinica.bo",
        ]);
        assert!(parsed.is_err());
    }
}
