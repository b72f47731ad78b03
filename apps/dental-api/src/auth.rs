//! Autenticação: hash de senhas (Argon2), tokens JWT e extrator `AuthUser`

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use dental_db::models::{NewUser, Role, User};
use dental_db::{repo, Database, DbError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("falha ao gerar hash de senha: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Hash de senha armazenado inválido");
            false
        }
    }
}

/// Conteúdo do token de acesso
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub doctor_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// Validade máxima de um token (um ano)
pub const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

/// Chaves e validade dos tokens
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes.clamp(-MAX_TOKEN_TTL_MINUTES, MAX_TOKEN_TTL_MINUTES)),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            doctor_id: user.doctor_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("falha ao emitir token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::Unauthorized,
            })
    }
}

/// Usuário autenticado da requisição
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub doctor_id: Option<Uuid>,
}

impl AuthUser {
    pub fn require(&self, allowed: &[Role]) -> ApiResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, "Acesso negado");
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require(&[Role::Admin])
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    /// Médico vinculado ao usuário de perfil médico
    pub fn linked_doctor(&self) -> ApiResult<Uuid> {
        self.doctor_id.ok_or(ApiError::Forbidden)
    }

    /// Médicos só atuam sobre a própria agenda
    pub fn ensure_own_doctor(&self, doctor_id: Uuid) -> ApiResult<()> {
        if self.is_doctor() && self.doctor_id != Some(doctor_id) {
            warn!(user_id = %self.id, %doctor_id, "Médico tentando acessar agenda de outro médico");
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        let claims = state.tokens.verify(token)?;

        // Usuário removido depois da emissão do token
        let user = match repo::users::get(&state.db.pool, claims.sub).await {
            Ok(user) => user,
            Err(DbError::NotFound(_)) => return Err(ApiError::Unauthorized),
            Err(e) => return Err(e.into()),
        };
        if user.role == Role::Doctor && user.doctor_id.is_none() {
            warn!(user_id = %user.id, "Usuário médico sem cadastro de médico vinculado");
            return Err(ApiError::Forbidden);
        }

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
            doctor_id: user.doctor_id,
        })
    }
}

/// Cria o administrador inicial quando ainda não há usuários
pub async fn bootstrap_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<()> {
    if repo::users::count(&db.pool).await? > 0 {
        return Ok(());
    }

    let new = NewUser {
        email: email.to_string(),
        name: "Administrador".to_string(),
        password: password.to_string(),
        role: Role::Admin,
        doctor_id: None,
    };
    validator::Validate::validate(&new)?;
    let hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = repo::users::create(&db.pool, &new, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "Administrador inicial criado");
    Ok(())
}
