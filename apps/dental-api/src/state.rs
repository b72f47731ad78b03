use std::sync::Arc;

use dental_db::Database;

use crate::auth::TokenKeys;

/// Estado compartilhado pelos handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenKeys) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
        }
    }
}
