//! Modelos de dados da clínica odontológica
//!
//! Cada entidade tem o registro persistido e as estruturas de entrada
//! (`New*` para criação, `*Update` para alteração parcial).

use serde::{Deserialize, Serialize};

mod appointment;
mod doctor;
mod medical;
mod patient;
mod payment;
mod treatment;
mod user;
pub mod validation;

pub use appointment::*;
pub use doctor::*;
pub use medical::*;
pub use patient::*;
pub use payment::*;
pub use treatment::*;
pub use user::*;

/// Paginação simples por limite/deslocamento
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Lista paginada com o total de registros que satisfazem o filtro
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limit() {
        let page = Page {
            limit: Some(10_000),
            offset: Some(-3),
        };
        assert_eq!(page.limit(), Page::MAX_LIMIT);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::default().limit(), Page::DEFAULT_LIMIT);
    }
}
