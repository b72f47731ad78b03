//! Repositórios: acesso ao banco por entidade
//!
//! Funções livres que recebem o pool (ou uma conexão de transação). Operações
//! que envolvem várias tabelas rodam numa única transação.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbResult;
use crate::models::{Page, Paginated};

pub mod appointments;
pub mod doctors;
pub mod medical;
pub mod patients;
pub mod payments;
pub mod schedules;
pub mod treatments;
pub mod users;

/// Padrão LIKE para busca textual parcial
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Executa uma listagem paginada: `push_filters` recebe o construtor já com a
/// cláusula `WHERE 1=1` e acrescenta os filtros, tanto na contagem quanto na
/// busca dos itens.
pub(crate) async fn paginate<T, F>(
    pool: &SqlitePool,
    select: &str,
    from: &str,
    order_by: &str,
    page: Page,
    push_filters: F,
) -> DbResult<Paginated<T>>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    F: for<'q> Fn(&mut QueryBuilder<'q, Sqlite>),
{
    let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE 1=1", from));
    push_filters(&mut count);
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    let mut items =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM {} WHERE 1=1", select, from));
    push_filters(&mut items);
    items.push(format!(" ORDER BY {} LIMIT ", order_by));
    items.push_bind(page.limit());
    items.push(" OFFSET ");
    items.push_bind(page.offset());
    let items: Vec<T> = items.build_query_as().fetch_all(pool).await?;

    Ok(Paginated {
        items,
        total,
        limit: page.limit(),
        offset: page.offset(),
    })
}

/// Garante o lock de escrita do SQLite antes de ler dados que decidem uma
/// escrita. Sem isso, duas transações poderiam validar a mesma agenda e gravar
/// consultas sobrepostas. Devolve `false` se a linha não existe.
pub(crate) async fn lock_row(conn: &mut SqliteConnection, table: &str, id: uuid::Uuid) -> DbResult<bool> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET updated_at = updated_at WHERE id = ?",
        table
    ))
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Instante UTC em que o dia `date` começa no fuso `tz`
///
/// Onde a meia-noite não existe (início do horário de verão) vale a primeira
/// hora válida do dia.
pub(crate) fn local_day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..3)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Intervalo UTC semiaberto que cobre os dias locais `from..=to`
pub(crate) fn local_days<Tz: TimeZone>(
    tz: &Tz,
    from: NaiveDate,
    to: NaiveDate,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_day_start(tz, from), local_day_start(tz, to + Duration::days(1)))
}
