use sea_orm::sea_query::{Alias, Asterisk, Expr, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

/// Number of rows currently in `table`.
pub async fn count_rows(db: &DatabaseConnection, table: &str) -> Result<u64, DbErr> {
    let query = Query::select()
        .expr_as(Expr::col(Asterisk).count(), Alias::new("count"))
        .from(Alias::new(table))
        .to_owned();

    let backend = db.get_database_backend();
    let count: i64 = match db.query_one(backend.build(&query)).await? {
        Some(row) => row.try_get("", "count")?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, RuntimeErr, Transaction, Value};

    #[tokio::test]
    async fn reads_the_count_column() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([("count", Value::BigInt(Some(150)))])]])
            .into_connection();

        assert_eq!(count_rows(&db, "pms_patients").await.unwrap(), 150);

        assert_eq!(
            db.into_transaction_log(),
            vec![Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"SELECT COUNT(*) AS "count" FROM "pms_patients""#,
                Vec::<Value>::new(),
            )]
        );
    }

    #[tokio::test]
    async fn propagates_query_errors() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                "no such table: pms_patients".to_string(),
            ))])
            .into_connection();

        assert!(count_rows(&db, "pms_patients").await.is_err());
    }
}
