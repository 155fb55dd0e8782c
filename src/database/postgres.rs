use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use super::collection::{attach_relation, collect_references, Collection, CollectionError, FindQuery};
use super::sql_where::{order_by, SqlParam, SqlResult, SqlWhere, CREATE_DATE_CAST_FUNCTION, DATA_COLUMN};
use crate::filter::Predicate;

/// Collection stored as one JSONB document per row of `table`.
pub struct PgCollection {
    pool: PgPool,
    table: String,
    /// Relation field -> table holding the referenced documents
    relations: HashMap<String, String>,
}

impl PgCollection {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, CollectionError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table, relations: HashMap::new() })
    }

    pub fn with_relation(mut self, field: impl Into<String>, table: impl Into<String>) -> Result<Self, CollectionError> {
        let table = table.into();
        validate_table_name(&table)?;
        self.relations.insert(field.into(), table);
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the table and the date-cast function its date filters call
    pub async fn ensure_table(&self) -> Result<(), CollectionError> {
        sqlx::query(CREATE_DATE_CAST_FUNCTION).execute(&self.pool).await?;
        let query = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\"id\" BIGSERIAL PRIMARY KEY, {} JSONB NOT NULL)",
            self.table, DATA_COLUMN
        );
        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn insert(&self, document: &Value) -> Result<i64, CollectionError> {
        let query = format!("INSERT INTO \"{}\" ({}) VALUES ($1) RETURNING \"id\"", self.table, DATA_COLUMN);
        let row = sqlx::query(&query).bind(document.clone()).fetch_one(&self.pool).await?;
        Ok(row.try_get("id")?)
    }

    async fn populate(&self, documents: &mut [Value], field: &str) -> Result<(), CollectionError> {
        let table = self
            .relations
            .get(field)
            .ok_or_else(|| CollectionError::UnknownRelation(field.to_string()))?;
        let keys = collect_references(documents, field);

        let related = if keys.is_empty() {
            vec![]
        } else {
            let query = format!(
                "SELECT {col} FROM \"{table}\" WHERE lower(COALESCE({col} #>> '{{_id,$oid}}', {col} ->> '_id')) = ANY($1)",
                col = DATA_COLUMN,
                table = table
            );
            let rows = sqlx::query(&query).bind(&keys).fetch_all(&self.pool).await?;
            rows.iter().map(decode_document).collect::<Result<Vec<_>, _>>()?
        };

        attach_relation(documents, field, &related, "_id");
        Ok(())
    }
}

#[async_trait]
impl Collection for PgCollection {
    type Record = Value;
    type Error = CollectionError;

    fn name(&self) -> &str {
        &self.table
    }

    async fn find(&self, query: FindQuery<'_>) -> Result<Vec<Value>, CollectionError> {
        let sql_result = select_sql(&self.table, &query)?;
        debug!("find on {}: {}", self.table, sql_result.query);

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        let mut documents = rows.iter().map(decode_document).collect::<Result<Vec<_>, _>>()?;

        for field in query.populate {
            self.populate(&mut documents, field).await?;
        }
        Ok(documents)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, CollectionError> {
        let sql_result = count_sql(&self.table, predicate)?;
        debug!("count on {}: {}", self.table, sql_result.query);

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

pub fn select_sql(table: &str, query: &FindQuery<'_>) -> Result<SqlResult, CollectionError> {
    validate_table_name(table)?;
    let mut sql_where = SqlWhere::new();
    let clause = sql_where.clause(query.predicate)?;
    let order = order_by(query.sort)?;
    let limit = sql_where.bind(SqlParam::Int(i64::try_from(query.limit).unwrap_or(i64::MAX)));
    let offset = sql_where.bind(SqlParam::Int(i64::try_from(query.skip).unwrap_or(i64::MAX)));
    Ok(SqlResult {
        query: format!(
            "SELECT {} FROM \"{}\" WHERE {} {} LIMIT {} OFFSET {}",
            DATA_COLUMN, table, clause, order, limit, offset
        ),
        params: sql_where.into_params(),
    })
}

pub fn count_sql(table: &str, predicate: &Predicate) -> Result<SqlResult, CollectionError> {
    validate_table_name(table)?;
    let (clause, params) = SqlWhere::generate(predicate)?;
    Ok(SqlResult {
        query: format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", table, clause),
        params,
    })
}

fn validate_table_name(name: &str) -> Result<(), CollectionError> {
    let starts_ok = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CollectionError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn decode_document(row: &sqlx::postgres::PgRow) -> Result<Value, CollectionError> {
    row.try_get::<Value, _>("data")
        .map_err(|e| CollectionError::Decode(e.to_string()))
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match p {
        SqlParam::Json(v) => q.bind(v.clone()),
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Int(i) => q.bind(*i),
    }
}
