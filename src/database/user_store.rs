use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::query::ListQuery;
use crate::database::store::{CredentialStore, Store};
use crate::dto::user_dto::{CreateUserPayload, UpdateUserPayload};
use crate::error::Result;
use crate::models::user::{normalize_email, User, DEFAULT_PHOTO};
use crate::utils::crypto::hash_password;

const USER_COLUMNS: &str = "id, name, email, photo, role, password, password_changed_at, active, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store<User> for PgUserStore {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<User>> {
        let filters: Vec<String> = query
            .filters
            .iter()
            .enumerate()
            .map(|(i, filter)| {
                format!(
                    "{} {} CAST(${} AS {})",
                    filter.field.column,
                    filter.op.as_sql(),
                    i + 1,
                    filter.field.sql_type
                )
            })
            .collect();

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let order_by = if query.sort.is_empty() {
            "created_at DESC".to_string()
        } else {
            query
                .sort
                .iter()
                .map(|key| {
                    format!(
                        "{} {}",
                        key.field.column,
                        if key.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let sql = format!(
            "SELECT {} FROM users {} ORDER BY {} LIMIT ${} OFFSET ${}",
            USER_COLUMNS,
            where_clause,
            order_by,
            filters.len() + 1,
            filters.len() + 2
        );

        let mut statement = sqlx::query_as::<_, User>(&sql);
        for filter in &query.filters {
            statement = statement.bind(&filter.value);
        }
        let users = statement
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, input: CreateUserPayload) -> Result<User> {
        let password_hash = hash_password(&input.password)?;
        let sql = format!(
            r#"
            INSERT INTO users (name, email, photo, role, password)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(input.name.trim())
            .bind(normalize_email(&input.email))
            .bind(input.photo.as_deref().unwrap_or(DEFAULT_PHOTO))
            .bind(input.role.unwrap_or_default().as_str())
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_by_id(&self, id: Uuid, changes: UpdateUserPayload) -> Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                photo = COALESCE($4, photo),
                role = COALESCE($5, role),
                active = COALESCE($6, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name.as_deref().map(str::trim))
            .bind(changes.email.as_deref().map(normalize_email))
            .bind(changes.photo)
            .bind(changes.role.map(|role| role.as_str()))
            .bind(changes.active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> Result<Option<User>> {
        // Backdated a second so a token issued right after the change stays valid.
        let sql = format!(
            r#"
            UPDATE users
            SET
                password = $2,
                password_changed_at = NOW() - INTERVAL '1 second',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
