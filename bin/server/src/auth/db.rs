//! Database repositories for correlation records and member accounts.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rand::RngCore;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use hitobito_login_access::{
    CorrelationRecord, CorrelationStore, Gender, MemberRecord, MemberStore, Scope, StoreError,
};

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Decode(e) => StoreError::Decode {
            reason: e.to_string(),
        },
        sqlx::Error::ColumnDecode { index, source } => StoreError::Decode {
            reason: format!("column {index}: {source}"),
        },
        other => StoreError::Unavailable {
            reason: other.to_string(),
        },
    }
}

/// Repository for session-correlation records.
///
/// Timestamps are stored as unix seconds; rows are append-only and age
/// out through [`reap`](CorrelationStore::reap).
pub struct CorrelationRepository {
    pool: PgPool,
}

impl CorrelationRepository {
    /// Creates a new correlation repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CorrelationStore for CorrelationRepository {
    async fn create(&self, id_token: Option<&str>) -> Result<String, StoreError> {
        let record = CorrelationRecord::new(id_token.map(str::to_string), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO login_session (created_at, expires_at, token, id_token)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .bind(&record.token)
        .bind(&record.id_token)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(record.token)
    }

    async fn resolve(&self, token: &str) -> Result<Option<String>, StoreError> {
        if token.is_empty() {
            return Ok(None);
        }

        let row: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT id_token
            FROM login_session
            WHERE token = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row
            .and_then(|(id_token,)| id_token)
            .filter(|t| !t.is_empty()))
    }

    async fn reap(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM login_session
            WHERE expires_at < $1
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}

/// Row type for member queries, shared by both account tables.
#[derive(FromRow)]
struct MemberRow {
    id: i64,
    username: String,
    subject: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    street: String,
    postal: String,
    city: String,
    country: String,
    date_of_birth: Option<NaiveDate>,
    gender: String,
    language: String,
    section_ids: serde_json::Value,
    is_member: bool,
    group_ids: serde_json::Value,
    login_enabled: bool,
    disabled: bool,
    active_from: Option<DateTime<Utc>>,
    active_until: Option<DateTime<Utc>>,
    credential_hash: String,
    login_attempts: i32,
    date_added: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MemberRow {
    fn try_into_record(self) -> Result<MemberRecord, StoreError> {
        let section_ids: Vec<u32> =
            serde_json::from_value(self.section_ids).map_err(|e| StoreError::Decode {
                reason: format!("section_ids: {e}"),
            })?;
        let group_ids: Vec<u32> =
            serde_json::from_value(self.group_ids).map_err(|e| StoreError::Decode {
                reason: format!("group_ids: {e}"),
            })?;

        Ok(MemberRecord {
            id: self.id,
            username: self.username,
            subject: self.subject,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            street: self.street,
            postal: self.postal,
            city: self.city,
            country: self.country,
            date_of_birth: self.date_of_birth,
            gender: parse_gender(&self.gender),
            language: self.language,
            section_ids,
            is_member: self.is_member,
            group_ids,
            login_enabled: self.login_enabled,
            disabled: self.disabled,
            active_from: self.active_from,
            active_until: self.active_until,
            credential_hash: self.credential_hash,
            login_attempts: self.login_attempts.max(0) as u32,
            date_added: self.date_added,
            updated_at: self.updated_at,
        })
    }
}

fn parse_gender(raw: &str) -> Gender {
    match raw {
        "male" => Gender::Male,
        "female" => Gender::Female,
        _ => Gender::Other,
    }
}

const MEMBER_COLUMNS: &str = "id, username, subject, first_name, last_name, email, phone, \
     street, postal, city, country, date_of_birth, gender, language, section_ids, is_member, \
     group_ids, login_enabled, disabled, active_from, active_until, credential_hash, \
     login_attempts, date_added, updated_at";

/// Table and lookup column for a scope. Frontend accounts are keyed by
/// username, backend accounts by their external member-id column.
fn scope_table(scope: Scope) -> (&'static str, &'static str) {
    match scope {
        Scope::Frontend => ("members", "username"),
        Scope::Backend => ("staff_users", "member_id"),
    }
}

/// Generates the one-way hash of a fresh random credential.
///
/// The plaintext never leaves this function; accounts created here are
/// only ever entered through the identity provider.
fn generate_credential_hash() -> Result<String, StoreError> {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);

    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| StoreError::Unavailable {
        reason: format!("credential salt: {e}"),
    })?;

    let hash = Argon2::default()
        .hash_password(&secret, &salt)
        .map_err(|e| StoreError::Unavailable {
            reason: format!("credential hash: {e}"),
        })?;

    Ok(hash.to_string())
}

/// Repository for member accounts in both scopes.
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    /// Creates a new member repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, scope: Scope, key: &str) -> Result<Option<MemberRecord>, StoreError> {
        let (table, column) = scope_table(scope);
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM {table} WHERE {column} = $1");

        let row: Option<MemberRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(MemberRow::try_into_record).transpose()
    }

    async fn fetch_by_id(&self, scope: Scope, id: i64) -> Result<MemberRecord, StoreError> {
        let (table, _) = scope_table(scope);
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM {table} WHERE id = $1");

        let row: MemberRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        row.try_into_record()
    }
}

#[async_trait]
impl MemberStore for MemberRepository {
    async fn find(
        &self,
        member_id: &str,
        scope: Scope,
    ) -> Result<Option<MemberRecord>, StoreError> {
        self.fetch(scope, member_id).await
    }

    async fn create(&self, member_id: &str, subject: &str) -> Result<MemberRecord, StoreError> {
        // The UNIQUE username constraint settles concurrent first
        // logins: whoever loses the insert reads the surviving row.
        sqlx::query(
            r#"
            INSERT INTO members (username, subject, login_enabled, date_added, updated_at)
            VALUES ($1, $2, TRUE, NOW(), NOW())
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(member_id)
        .bind(subject)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        match self.fetch(Scope::Frontend, member_id).await? {
            Some(record) => Ok(record),
            None => Err(StoreError::Unavailable {
                reason: format!("member row for '{member_id}' missing after insert"),
            }),
        }
    }

    async fn persist(
        &self,
        record: &MemberRecord,
        scope: Scope,
    ) -> Result<MemberRecord, StoreError> {
        let (table, _) = scope_table(scope);

        let credential_hash = if record.credential_hash.is_empty() {
            generate_credential_hash()?
        } else {
            record.credential_hash.clone()
        };

        let sql = format!(
            r#"
            UPDATE {table}
            SET subject = $2, first_name = $3, last_name = $4, email = $5, phone = $6,
                street = $7, postal = $8, city = $9, country = $10, date_of_birth = $11,
                gender = $12, language = $13, section_ids = $14, is_member = $15,
                group_ids = $16, disabled = $17, credential_hash = $18
            WHERE id = $1
            "#
        );

        sqlx::query(&sql)
            .bind(record.id)
            .bind(&record.subject)
            .bind(&record.first_name)
            .bind(&record.last_name)
            .bind(&record.email)
            .bind(&record.phone)
            .bind(&record.street)
            .bind(&record.postal)
            .bind(&record.city)
            .bind(&record.country)
            .bind(record.date_of_birth)
            .bind(record.gender.as_str())
            .bind(&record.language)
            .bind(Json(&record.section_ids))
            .bind(record.is_member)
            .bind(Json(&record.group_ids))
            .bind(record.disabled)
            .bind(&credential_hash)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        // The row timestamp is touched in its own statement so it moves
        // even when the profile write changed nothing.
        let touch = format!("UPDATE {table} SET updated_at = NOW() WHERE id = $1");
        sqlx::query(&touch)
            .bind(record.id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        self.fetch_by_id(scope, record.id).await
    }

    async fn reactivate(&self, record: &MemberRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE members
            SET disabled = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn record_failed_login(
        &self,
        record: &MemberRecord,
        scope: Scope,
    ) -> Result<(), StoreError> {
        let (table, _) = scope_table(scope);
        let sql = format!("UPDATE {table} SET login_attempts = login_attempts + 1 WHERE id = $1");

        sqlx::query(&sql)
            .bind(record.id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }
}
