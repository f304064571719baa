use async_trait::async_trait;
use docqa_core::{ChatMessage, Document, DocumentStatus, MessageRole};
use docqa_error::{DocqaError, Result};
use docqa_rag::DocumentStateStore;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Postgres persistence for users, documents and chat transcripts.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DocqaError::Database {
                message: format!("migration failed: {}", e),
            })?;
        Ok(())
    }

    // ===== users =====

    /// Returns `Validation` on a duplicate email so registration can answer
    /// 400 without leaking which part failed.
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, now())",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(DocqaError::Validation {
                    reason: "user already exists".to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserRow {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    // ===== documents =====

    pub async fn create_document(&self, user_id: Uuid, file_name: &str) -> Result<Document> {
        let row = sqlx::query(
            "INSERT INTO documents (id, user_id, file_name, status, created_at) \
             VALUES ($1, $2, $3, $4, now()) \
             RETURNING id, user_id, file_name, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(file_name)
        .bind(DocumentStatus::Processing.as_str())
        .fetch_one(&self.pool)
        .await?;
        document_from_row(&row)
    }

    pub async fn list_documents(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, user_id, file_name, status, created_at FROM documents \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    /// Fetch a document scoped to its owner. A document belonging to someone
    /// else is indistinguishable from a missing one.
    pub async fn get_document(&self, user_id: Uuid, document_id: Uuid) -> Result<Document> {
        let row = sqlx::query(
            "SELECT id, user_id, file_name, status, created_at FROM documents \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DocqaError::not_found(format!("document {}", document_id)))?;
        document_from_row(&row)
    }

    /// Move a document to a new status, enforcing the legal transitions under
    /// a row lock.
    pub async fn update_status(&self, document_id: Uuid, next: DocumentStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM documents WHERE id = $1 FOR UPDATE")
            .bind(document_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DocqaError::not_found(format!("document {}", document_id)))?;
        let current = DocumentStatus::parse(row.try_get::<String, _>("status")?.as_str())?;
        let next = current.transition(next)?;

        sqlx::query("UPDATE documents SET status = $1 WHERE id = $2")
            .bind(next.as_str())
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== chat messages =====

    pub async fn add_message(
        &self,
        document_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let row = sqlx::query(
            "INSERT INTO chat_messages (id, document_id, role, content, created_at) \
             VALUES ($1, $2, $3, $4, now()) \
             RETURNING id, document_id, role, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(document_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        message_from_row(&row)
    }

    pub async fn list_messages(&self, document_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, document_id, role, content, created_at FROM chat_messages \
             WHERE document_id = $1 ORDER BY created_at ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    pub async fn delete_messages(&self, document_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM chat_messages WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn document_from_row(row: &sqlx::postgres::PgRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        file_name: row.try_get("file_name")?,
        status: DocumentStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        role: MessageRole::parse(row.try_get::<String, _>("role")?.as_str())?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl DocumentStateStore for Store {
    async fn set_status(&self, document_id: Uuid, status: DocumentStatus) -> Result<()> {
        self.update_status(document_id, status).await
    }
}
