use crate::auth::repo_types::User;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, user_name, email, full_name, password_hash, \
                            avatar_url, cover_image_url, refresh_token, created_at";

impl User {
    /// Find a user by username or email; either identifier may be absent.
    pub async fn find_by_identifier(
        db: &PgPool,
        user_name: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NOT NULL AND user_name = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            "#,
        ))
        .bind(user_name)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#,
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn exists(db: &PgPool, user_name: &str, email: &str) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users WHERE user_name = $1 OR email = $2
            )
            "#,
        )
        .bind(user_name)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(exists)
    }

    /// Create a new user; the full-validation write path.
    pub async fn create(
        db: &PgPool,
        user_name: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
        avatar_url: &str,
        cover_image_url: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (user_name, email, full_name, password_hash, avatar_url, cover_image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(user_name)
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .bind(avatar_url)
        .bind(cover_image_url)
        .fetch_one(db)
        .await
    }

    // Targeted single-column writes below. These bypass the full-record path
    // on purpose: only the named field changes.

    /// Overwrite (or clear, with `None`) the stored refresh token.
    pub async fn set_refresh_token(
        db: &PgPool,
        id: Uuid,
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET refresh_token = $2 WHERE id = $1"#)
            .bind(id)
            .bind(refresh_token)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn set_password_hash(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE id = $1"#)
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Returns the raw sqlx error so callers can tell a unique violation on
    /// the new email apart from other failures.
    pub async fn update_details(
        db: &PgPool,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET full_name = $2, email = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn set_avatar(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users SET avatar_url = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"#,
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_cover_image(
        db: &PgPool,
        id: Uuid,
        url: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users SET cover_image_url = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"#,
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
