use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteSessionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::SessionRepository for SqliteSessionRepository<'conn> {
    fn create(&self, token_hash: &str, user_id: &str, created_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![token_hash, user_id, created_at],
        )?;
        Ok(())
    }

    fn user_id_for(&self, token_hash: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn delete_for_user(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?)
    }
}
