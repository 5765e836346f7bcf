use crate::database::models::BookmarkRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteBookmarkRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::BookmarkRepository for SqliteBookmarkRepository<'conn> {
    fn find(&self, post_id: &str, user_id: &str) -> Result<Option<BookmarkRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, post_id, user_id, created_at
                FROM bookmarks
                WHERE post_id = ?1 AND user_id = ?2
                "#,
                params![post_id, user_id],
                |row| {
                    Ok(BookmarkRecord {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn add(&self, record: &BookmarkRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO bookmarks (id, post_id, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.id, record.post_id, record.user_id, record.created_at],
        )?;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn delete_for_post(&self, post_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM bookmarks WHERE post_id = ?1", params![post_id])?)
    }

    fn delete_for_user(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM bookmarks WHERE user_id = ?1", params![user_id])?)
    }
}
