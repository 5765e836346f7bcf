use crate::database::models::CommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> SqliteCommentRepository<'conn> {
    fn ids(&self, sql: &str, key: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, user_id, parent_id, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.post_id,
                record.user_id,
                record.parent_id,
                record.body,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, post_id, user_id, parent_id, body, created_at
                FROM comments
                WHERE id = ?1
                "#,
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, post_id, user_id, parent_id, body, created_at
            FROM comments
            WHERE post_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], map_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn child_ids(&self, parent_id: &str) -> Result<Vec<String>> {
        self.ids(
            "SELECT id FROM comments WHERE parent_id = ?1 ORDER BY rowid",
            parent_id,
        )
    }

    fn ids_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        self.ids(
            "SELECT id FROM comments WHERE user_id = ?1 ORDER BY rowid",
            user_id,
        )
    }

    fn count_for_post(&self, post_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?)
    }

    fn list_reported(&self) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.post_id, c.user_id, c.parent_id, c.body, c.created_at
            FROM comments c
            WHERE EXISTS (SELECT 1 FROM reports r WHERE r.comment_id = c.id)
            ORDER BY c.created_at DESC, c.rowid DESC
            "#,
        )?;
        let rows = stmt.query_map([], map_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn delete_for_post(&self, post_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?)
    }
}
