use super::json_list;
use crate::database::models::PostRecord;
use crate::search::StorePredicate;
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};

const POST_COLUMNS: &str = "p.id, p.user_id, p.title, p.body, p.course_code, p.topics, \
     p.has_link, p.materials, p.has_material, p.created_at, p.updated_at";

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        course_code: row.get(4)?,
        topics: json_list(row, 5)?,
        has_link: row.get(6)?,
        materials: json_list(row, 7)?,
        has_material: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn collect<P: Params>(&self, sql: &str, params: P) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, user_id, title, body, course_code, topics, has_link,
                               materials, has_material, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.id,
                record.user_id,
                record.title,
                record.body,
                record.course_code,
                serde_json::to_string(&record.topics)?,
                record.has_link,
                serde_json::to_string(&record.materials)?,
                record.has_material,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                params![id],
                map_post,
            )
            .optional()?)
    }

    fn update_content(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET title = ?2,
                body = ?3,
                course_code = ?4,
                topics = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.title,
                record.body,
                record.course_code,
                serde_json::to_string(&record.topics)?,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_matching(&self, predicate: &StorePredicate) -> Result<Vec<PostRecord>> {
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.user_id
            {}
            ORDER BY p.created_at DESC, p.rowid DESC
            "#,
            predicate.where_sql()
        );
        self.collect(&sql, params_from_iter(predicate.params().iter()))
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<PostRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                WHERE p.user_id = ?1
                ORDER BY p.created_at DESC, p.rowid DESC
                "#
            ),
            params![user_id],
        )
    }

    fn list_bookmarked_by(&self, user_id: &str) -> Result<Vec<PostRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM bookmarks b
                JOIN posts p ON p.id = b.post_id
                WHERE b.user_id = ?1
                ORDER BY b.created_at DESC, b.rowid DESC
                "#
            ),
            params![user_id],
        )
    }

    fn list_trending(&self, since: &str, limit: usize) -> Result<Vec<PostRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                WHERE p.created_at >= ?1
                ORDER BY (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id) DESC,
                         (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) DESC,
                         p.created_at DESC
                LIMIT ?2
                "#
            ),
            params![since, limit as i64],
        )
    }

    fn list_reported(&self) -> Result<Vec<PostRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                WHERE EXISTS (SELECT 1 FROM reports r WHERE r.post_id = p.id)
                ORDER BY p.created_at DESC, p.rowid DESC
                "#
            ),
            [],
        )
    }

    fn ids_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM posts WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
