use crate::database::models::{SubjectKind, VoteRecord, VoteTally};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn find(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> Result<Option<VoteRecord>> {
        let sql = format!(
            "SELECT id, {col}, user_id, value, created_at FROM {table} WHERE {col} = ?1 AND user_id = ?2",
            col = kind.subject_column(),
            table = kind.vote_table(),
        );
        Ok(self
            .conn
            .query_row(&sql, params![subject_id, user_id], |row| {
                Ok(VoteRecord {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    user_id: row.get(2)?,
                    value: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .optional()?)
    }

    fn insert(&self, kind: SubjectKind, record: &VoteRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (id, {col}, user_id, value, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            col = kind.subject_column(),
            table = kind.vote_table(),
        );
        self.conn.execute(
            &sql,
            params![
                record.id,
                record.subject_id,
                record.user_id,
                record.value,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn set_value(&self, kind: SubjectKind, vote_id: &str, value: i64) -> Result<()> {
        let sql = format!("UPDATE {} SET value = ?2 WHERE id = ?1", kind.vote_table());
        self.conn.execute(&sql, params![vote_id, value])?;
        Ok(())
    }

    fn remove(&self, kind: SubjectKind, vote_id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.vote_table());
        self.conn.execute(&sql, params![vote_id])?;
        Ok(())
    }

    fn tally(&self, kind: SubjectKind, subject_id: &str) -> Result<VoteTally> {
        let sql = format!(
            r#"
            SELECT COALESCE(SUM(CASE WHEN value = 1 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN value = -1 THEN 1 ELSE 0 END), 0)
            FROM {table}
            WHERE {col} = ?1
            "#,
            col = kind.subject_column(),
            table = kind.vote_table(),
        );
        Ok(self.conn.query_row(&sql, params![subject_id], |row| {
            Ok(VoteTally {
                upvotes: row.get(0)?,
                downvotes: row.get(1)?,
            })
        })?)
    }

    fn delete_for_subject(&self, kind: SubjectKind, subject_id: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {table} WHERE {col} = ?1",
            col = kind.subject_column(),
            table = kind.vote_table(),
        );
        Ok(self.conn.execute(&sql, params![subject_id])?)
    }

    fn delete_for_post_comments(&self, post_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            r#"
            DELETE FROM comment_votes
            WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)
            "#,
            params![post_id],
        )?)
    }

    fn delete_for_user(&self, user_id: &str) -> Result<usize> {
        let posts = self
            .conn
            .execute("DELETE FROM post_votes WHERE user_id = ?1", params![user_id])?;
        let comments = self
            .conn
            .execute("DELETE FROM comment_votes WHERE user_id = ?1", params![user_id])?;
        Ok(posts + comments)
    }
}
