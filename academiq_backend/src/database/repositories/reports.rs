use crate::database::models::{ReportRecord, SubjectRef};
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteReportRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ReportRepository for SqliteReportRepository<'conn> {
    fn create(&self, record: &ReportRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO reports (id, reason, user_id, post_id, comment_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.reason,
                record.user_id,
                record.post_id,
                record.comment_id,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn exists_for(&self, user_id: &str, subject: &SubjectRef) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM reports WHERE user_id = ?1 AND {} = ?2",
            subject.kind.subject_column()
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params![user_id, subject.id], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn list_for(&self, subject: &SubjectRef) -> Result<Vec<ReportRecord>> {
        let sql = format!(
            r#"
            SELECT id, reason, user_id, post_id, comment_id, created_at
            FROM reports
            WHERE {} = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
            subject.kind.subject_column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![subject.id], |row| {
            Ok(ReportRecord {
                id: row.get(0)?,
                reason: row.get(1)?,
                user_id: row.get(2)?,
                post_id: row.get(3)?,
                comment_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }

    fn count_for(&self, subject: &SubjectRef) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM reports WHERE {} = ?1",
            subject.kind.subject_column()
        );
        Ok(self
            .conn
            .query_row(&sql, params![subject.id], |row| row.get(0))?)
    }

    fn delete_for(&self, subject: &SubjectRef) -> Result<usize> {
        let sql = format!(
            "DELETE FROM reports WHERE {} = ?1",
            subject.kind.subject_column()
        );
        Ok(self.conn.execute(&sql, params![subject.id])?)
    }

    fn delete_for_post_comments(&self, post_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            r#"
            DELETE FROM reports
            WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)
            "#,
            params![post_id],
        )?)
    }

    fn delete_for_user(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM reports WHERE user_id = ?1", params![user_id])?)
    }
}
