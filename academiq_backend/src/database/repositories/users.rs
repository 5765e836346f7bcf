use crate::database::models::UserRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, name, email, image, role, department, student_id,
                               faculty_initials, faculty_position, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.name,
                record.email,
                record.image,
                record.role,
                record.department,
                record.student_id,
                record.faculty_initials,
                record.faculty_position,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, name, email, image, role, department, student_id,
                       faculty_initials, faculty_position, created_at
                FROM users
                WHERE id = ?1
                "#,
                params![id],
                |row| {
                    Ok(UserRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        image: row.get(3)?,
                        role: row.get(4)?,
                        department: row.get(5)?,
                        student_id: row.get(6)?,
                        faculty_initials: row.get(7)?,
                        faculty_position: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                },
            )
            .optional()?)
    }

    fn update_profile(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE users
            SET name = ?2,
                department = ?3,
                student_id = ?4,
                faculty_initials = ?5,
                faculty_position = ?6
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.name,
                record.department,
                record.student_id,
                record.faculty_initials,
                record.faculty_position,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn count_posts(&self, id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
            params![id],
            |row| row.get(0),
        )?)
    }

    fn count_comments(&self, id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE user_id = ?1",
            params![id],
            |row| row.get(0),
        )?)
    }
}
