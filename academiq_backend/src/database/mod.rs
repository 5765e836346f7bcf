pub mod models;
pub mod repositories;

use crate::config::ForumPaths;
use anyhow::{anyhow, Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        image TEXT,
        role TEXT NOT NULL DEFAULT 'STUDENT' CHECK (role IN ('STUDENT', 'FACULTY', 'ADMIN')),
        department TEXT,
        student_id TEXT,
        faculty_initials TEXT,
        faculty_position TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        course_code TEXT NOT NULL,
        topics TEXT NOT NULL DEFAULT '[]',
        has_link INTEGER NOT NULL DEFAULT 0,
        materials TEXT NOT NULL DEFAULT '[]',
        has_material INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        parent_id TEXT,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (parent_id) REFERENCES comments(id)
    );

    CREATE TABLE IF NOT EXISTS post_votes (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        value INTEGER NOT NULL CHECK (value IN (1, -1)),
        created_at TEXT NOT NULL,
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS comment_votes (
        id TEXT PRIMARY KEY,
        comment_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        value INTEGER NOT NULL CHECK (value IN (1, -1)),
        created_at TEXT NOT NULL,
        UNIQUE (comment_id, user_id),
        FOREIGN KEY (comment_id) REFERENCES comments(id),
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS bookmarks (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS reports (
        id TEXT PRIMARY KEY,
        reason TEXT NOT NULL,
        user_id TEXT NOT NULL,
        post_id TEXT,
        comment_id TEXT,
        created_at TEXT NOT NULL,
        CHECK ((post_id IS NULL) <> (comment_id IS NULL)),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (post_id) REFERENCES posts(id),
        FOREIGN KEY (comment_id) REFERENCES comments(id)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
    CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
    CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
    CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);
    CREATE INDEX IF NOT EXISTS idx_comment_votes_comment ON comment_votes(comment_id);
    CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id);
    CREATE INDEX IF NOT EXISTS idx_reports_post ON reports(post_id);
    CREATE INDEX IF NOT EXISTS idx_reports_comment ON reports(comment_id);
"#;

/// Shared handle to the entity store. Cloning is cheap; every clone talks to
/// the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &ForumPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        Self::from_connection(conn, newly_created)
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Result<Self> {
        install_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        })
    }

    /// Applies the schema. Returns whether the database file was created by
    /// this process.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| -> Result<()> {
            conn.execute_batch(MIGRATIONS)
                .context("failed to apply migrations")?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Runs `f` inside an `IMMEDIATE` transaction. The repositories handed to
    /// the closure are bound to the transaction; it commits only when `f`
    /// returns `Ok`, otherwise every write is rolled back.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin transaction")?;
        let value = f(repositories::SqliteRepositories::new(&tx))?;
        tx.commit().context("failed to commit transaction")?;
        Ok(value)
    }

    fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<anyhow::Error>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

/// SQLite's built-in `lower()` only folds ASCII; text search goes through
/// `unicode_lower()` instead.
fn install_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
    .context("failed to register unicode_lower")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::database::models::{PostRecord, Role, UserRecord};
    use crate::database::repositories::{PostRepository, UserRepository};
    use crate::utils::now_utc_iso;

    pub(crate) fn memory_db() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true).expect("database");
        db.ensure_migrations().expect("migrations");
        db
    }

    pub(crate) fn seed_user(db: &Database, id: &str, role: Role) {
        db.with_repositories(|repos| {
            repos.users().create(&UserRecord {
                id: id.into(),
                name: format!("user {id}"),
                email: None,
                image: None,
                role,
                department: None,
                student_id: None,
                faculty_initials: None,
                faculty_position: None,
                created_at: now_utc_iso(),
            })
        })
        .expect("seed user");
    }

    pub(crate) fn seed_post(db: &Database, id: &str, user_id: &str) {
        seed_post_at(db, id, user_id, &now_utc_iso());
    }

    pub(crate) fn seed_post_at(db: &Database, id: &str, user_id: &str, created_at: &str) {
        db.with_repositories(|repos| {
            repos.posts().create(&PostRecord {
                id: id.into(),
                user_id: user_id.into(),
                title: format!("post {id}"),
                body: "body".into(),
                course_code: "CSE101".into(),
                topics: Vec::new(),
                has_link: false,
                materials: Vec::new(),
                has_material: false,
                created_at: created_at.into(),
                updated_at: None,
            })
        })
        .expect("seed post");
    }

    pub(crate) fn count(db: &Database, sql: &str, id: &str) -> i64 {
        db.with_repositories(|repos| {
            repos
                .conn()
                .query_row(sql, [id], |row| row.get::<_, i64>(0))
                .map_err(anyhow::Error::from)
        })
        .expect("count query")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::database::models::Role;

    #[test]
    fn migrations_are_idempotent() {
        let db = memory_db();
        db.ensure_migrations().expect("second run");
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = memory_db();
        seed_user(&db, "u1", Role::Student);

        let result: Result<(), anyhow::Error> = db.with_transaction(|repos| {
            repos
                .conn()
                .execute("UPDATE users SET name = 'changed' WHERE id = 'u1'", [])?;
            Err(anyhow!("abort"))
        });
        assert!(result.is_err());

        let name: String = db
            .with_repositories(|repos| {
                repos
                    .conn()
                    .query_row("SELECT name FROM users WHERE id = 'u1'", [], |row| row.get(0))
                    .map_err(anyhow::Error::from)
            })
            .expect("name");
        assert_eq!(name, "user u1");
    }

    #[test]
    fn report_must_reference_exactly_one_subject() {
        let db = memory_db();
        seed_user(&db, "u1", Role::Student);
        let err = db.with_repositories(|repos| {
            repos
                .conn()
                .execute(
                    "INSERT INTO reports (id, reason, user_id, created_at) VALUES ('r', 'x', 'u1', 'now')",
                    [],
                )
                .map_err(anyhow::Error::from)
        });
        assert!(err.is_err());
    }
}
