mod bookmarks;
mod comments;
mod posts;
mod reports;
mod sessions;
mod users;
mod votes;

use super::models::{
    BookmarkRecord, CommentRecord, PostRecord, ReportRecord, SubjectKind, SubjectRef, UserRecord,
    VoteRecord, VoteTally,
};
use crate::search::StorePredicate;
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn update_profile(&self, record: &UserRecord) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    fn count_posts(&self, id: &str) -> Result<i64>;
    fn count_comments(&self, id: &str) -> Result<i64>;
}

pub trait SessionRepository {
    fn create(&self, token_hash: &str, user_id: &str, created_at: &str) -> Result<()>;
    fn user_id_for(&self, token_hash: &str) -> Result<Option<String>>;
    fn delete_for_user(&self, user_id: &str) -> Result<usize>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    /// Rewrites title, body, course code, topics and `updated_at`.
    fn update_content(&self, record: &PostRecord) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    /// Newest first; ties broken by insertion order.
    fn list_matching(&self, predicate: &StorePredicate) -> Result<Vec<PostRecord>>;
    fn list_for_user(&self, user_id: &str) -> Result<Vec<PostRecord>>;
    /// Posts bookmarked by `user_id`, most recently bookmarked first.
    fn list_bookmarked_by(&self, user_id: &str) -> Result<Vec<PostRecord>>;
    fn list_trending(&self, since: &str, limit: usize) -> Result<Vec<PostRecord>>;
    fn list_reported(&self) -> Result<Vec<PostRecord>>;
    fn ids_for_user(&self, user_id: &str) -> Result<Vec<String>>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    /// Every comment of the post, newest first.
    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>>;
    fn child_ids(&self, parent_id: &str) -> Result<Vec<String>>;
    fn ids_for_user(&self, user_id: &str) -> Result<Vec<String>>;
    fn count_for_post(&self, post_id: &str) -> Result<i64>;
    fn list_reported(&self) -> Result<Vec<CommentRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
    fn delete_for_post(&self, post_id: &str) -> Result<usize>;
}

pub trait VoteRepository {
    fn find(&self, kind: SubjectKind, subject_id: &str, user_id: &str)
        -> Result<Option<VoteRecord>>;
    fn insert(&self, kind: SubjectKind, record: &VoteRecord) -> Result<()>;
    fn set_value(&self, kind: SubjectKind, vote_id: &str, value: i64) -> Result<()>;
    fn remove(&self, kind: SubjectKind, vote_id: &str) -> Result<()>;
    fn tally(&self, kind: SubjectKind, subject_id: &str) -> Result<VoteTally>;
    fn delete_for_subject(&self, kind: SubjectKind, subject_id: &str) -> Result<usize>;
    /// Removes the votes cast on any comment of the post.
    fn delete_for_post_comments(&self, post_id: &str) -> Result<usize>;
    /// Removes every vote the user cast, on posts and comments alike.
    fn delete_for_user(&self, user_id: &str) -> Result<usize>;
}

pub trait BookmarkRepository {
    fn find(&self, post_id: &str, user_id: &str) -> Result<Option<BookmarkRecord>>;
    fn add(&self, record: &BookmarkRecord) -> Result<()>;
    fn remove(&self, id: &str) -> Result<()>;
    fn delete_for_post(&self, post_id: &str) -> Result<usize>;
    fn delete_for_user(&self, user_id: &str) -> Result<usize>;
}

pub trait ReportRepository {
    fn create(&self, record: &ReportRecord) -> Result<()>;
    fn exists_for(&self, user_id: &str, subject: &SubjectRef) -> Result<bool>;
    /// Oldest first.
    fn list_for(&self, subject: &SubjectRef) -> Result<Vec<ReportRecord>>;
    fn count_for(&self, subject: &SubjectRef) -> Result<i64>;
    fn delete_for(&self, subject: &SubjectRef) -> Result<usize>;
    fn delete_for_post_comments(&self, post_id: &str) -> Result<usize>;
    fn delete_for_user(&self, user_id: &str) -> Result<usize>;
}

/// Repository accessors bound to one connection (or one open transaction).
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn votes(&self) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository { conn: self.conn }
    }

    pub fn bookmarks(&self) -> impl BookmarkRepository + '_ {
        bookmarks::SqliteBookmarkRepository { conn: self.conn }
    }

    pub fn reports(&self) -> impl ReportRepository + '_ {
        reports::SqliteReportRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }

    /// Whether the post or comment a vote or report points at exists.
    pub fn subject_exists(&self, subject: &SubjectRef) -> Result<bool> {
        Ok(match subject.kind {
            SubjectKind::Post => self.posts().get(&subject.id)?.is_some(),
            SubjectKind::Comment => self.comments().get(&subject.id)?.is_some(),
        })
    }
}

/// Reads a JSON array column (topics, materials).
pub(super) fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
