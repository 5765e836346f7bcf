use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Faculty => "FACULTY",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "FACULTY" => Ok(Role::Faculty),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        raw.parse()
            .map_err(|err: String| FromSqlError::Other(err.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub faculty_initials: Option<String>,
    pub faculty_position: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub course_code: String,
    pub topics: Vec<String>,
    pub has_link: bool,
    pub materials: Vec<String>,
    pub has_material: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    /// `None` for root comments.
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: String,
}

/// The two kinds of content that can be voted on or reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Post,
    Comment,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post",
            SubjectKind::Comment => "comment",
        }
    }

    pub(crate) fn vote_table(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post_votes",
            SubjectKind::Comment => "comment_votes",
        }
    }

    /// Column naming the subject in both the vote table and `reports`.
    pub(crate) fn subject_column(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post_id",
            SubjectKind::Comment => "comment_id",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(SubjectKind::Post),
            "comment" | "comments" => Ok(SubjectKind::Comment),
            other => Err(format!("unknown subject type {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectRef {
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Post,
            id: id.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Comment,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: String,
    pub subject_id: String,
    pub user_id: String,
    pub value: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteTally {
    pub fn total(&self) -> i64 {
        self.upvotes + self.downvotes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub reason: String,
    pub user_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub created_at: String,
}

impl ReportRecord {
    pub fn for_subject(
        id: String,
        reason: String,
        user_id: String,
        subject: &SubjectRef,
        created_at: String,
    ) -> Self {
        let (post_id, comment_id) = match subject.kind {
            SubjectKind::Post => (Some(subject.id.clone()), None),
            SubjectKind::Comment => (None, Some(subject.id.clone())),
        };
        Self {
            id,
            reason,
            user_id,
            post_id,
            comment_id,
            created_at,
        }
    }
}
