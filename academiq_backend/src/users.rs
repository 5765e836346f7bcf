use crate::auth::{OwnerOnly, SelfOrAdmin, Session};
use crate::comments::purge_comment_subtree;
use crate::database::models::{Role, UserRecord};
use crate::database::repositories::{
    BookmarkRepository, CommentRepository, PostRepository, ReportRepository, SessionRepository,
    UserRepository, VoteRepository,
};
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::posts::purge_post;
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a user shown next to every post, comment and report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub role: Role,
}

impl AuthorSummary {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            image: record.image.clone(),
            role: record.role,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfileCounts {
    pub posts: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
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
    pub counts: ProfileCounts,
}

impl UserProfile {
    fn from_record(record: UserRecord, counts: ProfileCounts) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            image: record.image,
            role: record.role,
            department: record.department,
            student_id: record.student_id,
            faculty_initials: record.faculty_initials,
            faculty_position: record.faculty_position,
            created_at: record.created_at,
            counts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub faculty_initials: Option<String>,
    pub faculty_position: Option<String>,
}

/// Profile fields a user may change on their own account. Absent fields are
/// left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub faculty_initials: Option<String>,
    #[serde(default)]
    pub faculty_position: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    database: Database,
}

impl UserService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_user(&self, input: NewUser) -> ForumResult<UserRecord> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ForumError::invalid("name may not be empty"));
        }
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: input.email.map(|email| email.trim().to_lowercase()),
            image: None,
            role: input.role,
            department: input.department,
            student_id: input.student_id,
            faculty_initials: input.faculty_initials,
            faculty_position: input.faculty_position,
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.users().create(&record))?;
        tracing::info!(user_id = %record.id, role = %record.role, "user created");
        Ok(record)
    }

    pub fn get_profile(&self, user_id: &str) -> ForumResult<UserProfile> {
        self.database.with_repositories(|repos| {
            let users = repos.users();
            let Some(record) = users.get(user_id)? else {
                return Err(ForumError::not_found(format!("user {user_id} not found")));
            };
            let counts = ProfileCounts {
                posts: users.count_posts(user_id)?,
                comments: users.count_comments(user_id)?,
            };
            Ok(UserProfile::from_record(record, counts))
        })
    }

    pub fn update_profile(
        &self,
        session: &Session,
        user_id: &str,
        update: ProfileUpdate,
    ) -> ForumResult<UserProfile> {
        session.require(&OwnerOnly(user_id))?;
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ForumError::invalid("name may not be empty"));
            }
        }

        self.database
            .with_repositories(|repos| -> ForumResult<()> {
                let users = repos.users();
                let Some(mut record) = users.get(user_id)? else {
                    return Err(ForumError::not_found(format!("user {user_id} not found")));
                };
                if let Some(name) = update.name {
                    record.name = name.trim().to_string();
                }
                if let Some(department) = update.department {
                    record.department = Some(department);
                }
                if let Some(student_id) = update.student_id {
                    record.student_id = Some(student_id);
                }
                if let Some(initials) = update.faculty_initials {
                    record.faculty_initials = Some(initials);
                }
                if let Some(position) = update.faculty_position {
                    record.faculty_position = Some(position);
                }
                users.update_profile(&record)?;
                Ok(())
            })?;

        self.get_profile(user_id)
    }

    /// Removes the account together with everything it owns: its posts (and
    /// all content hanging off them), its comment subtrees, and its votes,
    /// bookmarks, reports and sessions.
    pub fn delete_account(&self, session: &Session, user_id: &str) -> ForumResult<()> {
        session.require(&SelfOrAdmin(user_id))?;

        let (posts, comments) =
            self.database
                .with_transaction(|repos| -> ForumResult<(usize, usize)> {
                    if repos.users().get(user_id)?.is_none() {
                        return Err(ForumError::not_found(format!("user {user_id} not found")));
                    }

                    let post_ids = repos.posts().ids_for_user(user_id)?;
                    for post_id in &post_ids {
                        purge_post(&repos, post_id)?;
                    }

                    let mut comments_removed = 0;
                    for comment_id in repos.comments().ids_for_user(user_id)? {
                        comments_removed += purge_comment_subtree(&repos, &comment_id)?;
                    }

                    repos.votes().delete_for_user(user_id)?;
                    repos.bookmarks().delete_for_user(user_id)?;
                    repos.reports().delete_for_user(user_id)?;
                    repos.sessions().delete_for_user(user_id)?;
                    repos.users().delete(user_id)?;
                    Ok((post_ids.len(), comments_removed))
                })?;

        tracing::info!(
            user_id = %user_id,
            by = %session.user_id,
            posts,
            comments,
            "account deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::{CommentService, NewComment};
    use crate::database::test_support::{count, memory_db, seed_post, seed_user};
    use crate::voting::{VoteEngine, VoteValue};
    use crate::database::models::SubjectKind;

    fn setup_service() -> (Database, UserService) {
        let db = memory_db();
        seed_user(&db, "alice", Role::Student);
        seed_user(&db, "bob", Role::Faculty);
        seed_user(&db, "root", Role::Admin);
        (db.clone(), UserService::new(db))
    }

    #[test]
    fn create_user_and_read_profile() {
        let (_db, users) = setup_service();
        let created = users
            .create_user(NewUser {
                name: "  Dana ".into(),
                email: Some("Dana@Uni.EDU".into()),
                role: Role::Faculty,
                department: Some("CSE".into()),
                student_id: None,
                faculty_initials: Some("DN".into()),
                faculty_position: None,
            })
            .unwrap();
        assert_eq!(created.name, "Dana");
        assert_eq!(created.email.as_deref(), Some("dana@uni.edu"));

        let profile = users.get_profile(&created.id).unwrap();
        assert_eq!(profile.role, Role::Faculty);
        assert_eq!(profile.counts.posts, 0);
        assert!(matches!(
            users.get_profile("ghost"),
            Err(ForumError::NotFound(_))
        ));
    }

    #[test]
    fn only_the_account_holder_updates_a_profile() {
        let (_db, users) = setup_service();
        let alice = Session::new("alice", Role::Student);
        let root = Session::new("root", Role::Admin);

        let updated = users
            .update_profile(
                &alice,
                "alice",
                ProfileUpdate {
                    department: Some("EEE".into()),
                    student_id: Some("2021-1-60-001".into()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.department.as_deref(), Some("EEE"));
        assert_eq!(updated.name, "user alice");

        assert!(matches!(
            users.update_profile(&root, "alice", ProfileUpdate::default()),
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            users.update_profile(
                &alice,
                "alice",
                ProfileUpdate {
                    name: Some("   ".into()),
                    ..ProfileUpdate::default()
                }
            ),
            Err(ForumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn deleting_an_account_cascades() {
        let (db, users) = setup_service();
        seed_post(&db, "alice-post", "alice");
        seed_post(&db, "bob-post", "bob");

        let comments = CommentService::new(db.clone());
        let bob_root = comments
            .create_comment(
                "bob",
                NewComment {
                    post_id: "alice-post".into(),
                    body: "on alice's post".into(),
                    parent_id: None,
                },
            )
            .unwrap();
        let alice_comment = comments
            .create_comment(
                "alice",
                NewComment {
                    post_id: "bob-post".into(),
                    body: "on bob's post".into(),
                    parent_id: None,
                },
            )
            .unwrap();
        comments
            .create_comment(
                "bob",
                NewComment {
                    post_id: "bob-post".into(),
                    body: "reply to alice".into(),
                    parent_id: Some(alice_comment.id.clone()),
                },
            )
            .unwrap();

        let votes = VoteEngine::new(db.clone());
        votes
            .cast_vote(SubjectKind::Post, "bob-post", "alice", VoteValue::Up)
            .unwrap();

        let alice = Session::new("alice", Role::Student);
        assert!(matches!(
            users.delete_account(&Session::new("bob", Role::Faculty), "alice"),
            Err(ForumError::Forbidden(_))
        ));
        users.delete_account(&alice, "alice").unwrap();

        assert_eq!(count(&db, "SELECT COUNT(*) FROM users WHERE id = ?1", "alice"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM posts WHERE user_id = ?1", "alice"), 0);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM comments WHERE id = ?1", &bob_root.id),
            0,
            "comments on the deleted post go with it"
        );
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", "bob-post"),
            0,
            "replies under the deleted comment go with it"
        );
        assert_eq!(count(&db, "SELECT COUNT(*) FROM post_votes WHERE user_id = ?1", "alice"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM posts WHERE id = ?1", "bob-post"), 1);
    }

    #[test]
    fn admins_may_delete_any_account() {
        let (db, users) = setup_service();
        users
            .delete_account(&Session::new("root", Role::Admin), "bob")
            .unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users WHERE id = ?1", "bob"), 0);
        assert!(matches!(
            users.delete_account(&Session::new("root", Role::Admin), "bob"),
            Err(ForumError::NotFound(_))
        ));
    }
}
