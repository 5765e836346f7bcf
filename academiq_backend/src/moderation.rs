//! Reports against posts and comments, and the admin tools that act on them.
//!
//! A subject moves from clean to reported once someone files a report. An
//! admin then either clears its reports, which returns it to clean, or
//! deletes it, which is final.

use crate::auth::{RequireRole, Session};
use crate::comments::purge_comment_subtree;
use crate::database::models::{ReportRecord, Role, SubjectKind, SubjectRef};
use crate::database::repositories::{
    CommentRepository, PostRepository, ReportRepository, SqliteRepositories, UserRepository,
    VoteRepository,
};
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::posts::{post_view, purge_post, PostView};
use crate::users::AuthorSummary;
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Names the reported subject. Exactly one of the two ids must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTarget {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl ReportTarget {
    pub fn subject(&self) -> ForumResult<SubjectRef> {
        let post = self.post_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let comment = self
            .comment_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match (post, comment) {
            (Some(id), None) => Ok(SubjectRef::post(id)),
            (None, Some(id)) => Ok(SubjectRef::comment(id)),
            (None, None) => Err(ForumError::invalid("either postId or commentId is required")),
            (Some(_), Some(_)) => Err(ForumError::invalid(
                "postId and commentId are mutually exclusive",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: String,
    pub reason: String,
    pub user_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub created_at: String,
    pub reporter: Option<AuthorSummary>,
}

impl ReportView {
    fn new(record: ReportRecord, reporter: Option<AuthorSummary>) -> Self {
        Self {
            id: record.id,
            reason: record.reason,
            user_id: record.user_id,
            post_id: record.post_id,
            comment_id: record.comment_id,
            created_at: record.created_at,
            reporter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedPost {
    #[serde(flatten)]
    pub post: PostView,
    pub report_count: i64,
    pub reports: Vec<ReportView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedComment {
    pub id: String,
    pub body: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub author: Option<AuthorSummary>,
    pub post: Option<PostRef>,
    pub vote_count: i64,
    pub report_count: i64,
    pub reports: Vec<ReportView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedItems {
    pub reported_posts: Vec<ReportedPost>,
    pub reported_comments: Vec<ReportedComment>,
}

#[derive(Clone)]
pub struct ReportService {
    database: Database,
}

impl ReportService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Files a report. The same user may report the same subject more than
    /// once.
    pub fn file_report(
        &self,
        user_id: &str,
        target: ReportTarget,
        reason: &str,
    ) -> ForumResult<ReportView> {
        let subject = target.subject()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ForumError::invalid("a reason is required"));
        }
        let record = ReportRecord::for_subject(
            Uuid::new_v4().to_string(),
            reason.to_string(),
            user_id.to_string(),
            &subject,
            now_utc_iso(),
        );

        let reporter = self
            .database
            .with_transaction(|repos| -> ForumResult<Option<AuthorSummary>> {
                if !repos.subject_exists(&subject)? {
                    return Err(ForumError::not_found(format!(
                        "{} {} not found",
                        subject.kind, subject.id
                    )));
                }
                repos.reports().create(&record)?;
                Ok(author_of(&repos, user_id)?)
            })?;

        tracing::info!(
            report_id = %record.id,
            subject = %subject.kind,
            subject_id = %subject.id,
            user_id = %user_id,
            "report filed"
        );
        Ok(ReportView::new(record, reporter))
    }

    /// Whether `user_id` has already reported the subject. Advisory only;
    /// filing again is still allowed.
    pub fn check_reported(&self, user_id: &str, target: &ReportTarget) -> ForumResult<bool> {
        let subject = target.subject()?;
        Ok(self
            .database
            .with_repositories(|repos| repos.reports().exists_for(user_id, &subject))?)
    }

    pub fn list_reported_items(&self, session: &Session) -> ForumResult<ReportedItems> {
        session.require(&RequireRole(Role::Admin))?;
        Ok(self.database.with_repositories(|repos| {
            let mut reported_posts = Vec::new();
            for record in repos.posts().list_reported()? {
                let subject = SubjectRef::post(record.id.as_str());
                let reports = report_views(&repos, &subject)?;
                reported_posts.push(ReportedPost {
                    post: post_view(&repos, record)?,
                    report_count: reports.len() as i64,
                    reports,
                });
            }

            let mut reported_comments = Vec::new();
            for record in repos.comments().list_reported()? {
                let subject = SubjectRef::comment(record.id.as_str());
                let reports = report_views(&repos, &subject)?;
                let post = repos.posts().get(&record.post_id)?.map(|post| PostRef {
                    id: post.id,
                    title: post.title,
                });
                let tally = repos.votes().tally(SubjectKind::Comment, &record.id)?;
                reported_comments.push(ReportedComment {
                    author: author_of(&repos, &record.user_id)?,
                    id: record.id,
                    body: record.body,
                    user_id: record.user_id,
                    parent_id: record.parent_id,
                    created_at: record.created_at,
                    post,
                    vote_count: tally.total(),
                    report_count: reports.len() as i64,
                    reports,
                });
            }

            anyhow::Ok(ReportedItems {
                reported_posts,
                reported_comments,
            })
        })?)
    }

    /// Dismisses every report on the subject and leaves the subject itself
    /// untouched. Returns how many reports were removed.
    pub fn clear_reports(&self, session: &Session, target: &ReportTarget) -> ForumResult<usize> {
        session.require(&RequireRole(Role::Admin))?;
        let subject = target.subject()?;
        let cleared = self
            .database
            .with_repositories(|repos| repos.reports().delete_for(&subject))?;
        tracing::info!(
            subject = %subject.kind,
            subject_id = %subject.id,
            cleared,
            by = %session.user_id,
            "reports cleared"
        );
        Ok(cleared)
    }

    /// Deletes the reported subject with everything hanging off it. Returns
    /// how many posts or comments were removed.
    pub fn delete_reported_item(
        &self,
        session: &Session,
        target: &ReportTarget,
    ) -> ForumResult<usize> {
        session.require(&RequireRole(Role::Admin))?;
        let subject = target.subject()?;
        let removed = self
            .database
            .with_transaction(|repos| -> ForumResult<usize> {
                match subject.kind {
                    SubjectKind::Post => {
                        if repos.posts().get(&subject.id)?.is_none() {
                            return Err(ForumError::not_found(format!(
                                "post {} not found",
                                subject.id
                            )));
                        }
                        purge_post(&repos, &subject.id)?;
                        Ok(1)
                    }
                    SubjectKind::Comment => Ok(purge_comment_subtree(&repos, &subject.id)?),
                }
            })?;
        tracing::info!(
            subject = %subject.kind,
            subject_id = %subject.id,
            removed,
            by = %session.user_id,
            "reported item deleted"
        );
        Ok(removed)
    }
}

fn author_of(repos: &SqliteRepositories<'_>, user_id: &str) -> anyhow::Result<Option<AuthorSummary>> {
    Ok(repos
        .users()
        .get(user_id)?
        .map(|user| AuthorSummary::from_record(&user)))
}

fn report_views(
    repos: &SqliteRepositories<'_>,
    subject: &SubjectRef,
) -> anyhow::Result<Vec<ReportView>> {
    let mut views = Vec::new();
    for record in repos.reports().list_for(subject)? {
        let reporter = author_of(repos, &record.user_id)?;
        views.push(ReportView::new(record, reporter));
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::{CommentService, NewComment};
    use crate::database::test_support::{count, memory_db, seed_post, seed_user};

    fn setup_service() -> (Database, ReportService, String) {
        let db = memory_db();
        seed_user(&db, "alice", Role::Student);
        seed_user(&db, "bob", Role::Student);
        seed_user(&db, "carol", Role::Faculty);
        seed_user(&db, "root", Role::Admin);
        seed_post(&db, "post-1", "alice");
        let comment = CommentService::new(db.clone())
            .create_comment(
                "alice",
                NewComment {
                    post_id: "post-1".into(),
                    body: "questionable".into(),
                    parent_id: None,
                },
            )
            .unwrap();
        (db.clone(), ReportService::new(db), comment.id)
    }

    fn post_target(id: &str) -> ReportTarget {
        ReportTarget {
            post_id: Some(id.into()),
            comment_id: None,
        }
    }

    fn comment_target(id: &str) -> ReportTarget {
        ReportTarget {
            post_id: None,
            comment_id: Some(id.into()),
        }
    }

    fn admin() -> Session {
        Session::new("root", Role::Admin)
    }

    #[test]
    fn target_must_name_exactly_one_subject() {
        assert!(matches!(
            ReportTarget::default().subject(),
            Err(ForumError::InvalidArgument(_))
        ));
        let both = ReportTarget {
            post_id: Some("p".into()),
            comment_id: Some("c".into()),
        };
        assert!(matches!(both.subject(), Err(ForumError::InvalidArgument(_))));
        assert_eq!(post_target("p").subject().unwrap(), SubjectRef::post("p"));
    }

    #[test]
    fn filing_validates_reason_and_subject() {
        let (_db, service, _comment) = setup_service();
        assert!(matches!(
            service.file_report("bob", post_target("post-1"), "   "),
            Err(ForumError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.file_report("bob", post_target("ghost"), "spam"),
            Err(ForumError::NotFound(_))
        ));

        let report = service
            .file_report("bob", post_target("post-1"), " spam ")
            .unwrap();
        assert_eq!(report.reason, "spam");
        assert_eq!(report.post_id.as_deref(), Some("post-1"));
        assert!(report.comment_id.is_none());
        assert!(service.check_reported("bob", &post_target("post-1")).unwrap());
        assert!(!service.check_reported("carol", &post_target("post-1")).unwrap());
    }

    #[test]
    fn two_reports_on_one_comment_are_grouped() {
        let (_db, service, comment_id) = setup_service();
        service
            .file_report("bob", comment_target(&comment_id), "rude")
            .unwrap();
        service
            .file_report("carol", comment_target(&comment_id), "off-topic")
            .unwrap();

        let items = service.list_reported_items(&admin()).unwrap();
        assert!(items.reported_posts.is_empty());
        assert_eq!(items.reported_comments.len(), 1);

        let entry = &items.reported_comments[0];
        assert_eq!(entry.report_count, 2);
        let reporters: Vec<_> = entry.reports.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(reporters, vec!["bob", "carol"]);
        assert_eq!(entry.post.as_ref().map(|p| p.id.as_str()), Some("post-1"));
        assert_eq!(
            entry.reports[0].reporter.as_ref().map(|r| r.name.as_str()),
            Some("user bob")
        );
    }

    #[test]
    fn clearing_keeps_the_subject() {
        let (db, service, _comment) = setup_service();
        service
            .file_report("bob", post_target("post-1"), "spam")
            .unwrap();
        service
            .file_report("bob", post_target("post-1"), "still spam")
            .unwrap();

        let listed = service.list_reported_items(&admin()).unwrap();
        assert_eq!(listed.reported_posts.len(), 1);
        assert_eq!(listed.reported_posts[0].report_count, 2);

        assert_eq!(service.clear_reports(&admin(), &post_target("post-1")).unwrap(), 2);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM posts WHERE id = ?1", "post-1"), 1);
        assert!(service
            .list_reported_items(&admin())
            .unwrap()
            .reported_posts
            .is_empty());
    }

    #[test]
    fn deleting_a_reported_post_removes_its_reports() {
        let (db, service, comment_id) = setup_service();
        service
            .file_report("bob", post_target("post-1"), "spam")
            .unwrap();
        service
            .file_report("carol", comment_target(&comment_id), "rude")
            .unwrap();

        assert_eq!(
            service
                .delete_reported_item(&admin(), &post_target("post-1"))
                .unwrap(),
            1
        );
        assert_eq!(count(&db, "SELECT COUNT(*) FROM posts WHERE id = ?1", "post-1"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM reports WHERE post_id = ?1", "post-1"), 0);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM reports WHERE comment_id = ?1", &comment_id),
            0
        );
        assert!(matches!(
            service.delete_reported_item(&admin(), &post_target("post-1")),
            Err(ForumError::NotFound(_))
        ));
    }

    #[test]
    fn moderation_requires_an_admin() {
        let (_db, service, comment_id) = setup_service();
        let student = Session::new("bob", Role::Student);
        assert!(matches!(
            service.list_reported_items(&student),
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            service.clear_reports(&student, &comment_target(&comment_id)),
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_reported_item(&student, &comment_target(&comment_id)),
            Err(ForumError::Forbidden(_))
        ));
    }
}
