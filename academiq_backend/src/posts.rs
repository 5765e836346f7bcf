use crate::auth::{OwnerOnly, OwnerOrAdmin, Session};
use crate::database::models::{BookmarkRecord, PostRecord, SubjectKind, SubjectRef};
use crate::database::repositories::{
    BookmarkRepository, CommentRepository, PostRepository, ReportRepository, SqliteRepositories,
    UserRepository, VoteRepository,
};
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::search::{build_predicate, PostFilterParams};
use crate::uploads::{MaterialFile, MaterialUploader};
use crate::users::AuthorSummary;
use crate::utils::{format_timestamp, now_utc_iso};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TRENDING_WINDOW_DAYS: i64 = 7;
const TRENDING_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounts {
    pub comments: i64,
    pub votes: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
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
    pub author: Option<AuthorSummary>,
    pub counts: PostCounts,
}

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub course_code: String,
    pub topics: Vec<String>,
    pub has_link: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
    uploader: MaterialUploader,
}

impl PostService {
    pub fn new(database: Database, uploader: MaterialUploader) -> Self {
        Self { database, uploader }
    }

    /// Uploads the materials one after another, then stores the post. Any
    /// failed upload aborts the whole creation and removes the files already
    /// written.
    pub async fn create_post(
        &self,
        user_id: &str,
        input: NewPost,
        files: Vec<MaterialFile>,
    ) -> ForumResult<PostView> {
        let title = required(&input.title, "title")?;
        let body = required(&input.body, "body")?;
        let course_code = required(&input.course_code, "courseCode")?;
        let topics = normalize_topics(input.topics);

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.uploader.upload(file).await {
                Ok(material) => stored.push(material),
                Err(err) => {
                    self.uploader.discard(&stored).await;
                    return Err(err);
                }
            }
        }
        let materials: Vec<String> = stored.iter().map(|material| material.url.clone()).collect();

        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title,
            body,
            course_code,
            topics,
            has_link: input.has_link,
            has_material: !materials.is_empty(),
            materials,
            created_at: now_utc_iso(),
            updated_at: None,
        };
        let created = self.database.with_repositories(|repos| {
            repos.posts().create(&record)?;
            post_view(&repos, record.clone())
        });
        let view = match created {
            Ok(view) => view,
            Err(err) => {
                self.uploader.discard(&stored).await;
                return Err(err.into());
            }
        };

        tracing::info!(
            post_id = %view.id,
            user_id = %user_id,
            course_code = %view.course_code,
            materials = view.materials.len(),
            "post created"
        );
        Ok(view)
    }

    pub fn get_post(&self, post_id: &str) -> ForumResult<PostView> {
        self.database.with_repositories(|repos| {
            let Some(record) = repos.posts().get(post_id)? else {
                return Err(ForumError::not_found(format!("post {post_id} not found")));
            };
            Ok(post_view(&repos, record)?)
        })
    }

    pub fn update_post(
        &self,
        session: &Session,
        post_id: &str,
        update: PostUpdate,
    ) -> ForumResult<PostView> {
        let view = self
            .database
            .with_transaction(|repos| -> ForumResult<PostView> {
                let Some(mut record) = repos.posts().get(post_id)? else {
                    return Err(ForumError::not_found(format!("post {post_id} not found")));
                };
                session.require(&OwnerOnly(&record.user_id))?;

                if let Some(title) = &update.title {
                    record.title = required(title, "title")?;
                }
                if let Some(body) = &update.body {
                    record.body = required(body, "body")?;
                }
                if let Some(course_code) = &update.course_code {
                    record.course_code = required(course_code, "courseCode")?;
                }
                if let Some(topics) = update.topics {
                    record.topics = normalize_topics(topics);
                }
                record.updated_at = Some(now_utc_iso());

                repos.posts().update_content(&record)?;
                Ok(post_view(&repos, record)?)
            })?;
        tracing::info!(post_id = %post_id, user_id = %session.user_id, "post updated");
        Ok(view)
    }

    /// Deletes the post with its votes, comments, bookmarks and reports.
    pub fn delete_post(&self, session: &Session, post_id: &str) -> ForumResult<()> {
        self.database
            .with_transaction(|repos| -> ForumResult<()> {
                let Some(record) = repos.posts().get(post_id)? else {
                    return Err(ForumError::not_found(format!("post {post_id} not found")));
                };
                session.require(&OwnerOrAdmin(&record.user_id))?;
                purge_post(&repos, post_id)?;
                Ok(())
            })?;
        tracing::info!(post_id = %post_id, by = %session.user_id, "post deleted");
        Ok(())
    }

    pub fn list_posts(&self, filters: &PostFilterParams) -> ForumResult<Vec<PostView>> {
        let predicate = build_predicate(filters)?;
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_matching(&predicate)?;
            Ok(post_views(&repos, records)?)
        })
    }

    /// Posts from the last seven days with the most votes, then the most
    /// comments.
    pub fn trending(&self) -> ForumResult<Vec<PostView>> {
        let since = format_timestamp(Utc::now() - Duration::days(TRENDING_WINDOW_DAYS));
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_trending(&since, TRENDING_LIMIT)?;
            Ok(post_views(&repos, records)?)
        })
    }

    pub fn list_user_posts(&self, user_id: &str) -> ForumResult<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            if repos.users().get(user_id)?.is_none() {
                return Err(ForumError::not_found(format!("user {user_id} not found")));
            }
            let records = repos.posts().list_for_user(user_id)?;
            Ok(post_views(&repos, records)?)
        })
    }

    /// Adds the bookmark if absent, removes it otherwise. Returns whether the
    /// post is bookmarked afterwards.
    pub fn toggle_bookmark(&self, user_id: &str, post_id: &str) -> ForumResult<bool> {
        let bookmarked = self
            .database
            .with_transaction(|repos| -> ForumResult<bool> {
                if repos.posts().get(post_id)?.is_none() {
                    return Err(ForumError::not_found(format!("post {post_id} not found")));
                }
                let bookmarks = repos.bookmarks();
                match bookmarks.find(post_id, user_id)? {
                    Some(existing) => {
                        bookmarks.remove(&existing.id)?;
                        Ok(false)
                    }
                    None => {
                        bookmarks.add(&BookmarkRecord {
                            id: Uuid::new_v4().to_string(),
                            post_id: post_id.to_string(),
                            user_id: user_id.to_string(),
                            created_at: now_utc_iso(),
                        })?;
                        Ok(true)
                    }
                }
            })?;
        tracing::debug!(post_id = %post_id, user_id = %user_id, bookmarked, "bookmark toggled");
        Ok(bookmarked)
    }

    pub fn is_bookmarked(&self, user_id: &str, post_id: &str) -> ForumResult<bool> {
        Ok(self
            .database
            .with_repositories(|repos| repos.bookmarks().find(post_id, user_id))?
            .is_some())
    }

    /// Most recently bookmarked first.
    pub fn list_bookmarked_posts(&self, user_id: &str) -> ForumResult<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_bookmarked_by(user_id)?;
            Ok(post_views(&repos, records)?)
        })
    }
}

/// Removes a post and everything hanging off it: its votes, its comments with
/// their votes and reports, bookmarks, and reports on the post itself.
pub(crate) fn purge_post(repos: &SqliteRepositories<'_>, post_id: &str) -> anyhow::Result<()> {
    let votes = repos.votes();
    let reports = repos.reports();
    votes.delete_for_subject(SubjectKind::Post, post_id)?;
    votes.delete_for_post_comments(post_id)?;
    reports.delete_for_post_comments(post_id)?;
    let comments = repos.comments().delete_for_post(post_id)?;
    repos.bookmarks().delete_for_post(post_id)?;
    reports.delete_for(&SubjectRef::post(post_id))?;
    repos.posts().delete(post_id)?;
    tracing::debug!(post_id = %post_id, comments, "post purged");
    Ok(())
}

pub(crate) fn post_view(
    repos: &SqliteRepositories<'_>,
    record: PostRecord,
) -> anyhow::Result<PostView> {
    let author = repos
        .users()
        .get(&record.user_id)?
        .map(|user| AuthorSummary::from_record(&user));
    let tally = repos.votes().tally(SubjectKind::Post, &record.id)?;
    let counts = PostCounts {
        comments: repos.comments().count_for_post(&record.id)?,
        votes: tally.total(),
        upvotes: tally.upvotes,
        downvotes: tally.downvotes,
    };
    Ok(PostView {
        id: record.id,
        user_id: record.user_id,
        title: record.title,
        body: record.body,
        course_code: record.course_code,
        topics: record.topics,
        has_link: record.has_link,
        materials: record.materials,
        has_material: record.has_material,
        created_at: record.created_at,
        updated_at: record.updated_at,
        author,
        counts,
    })
}

fn post_views(
    repos: &SqliteRepositories<'_>,
    records: Vec<PostRecord>,
) -> anyhow::Result<Vec<PostView>> {
    records
        .into_iter()
        .map(|record| post_view(repos, record))
        .collect()
}

fn required(value: &str, field: &str) -> ForumResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForumError::invalid(format!("{field} may not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims and lowercases topics, dropping blanks. Order is kept.
pub fn normalize_topics(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|topic| topic.trim().to_lowercase())
        .filter(|topic| !topic.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::{CommentService, NewComment};
    use crate::config::{FileConfig, ForumPaths};
    use crate::database::models::Role;
    use crate::database::test_support::{count, memory_db, seed_post, seed_post_at, seed_user};
    use crate::moderation::{ReportService, ReportTarget};
    use crate::voting::{VoteEngine, VoteValue};
    use bytes::Bytes;
    use tempfile::{tempdir, TempDir};

    fn setup_service() -> (Database, PostService, TempDir) {
        let db = memory_db();
        seed_user(&db, "alice", Role::Student);
        seed_user(&db, "bob", Role::Faculty);
        seed_user(&db, "root", Role::Admin);
        let temp = tempdir().expect("tempdir");
        let paths = ForumPaths::from_base_dir(temp.path()).expect("paths");
        let uploader = MaterialUploader::new(&paths, FileConfig::default());
        (db.clone(), PostService::new(db, uploader), temp)
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            body: "Notes on graph traversal".into(),
            course_code: "CSE220".into(),
            topics: vec![" Graphs ".into(), "".into(), "BFS".into()],
            has_link: false,
        }
    }

    #[tokio::test]
    async fn create_post_with_materials() {
        let (_db, service, _temp) = setup_service();
        let view = service
            .create_post(
                "alice",
                new_post("Graphs"),
                vec![MaterialFile {
                    file_name: Some("bfs.pdf".into()),
                    content_type: Some("application/pdf".into()),
                    data: Bytes::from_static(b"%PDF-1.4"),
                }],
            )
            .await
            .expect("create post");

        assert_eq!(view.topics, vec!["graphs".to_string(), "bfs".to_string()]);
        assert!(view.has_material);
        assert_eq!(view.materials.len(), 1);
        assert!(view.materials[0].starts_with("/materials/"));
        assert_eq!(view.author.as_ref().map(|a| a.id.as_str()), Some("alice"));

        let blank = service.create_post("alice", new_post("  "), Vec::new()).await;
        assert!(matches!(blank, Err(ForumError::InvalidArgument(_))));
    }

    fn stored_materials(temp: &TempDir) -> usize {
        let paths = ForumPaths::from_base_dir(temp.path()).expect("paths");
        std::fs::read_dir(paths.materials_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    fn pdf(name: &str, data: &'static [u8]) -> MaterialFile {
        MaterialFile {
            file_name: Some(name.into()),
            content_type: Some("application/pdf".into()),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn failed_upload_removes_earlier_materials() {
        let (db, service, temp) = setup_service();
        let result = service
            .create_post(
                "alice",
                new_post("Graphs"),
                vec![pdf("first.pdf", b"%PDF-1.4"), pdf("empty.pdf", b"")],
            )
            .await;

        assert!(matches!(result, Err(ForumError::InvalidArgument(_))));
        assert_eq!(stored_materials(&temp), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM posts WHERE user_id = ?1", "alice"), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_uploaded_materials() {
        let (_db, service, temp) = setup_service();
        let result = service
            .create_post("ghost", new_post("Graphs"), vec![pdf("notes.pdf", b"%PDF-1.4")])
            .await;

        assert!(matches!(result, Err(ForumError::Store(_))));
        assert_eq!(stored_materials(&temp), 0);
    }

    #[test]
    fn only_the_owner_updates_a_post() {
        let (db, service, _temp) = setup_service();
        seed_post(&db, "p1", "alice");

        let updated = service
            .update_post(
                &Session::new("alice", Role::Student),
                "p1",
                PostUpdate {
                    title: Some("Better title".into()),
                    topics: Some(vec!["DP".into()]),
                    ..PostUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Better title");
        assert_eq!(updated.topics, vec!["dp".to_string()]);
        assert!(updated.updated_at.is_some());

        assert!(matches!(
            service.update_post(&Session::new("root", Role::Admin), "p1", PostUpdate::default()),
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            service.update_post(&Session::new("alice", Role::Student), "nope", PostUpdate::default()),
            Err(ForumError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_post_cascades() {
        let (db, service, _temp) = setup_service();
        seed_post(&db, "p1", "alice");
        let comment = CommentService::new(db.clone())
            .create_comment(
                "bob",
                NewComment {
                    post_id: "p1".into(),
                    body: "nice".into(),
                    parent_id: None,
                },
            )
            .unwrap();
        let votes = VoteEngine::new(db.clone());
        votes
            .cast_vote(SubjectKind::Post, "p1", "bob", VoteValue::Up)
            .unwrap();
        votes
            .cast_vote(SubjectKind::Comment, &comment.id, "alice", VoteValue::Up)
            .unwrap();
        ReportService::new(db.clone())
            .file_report(
                "alice",
                ReportTarget {
                    post_id: None,
                    comment_id: Some(comment.id.clone()),
                },
                "rude",
            )
            .unwrap();
        service.toggle_bookmark("bob", "p1").unwrap();

        assert!(matches!(
            service.delete_post(&Session::new("bob", Role::Faculty), "p1"),
            Err(ForumError::Forbidden(_))
        ));
        service
            .delete_post(&Session::new("root", Role::Admin), "p1")
            .unwrap();

        for (sql, id) in [
            ("SELECT COUNT(*) FROM posts WHERE id = ?1", "p1"),
            ("SELECT COUNT(*) FROM post_votes WHERE post_id = ?1", "p1"),
            ("SELECT COUNT(*) FROM comments WHERE post_id = ?1", "p1"),
            ("SELECT COUNT(*) FROM bookmarks WHERE post_id = ?1", "p1"),
            ("SELECT COUNT(*) FROM comment_votes WHERE comment_id = ?1", comment.id.as_str()),
            ("SELECT COUNT(*) FROM reports WHERE comment_id = ?1", comment.id.as_str()),
        ] {
            assert_eq!(count(&db, sql, id), 0, "{sql}");
        }
    }

    #[test]
    fn trending_ranks_recent_posts_by_votes_then_comments() {
        let (db, service, _temp) = setup_service();
        seed_post(&db, "quiet", "alice");
        seed_post(&db, "voted", "alice");
        seed_post(&db, "discussed", "alice");
        seed_post_at(&db, "old", "alice", "2020-01-01T00:00:00.000Z");

        let votes = VoteEngine::new(db.clone());
        for user in ["alice", "bob"] {
            votes
                .cast_vote(SubjectKind::Post, "voted", user, VoteValue::Up)
                .unwrap();
            votes
                .cast_vote(SubjectKind::Post, "old", user, VoteValue::Up)
                .unwrap();
        }
        CommentService::new(db.clone())
            .create_comment(
                "bob",
                NewComment {
                    post_id: "discussed".into(),
                    body: "+1".into(),
                    parent_id: None,
                },
            )
            .unwrap();

        let ids: Vec<_> = service
            .trending()
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, vec!["voted", "discussed", "quiet"]);
    }

    #[test]
    fn bookmarks_toggle_and_list() {
        let (db, service, _temp) = setup_service();
        seed_post(&db, "p1", "alice");
        seed_post(&db, "p2", "alice");

        assert!(service.toggle_bookmark("bob", "p1").unwrap());
        assert!(service.toggle_bookmark("bob", "p2").unwrap());
        assert!(service.is_bookmarked("bob", "p1").unwrap());

        let listed: Vec<_> = service
            .list_bookmarked_posts("bob")
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(listed, vec!["p2", "p1"]);

        assert!(!service.toggle_bookmark("bob", "p1").unwrap());
        assert!(!service.is_bookmarked("bob", "p1").unwrap());
        assert!(matches!(
            service.toggle_bookmark("bob", "ghost"),
            Err(ForumError::NotFound(_))
        ));
    }

    #[test]
    fn list_posts_applies_filters_newest_first() {
        let (db, service, _temp) = setup_service();
        seed_post_at(&db, "jan", "alice", "2024-01-03T10:00:00.000Z");
        seed_post_at(&db, "feb", "bob", "2024-02-03T10:00:00.000Z");

        let all: Vec<_> = service
            .list_posts(&PostFilterParams::default())
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(all, vec!["feb", "jan"]);

        let january = service
            .list_posts(&PostFilterParams {
                from_date: Some("2024-01-01".into()),
                to_date: Some("2024-01-31".into()),
                ..PostFilterParams::default()
            })
            .unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].id, "jan");

        let by_author = service.list_user_posts("bob").unwrap();
        assert_eq!(by_author.len(), 1);
        assert!(matches!(
            service.list_user_posts("ghost"),
            Err(ForumError::NotFound(_))
        ));
    }
}
