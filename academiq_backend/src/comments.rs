use crate::auth::{RequireRole, Session};
use crate::database::models::{CommentRecord, Role, SubjectKind, SubjectRef};
use crate::database::repositories::{
    CommentRepository, PostRepository, ReportRepository, SqliteRepositories, UserRepository,
    VoteRepository,
};
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::users::AuthorSummary;
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: String,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A comment with its author, tallies and replies. Replies are ordered oldest
/// first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: String,
    pub author: Option<AuthorSummary>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_count: i64,
    pub report_count: i64,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    fn new(record: CommentRecord, author: Option<AuthorSummary>) -> Self {
        Self {
            id: record.id,
            post_id: record.post_id,
            user_id: record.user_id,
            parent_id: record.parent_id,
            body: record.body,
            created_at: record.created_at,
            author,
            upvotes: 0,
            downvotes: 0,
            vote_count: 0,
            report_count: 0,
            children: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_comment(&self, user_id: &str, input: NewComment) -> ForumResult<CommentNode> {
        let body = input.body.trim();
        if body.is_empty() {
            return Err(ForumError::invalid("comment body may not be empty"));
        }
        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id: input.post_id,
            user_id: user_id.to_string(),
            parent_id: input
                .parent_id
                .filter(|parent| !parent.trim().is_empty()),
            body: body.to_string(),
            created_at: now_utc_iso(),
        };

        let author = self
            .database
            .with_transaction(|repos| -> ForumResult<Option<AuthorSummary>> {
                if repos.posts().get(&record.post_id)?.is_none() {
                    return Err(ForumError::not_found(format!(
                        "post {} not found",
                        record.post_id
                    )));
                }
                if let Some(parent_id) = &record.parent_id {
                    let Some(parent) = repos.comments().get(parent_id)? else {
                        return Err(ForumError::not_found(format!(
                            "parent comment {parent_id} not found"
                        )));
                    };
                    if parent.post_id != record.post_id {
                        return Err(ForumError::invalid(
                            "parent comment belongs to a different post",
                        ));
                    }
                }
                repos.comments().create(&record)?;
                Ok(repos
                    .users()
                    .get(user_id)?
                    .map(|user| AuthorSummary::from_record(&user)))
            })?;

        tracing::info!(
            comment_id = %record.id,
            post_id = %record.post_id,
            parent_id = ?record.parent_id,
            user_id = %user_id,
            "comment created"
        );
        Ok(CommentNode::new(record, author))
    }

    /// The post's comment forest: roots newest first, every node annotated
    /// with its author, vote tallies and report count.
    pub fn list_comments(&self, post_id: &str) -> ForumResult<Vec<CommentNode>> {
        self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Err(ForumError::not_found(format!("post {post_id} not found")));
            }
            let records = repos.comments().list_for_post(post_id)?;
            Ok(build_forest(&repos, records)?)
        })
    }

    /// Removes the comment and every reply beneath it, with their votes and
    /// reports. Returns how many comments were removed; a missing comment
    /// removes nothing.
    pub fn delete_comment_subtree(&self, session: &Session, comment_id: &str) -> ForumResult<usize> {
        session.require(&RequireRole(Role::Admin))?;
        let removed = self
            .database
            .with_transaction(|repos| purge_comment_subtree(&repos, comment_id))?;
        tracing::info!(
            comment_id = %comment_id,
            removed,
            by = %session.user_id,
            "comment subtree deleted"
        );
        Ok(removed)
    }
}

/// Deletes a comment subtree through the given repositories. Nodes are
/// collected with an explicit worklist and removed in post-order, so every
/// reply is gone before its parent.
pub(crate) fn purge_comment_subtree(
    repos: &SqliteRepositories<'_>,
    comment_id: &str,
) -> anyhow::Result<usize> {
    let comments = repos.comments();
    if comments.get(comment_id)?.is_none() {
        return Ok(0);
    }

    let mut pending = vec![comment_id.to_string()];
    let mut preorder = Vec::new();
    while let Some(id) = pending.pop() {
        pending.extend(comments.child_ids(&id)?);
        preorder.push(id);
    }

    let votes = repos.votes();
    let reports = repos.reports();
    for id in preorder.iter().rev() {
        reports.delete_for(&SubjectRef::comment(id.as_str()))?;
        votes.delete_for_subject(SubjectKind::Comment, id)?;
        comments.delete(id)?;
    }
    Ok(preorder.len())
}

/// Loads author, tallies and report count for each comment and nests replies
/// under their parents. `records` arrive newest first.
pub(crate) fn build_forest(
    repos: &SqliteRepositories<'_>,
    records: Vec<CommentRecord>,
) -> anyhow::Result<Vec<CommentNode>> {
    let users = repos.users();
    let votes = repos.votes();
    let reports = repos.reports();

    let mut authors: HashMap<String, Option<AuthorSummary>> = HashMap::new();
    let mut roots = Vec::new();
    let mut replies: HashMap<String, Vec<String>> = HashMap::new();
    let mut nodes: HashMap<String, CommentNode> = HashMap::with_capacity(records.len());

    // Oldest first, so reply lists come out in chronological order.
    for record in records.into_iter().rev() {
        if !authors.contains_key(&record.user_id) {
            let author = users
                .get(&record.user_id)?
                .map(|user| AuthorSummary::from_record(&user));
            authors.insert(record.user_id.clone(), author);
        }
        let author = authors.get(&record.user_id).cloned().flatten();

        match &record.parent_id {
            Some(parent) => replies
                .entry(parent.clone())
                .or_default()
                .push(record.id.clone()),
            None => roots.push(record.id.clone()),
        }

        let tally = votes.tally(SubjectKind::Comment, &record.id)?;
        let report_count = reports.count_for(&SubjectRef::comment(record.id.as_str()))?;
        let mut node = CommentNode::new(record, author);
        node.upvotes = tally.upvotes;
        node.downvotes = tally.downvotes;
        node.vote_count = tally.total();
        node.report_count = report_count;
        nodes.insert(node.id.clone(), node);
    }
    roots.reverse();

    let mut preorder = Vec::with_capacity(nodes.len());
    let mut pending: Vec<&String> = roots.iter().collect();
    while let Some(id) = pending.pop() {
        if let Some(children) = replies.get(id) {
            pending.extend(children.iter());
        }
        preorder.push(id.clone());
    }

    // Children are complete before their parent is visited.
    for id in preorder.iter().rev() {
        let Some(children) = replies.get(id) else {
            continue;
        };
        let attached: Vec<CommentNode> = children
            .iter()
            .filter_map(|child| nodes.remove(child))
            .collect();
        if let Some(node) = nodes.get_mut(id) {
            node.children = attached;
        }
    }

    Ok(roots
        .iter()
        .filter_map(|id| nodes.remove(id))
        .collect())
}
