use crate::database::models::{SubjectKind, SubjectRef, VoteRecord, VoteTally};
use crate::database::repositories::VoteRepository;
use crate::database::Database;
use crate::error::{ForumError, ForumResult};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = ForumError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(ForumError::invalid(format!(
                "vote value must be 1 or -1, got {other}"
            ))),
        }
    }
}

/// What a cast did to the caller's vote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteChange {
    Added,
    Removed,
    Flipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteView {
    /// 1, -1, or 0 when the caller has not voted.
    pub user_vote: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

#[derive(Clone)]
pub struct VoteEngine {
    database: Database,
}

impl VoteEngine {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Toggles the caller's vote on a post or comment and returns the fresh
    /// tallies. Casting the value already held removes it; casting the
    /// opposite value flips it. The read-modify-write runs in one immediate
    /// transaction.
    pub fn cast_vote(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        value: VoteValue,
    ) -> ForumResult<VoteTally> {
        let subject = SubjectRef {
            kind,
            id: subject_id.to_string(),
        };
        let (change, tally) = self
            .database
            .with_transaction(|repos| -> ForumResult<(VoteChange, VoteTally)> {
                if !repos.subject_exists(&subject)? {
                    return Err(ForumError::not_found(format!("{kind} {subject_id} not found")));
                }
                let votes = repos.votes();
                let change = match votes.find(kind, subject_id, user_id)? {
                    None => {
                        votes.insert(
                            kind,
                            &VoteRecord {
                                id: Uuid::new_v4().to_string(),
                                subject_id: subject_id.to_string(),
                                user_id: user_id.to_string(),
                                value: value.as_i64(),
                                created_at: now_utc_iso(),
                            },
                        )?;
                        VoteChange::Added
                    }
                    Some(existing) if existing.value == value.as_i64() => {
                        votes.remove(kind, &existing.id)?;
                        VoteChange::Removed
                    }
                    Some(existing) => {
                        votes.set_value(kind, &existing.id, value.as_i64())?;
                        VoteChange::Flipped
                    }
                };
                Ok((change, votes.tally(kind, subject_id)?))
            })?;

        tracing::debug!(
            subject = %kind,
            subject_id = %subject_id,
            user_id = %user_id,
            ?change,
            upvotes = tally.upvotes,
            downvotes = tally.downvotes,
            "vote cast"
        );
        Ok(tally)
    }

    pub fn get_votes(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> ForumResult<UserVoteView> {
        self.database.with_repositories(|repos| {
            let votes = repos.votes();
            let user_vote = votes
                .find(kind, subject_id, user_id)?
                .map(|vote| vote.value)
                .unwrap_or(0);
            let tally = votes.tally(kind, subject_id)?;
            Ok(UserVoteView {
                user_vote,
                upvotes: tally.upvotes,
                downvotes: tally.downvotes,
            })
        })
    }
}
