//! Translates the feed's query-string filters into a SQL predicate over
//! `posts p JOIN users u`.

use crate::error::{ForumError, ForumResult};
use crate::utils::format_timestamp;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Value;
use serde::Deserialize;

/// Raw filters as they arrive on `GET /posts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilterParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub has_link: Option<String>,
    #[serde(default)]
    pub has_material: Option<String>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
}

/// A conjunction of SQL clauses with their positional parameters, in bind
/// order.
#[derive(Debug, Clone, Default)]
pub struct StorePredicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl StorePredicate {
    fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// `WHERE a AND b ...`, or an empty string when no filter is active.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

const TEXT_MATCH: &str = "(instr(unicode_lower(p.title), ?) > 0 \
     OR instr(unicode_lower(p.body), ?) > 0 \
     OR instr(unicode_lower(p.course_code), ?) > 0 \
     OR instr(unicode_lower(u.name), ?) > 0 \
     OR EXISTS (SELECT 1 FROM json_each(p.topics) t WHERE t.value = ?))";

pub fn build_predicate(params: &PostFilterParams) -> ForumResult<StorePredicate> {
    let mut predicate = StorePredicate::default();

    if let Some(query) = non_blank(&params.q) {
        let needle = query.to_lowercase();
        predicate.push(TEXT_MATCH, (0..5).map(|_| Value::Text(needle.clone())));
    }

    if is_true(&params.has_link) {
        predicate.push("p.has_link = 1", std::iter::empty());
    }
    if is_true(&params.has_material) {
        predicate.push("p.has_material = 1", std::iter::empty());
    }

    if let Some(raw) = non_blank(&params.from_date) {
        let day = parse_day(raw, "fromDate")?;
        predicate.push("p.created_at >= ?", [Value::Text(start_of_day(day)?)]);
    }
    if let Some(raw) = non_blank(&params.to_date) {
        let day = parse_day(raw, "toDate")?;
        predicate.push("p.created_at <= ?", [Value::Text(end_of_day(day)?)]);
    }

    Ok(predicate)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

fn is_true(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_day(raw: &str, field: &str) -> ForumResult<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|_| {
            ForumError::invalid(format!(
                "{field} must be YYYY-MM-DD or an RFC 3339 timestamp, got {raw:?}"
            ))
        })
}

fn start_of_day(day: NaiveDate) -> ForumResult<String> {
    day_at(day, 0, 0, 0, 0)
}

/// Inclusive upper bound covering the whole day, down to the last millisecond.
fn end_of_day(day: NaiveDate) -> ForumResult<String> {
    day_at(day, 23, 59, 59, 999)
}

fn day_at(day: NaiveDate, hour: u32, min: u32, sec: u32, milli: u32) -> ForumResult<String> {
    let naive = day
        .and_hms_milli_opt(hour, min, sec, milli)
        .ok_or_else(|| ForumError::invalid(format!("invalid time of day for {day}")))?;
    Ok(format_timestamp(Utc.from_utc_datetime(&naive)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use crate::database::repositories::PostRepository;
    use crate::database::test_support::{memory_db, seed_post_at, seed_user};

    fn params() -> PostFilterParams {
        PostFilterParams::default()
    }

    #[test]
    fn no_filters_yield_empty_predicate() {
        let predicate = build_predicate(&params()).unwrap();
        assert!(predicate.is_empty());
        assert_eq!(predicate.where_sql(), "");
    }

    #[test]
    fn text_query_is_normalized_and_bound_five_times() {
        let predicate = build_predicate(&PostFilterParams {
            q: Some("  Graph Theory ".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(predicate.clauses().len(), 1);
        assert_eq!(predicate.params().len(), 5);
        assert!(predicate
            .params()
            .iter()
            .all(|value| *value == Value::Text("graph theory".into())));
    }

    #[test]
    fn boolean_filters_only_apply_when_true() {
        let predicate = build_predicate(&PostFilterParams {
            has_link: Some("false".into()),
            has_material: Some("true".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(predicate.clauses(), &["p.has_material = 1".to_string()]);
    }

    #[test]
    fn date_bounds_cover_whole_days() {
        let predicate = build_predicate(&PostFilterParams {
            from_date: Some("2024-01-01".into()),
            to_date: Some("2024-01-05".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(
            predicate.params(),
            &[
                Value::Text("2024-01-01T00:00:00.000Z".into()),
                Value::Text("2024-01-05T23:59:59.999Z".into()),
            ]
        );
        assert!(predicate.where_sql().contains(" AND "));
    }

    #[test]
    fn rfc3339_dates_use_their_utc_day() {
        let predicate = build_predicate(&PostFilterParams {
            to_date: Some("2024-01-05T08:30:00+00:00".into()),
            ..params()
        })
        .unwrap();
        assert_eq!(
            predicate.params(),
            &[Value::Text("2024-01-05T23:59:59.999Z".into())]
        );
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let err = build_predicate(&PostFilterParams {
            from_date: Some("yesterday".into()),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, ForumError::InvalidArgument(_)));
    }

    #[test]
    fn end_of_day_boundary_includes_late_posts() {
        let db = memory_db();
        seed_user(&db, "u1", Role::Student);
        seed_post_at(&db, "late", "u1", "2024-01-05T23:59:59.500Z");

        let matching = |to_date: &str| -> usize {
            let predicate = build_predicate(&PostFilterParams {
                to_date: Some(to_date.into()),
                ..params()
            })
            .unwrap();
            db.with_repositories(|repos| repos.posts().list_matching(&predicate))
                .unwrap()
                .len()
        };

        assert_eq!(matching("2024-01-05"), 1);
        assert_eq!(matching("2024-01-04"), 0);
    }

    #[test]
    fn text_query_matches_author_and_topics() {
        let db = memory_db();
        seed_user(&db, "u1", Role::Student);
        seed_post_at(&db, "p1", "u1", "2024-01-01T00:00:00.000Z");
        db.with_repositories(|repos| {
            repos
                .conn()
                .execute(
                    "UPDATE posts SET topics = '[\"recursion\"]' WHERE id = 'p1'",
                    [],
                )
                .map_err(anyhow::Error::from)
        })
        .unwrap();

        let search = |q: &str| -> usize {
            let predicate = build_predicate(&PostFilterParams {
                q: Some(q.into()),
                ..params()
            })
            .unwrap();
            db.with_repositories(|repos| repos.posts().list_matching(&predicate))
                .unwrap()
                .len()
        };

        assert_eq!(search("USER U1"), 1, "author name, case-insensitive");
        assert_eq!(search("Recursion"), 1, "exact topic after lowercasing");
        assert_eq!(search("recurs"), 0, "topics are not substring-matched");
        assert_eq!(search("cse1"), 1, "course code substring");
    }

    #[test]
    fn text_query_folds_non_ascii_case() {
        let db = memory_db();
        seed_user(&db, "u1", Role::Student);
        seed_post_at(&db, "p1", "u1", "2024-01-01T00:00:00.000Z");
        db.with_repositories(|repos| {
            repos
                .conn()
                .execute(
                    "UPDATE posts SET title = 'Études de Ångström' WHERE id = 'p1'",
                    [],
                )
                .map_err(anyhow::Error::from)
        })
        .unwrap();

        let search = |q: &str| -> usize {
            let predicate = build_predicate(&PostFilterParams {
                q: Some(q.into()),
                ..params()
            })
            .unwrap();
            db.with_repositories(|repos| repos.posts().list_matching(&predicate))
                .unwrap()
                .len()
        };

        assert_eq!(search("études"), 1);
        assert_eq!(search("Études"), 1);
        assert_eq!(search("ÅNGSTRÖM"), 1);
        assert_eq!(search("étude de ångströms"), 0);
    }
}
