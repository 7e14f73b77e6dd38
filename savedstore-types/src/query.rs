//! A small typed query DSL for the document store.
//!
//! Authorization predicates are injected into search requests as query
//! fragments so unauthorized documents are never fetched. The same
//! fragment has to drive two backends: it serializes to
//! OpenSearch-compatible JSON for the remote backend, and it can be
//! evaluated in process against a serialized document for the in-memory
//! backend. Keeping both behind one type guarantees the two enforce the
//! same predicate.

use serde::Serialize;
use serde_json::{Value, json};

/// A node in the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryDsl {
    /// Matches every document.
    MatchAll,
    /// Matches no document.
    MatchNone,
    /// Exact match of `value` against the field (or any element of an
    /// array-valued field).
    Term {
        /// Dotted field path, e.g. `permissions.read.users`.
        field: String,
        /// The value to match.
        value: String,
    },
    /// Matches if the field contains any of `values`.
    Terms {
        /// Dotted field path.
        field: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Case-insensitive text search over the given fields.
    SimpleQueryString {
        /// The search text.
        query: String,
        /// Dotted field paths to search in.
        fields: Vec<String>,
    },
    /// Boolean combination of sub-queries.
    Bool(BoolQuery),
}

/// The boolean compound query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// All of these must match.
    pub must: Vec<QueryDsl>,
    /// At least `minimum_should_match` of these must match.
    pub should: Vec<QueryDsl>,
    /// Like `must`, but without scoring relevance.
    pub filter: Vec<QueryDsl>,
    /// None of these may match.
    pub must_not: Vec<QueryDsl>,
    /// Required number of `should` matches. Defaults to 1 when `should`
    /// is the only clause present, 0 otherwise (OpenSearch semantics).
    pub minimum_should_match: Option<u32>,
}

impl QueryDsl {
    /// Shorthand for a [`QueryDsl::Term`] node.
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        QueryDsl::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a [`QueryDsl::Terms`] node.
    pub fn terms(field: impl Into<String>, values: Vec<String>) -> Self {
        QueryDsl::Terms {
            field: field.into(),
            values,
        }
    }

    /// Serializes this query to OpenSearch-compatible JSON.
    pub fn to_value(&self) -> Value {
        match self {
            QueryDsl::MatchAll => json!({ "match_all": {} }),
            QueryDsl::MatchNone => json!({ "match_none": {} }),
            QueryDsl::Term { field, value } => json!({ "term": { field: value } }),
            QueryDsl::Terms { field, values } => json!({ "terms": { field: values } }),
            QueryDsl::SimpleQueryString { query, fields } => json!({
                "simple_query_string": { "query": query, "fields": fields }
            }),
            QueryDsl::Bool(bool_query) => {
                let mut body = serde_json::Map::new();
                for (key, clauses) in [
                    ("must", &bool_query.must),
                    ("should", &bool_query.should),
                    ("filter", &bool_query.filter),
                    ("must_not", &bool_query.must_not),
                ] {
                    if !clauses.is_empty() {
                        let rendered = clauses.iter().map(QueryDsl::to_value).collect();
                        body.insert(key.to_owned(), Value::Array(rendered));
                    }
                }
                if let Some(msm) = bool_query.minimum_should_match {
                    body.insert("minimum_should_match".to_owned(), msm.into());
                }
                json!({ "bool": body })
            }
        }
    }

    /// Evaluates this query against a serialized document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            QueryDsl::MatchAll => true,
            QueryDsl::MatchNone => false,
            QueryDsl::Term { field, value } => {
                field_values(doc, field).any(|v| v.as_str() == Some(value))
            }
            QueryDsl::Terms { field, values } => field_values(doc, field)
                .any(|v| v.as_str().is_some_and(|s| values.iter().any(|c| c == s))),
            QueryDsl::SimpleQueryString { query, fields } => {
                let needle = query.to_lowercase();
                fields.iter().any(|field| {
                    field_values(doc, field).any(|v| {
                        v.as_str()
                            .is_some_and(|s| s.to_lowercase().contains(&needle))
                    })
                })
            }
            QueryDsl::Bool(bool_query) => {
                if !bool_query.must.iter().all(|q| q.matches(doc)) {
                    return false;
                }
                if !bool_query.filter.iter().all(|q| q.matches(doc)) {
                    return false;
                }
                if bool_query.must_not.iter().any(|q| q.matches(doc)) {
                    return false;
                }

                let required = bool_query.minimum_should_match.unwrap_or({
                    if bool_query.must.is_empty() && bool_query.filter.is_empty() {
                        1
                    } else {
                        0
                    }
                });
                if bool_query.should.is_empty() {
                    return required == 0 || bool_query.minimum_should_match.is_none();
                }

                let matched = bool_query
                    .should
                    .iter()
                    .filter(|q| q.matches(doc))
                    .count();
                matched as u32 >= required
            }
        }
    }
}

impl Serialize for QueryDsl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Resolves a dotted field path, yielding each scalar behind it.
///
/// Array-valued fields yield every element, so a `term` on
/// `workspaces` matches documents whose list contains the value.
fn field_values<'a>(doc: &'a Value, path: &str) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
    let mut current = doc;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Box::new(std::iter::empty()),
        }
    }

    match current {
        Value::Array(elements) => Box::new(elements.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        json!({
            "id": "ws-1",
            "type": "dashboard",
            "attributes": { "name": "Team Metrics" },
            "workspaces": ["alpha", "beta"],
            "permissions": {
                "read": { "users": ["alice", "*"] }
            }
        })
    }

    #[test]
    fn test_term_on_scalar_and_array_fields() {
        assert!(QueryDsl::term("type", "dashboard").matches(&doc()));
        assert!(QueryDsl::term("workspaces", "beta").matches(&doc()));
        assert!(QueryDsl::term("permissions.read.users", "alice").matches(&doc()));
        assert!(!QueryDsl::term("permissions.read.users", "bob").matches(&doc()));
        assert!(!QueryDsl::term("permissions.write.users", "alice").matches(&doc()));
    }

    #[test]
    fn test_terms_matches_any_value() {
        assert!(QueryDsl::terms("workspaces", vec!["beta".into(), "gamma".into()]).matches(&doc()));
        assert!(!QueryDsl::terms("workspaces", vec!["gamma".into()]).matches(&doc()));
    }

    #[test]
    fn test_simple_query_string_is_case_insensitive() {
        let query = QueryDsl::SimpleQueryString {
            query: "metrics".into(),
            fields: vec!["attributes.name".into()],
        };
        assert!(query.matches(&doc()));

        let miss = QueryDsl::SimpleQueryString {
            query: "logs".into(),
            fields: vec!["attributes.name".into()],
        };
        assert!(!miss.matches(&doc()));
    }

    #[test]
    fn test_bool_should_defaults_to_one_match() {
        let query = QueryDsl::Bool(BoolQuery {
            should: vec![
                QueryDsl::term("workspaces", "gamma"),
                QueryDsl::term("permissions.read.users", "alice"),
            ],
            ..Default::default()
        });
        assert!(query.matches(&doc()));
    }

    #[test]
    fn test_bool_filter_restricts_should() {
        let query = QueryDsl::Bool(BoolQuery {
            should: vec![QueryDsl::term("workspaces", "alpha")],
            filter: vec![QueryDsl::term("type", "visualization")],
            minimum_should_match: Some(1),
            ..Default::default()
        });
        assert!(!query.matches(&doc()));
    }

    #[test]
    fn test_match_none_serialization() {
        assert_eq!(QueryDsl::MatchNone.to_value(), json!({ "match_none": {} }));
    }

    #[test]
    fn test_bool_serialization_omits_empty_clauses() {
        let query = QueryDsl::Bool(BoolQuery {
            should: vec![QueryDsl::term("a", "b")],
            minimum_should_match: Some(1),
            ..Default::default()
        });
        assert_eq!(
            query.to_value(),
            json!({
                "bool": {
                    "should": [ { "term": { "a": "b" } } ],
                    "minimum_should_match": 1
                }
            })
        );
    }
}
