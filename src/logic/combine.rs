//! Association resolution over two already-fetched relations.
//!
//! Resolution walks three states: Unresolved → Viewed → Joined. The first
//! transition calls the association's view to scope the target relation and
//! materializes it; that is the only I/O. The second transition is pure
//! in-memory matching, so every join function here takes plain tuple
//! slices and can be tested without handlers.

use crate::error::{Error, Result};
use crate::model::{Association, ManyToManyDef, Relation, RelationView, Tuple};
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve an association against its target relation and attach the
/// joined rows to each source tuple under the association's name. Source
/// order is preserved; matches within a group keep target fetch order.
pub async fn combine(
    source: &Relation,
    source_tuples: &[Tuple],
    association: &Association,
    target: &Relation,
) -> Result<Vec<Tuple>> {
    match association {
        Association::OneToMany(def) => {
            let targets = viewed(source_tuples, def.name(), def.view(), target).await?;
            Ok(join_one_to_many(
                source_tuples,
                &targets,
                source.primary_key(),
                &def.foreign_key(source),
                def.name(),
            ))
        }
        Association::OneToOne(def) => {
            let targets = viewed(source_tuples, def.name(), def.view(), target).await?;
            Ok(join_one_to_one(
                source_tuples,
                &targets,
                source.primary_key(),
                &def.foreign_key(source),
                def.name(),
            ))
        }
        Association::ManyToOne(def) => {
            let targets = viewed(source_tuples, def.name(), def.view(), target).await?;
            // The foreign key sits on the source but is named after the
            // target: posts.user_id -> users.id.
            Ok(join_many_to_one(
                source_tuples,
                &targets,
                &def.foreign_key(target),
                &def.target_primary_key(target),
                def.name(),
            ))
        }
        Association::ManyToMany(def) => combine_many_to_many(source, source_tuples, def, target).await,
    }
}

async fn combine_many_to_many(
    source: &Relation,
    source_tuples: &[Tuple],
    def: &ManyToManyDef,
    target: &Relation,
) -> Result<Vec<Tuple>> {
    let through = def.through().ok_or_else(|| {
        Error::configuration([format!("association `{}` through relation", def.name())])
    })?;
    let targets = viewed(source_tuples, def.name(), def.view(), target).await?;
    let join_rows = match def.through_view() {
        Some(view) => view.call(source_tuples, through.clone()).await?.to_a().await?,
        None => through.to_a().await?,
    };
    Ok(join_many_to_many(
        source_tuples,
        &join_rows,
        &targets,
        source.primary_key(),
        &def.source_foreign_key(source),
        &def.target_foreign_key(target),
        &def.target_primary_key(target),
        def.name(),
    ))
}

/// Unresolved → Viewed: a missing view is fatal before any I/O happens.
async fn viewed(
    source_tuples: &[Tuple],
    name: &str,
    view: Option<&Arc<dyn RelationView>>,
    target: &Relation,
) -> Result<Vec<Tuple>> {
    let view = view.ok_or_else(|| Error::MissingAssociationView {
        name: name.to_string(),
    })?;
    let scoped = view.call(source_tuples, target.clone()).await?;
    scoped.to_a().await
}

// Grouping keys are the canonical JSON rendering of the join value, so
// numbers and strings stay distinct; schema coercion is what normalizes
// them beforehand.
fn join_key(tuple: &Tuple, field: &str) -> Option<String> {
    match tuple.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.to_string()),
    }
}

/// For each source tuple, attach the array of target tuples whose foreign
/// key equals the source's primary key.
pub fn join_one_to_many(
    source: &[Tuple],
    targets: &[Tuple],
    primary_key: &str,
    foreign_key: &str,
    name: &str,
) -> Vec<Tuple> {
    let groups: HashMap<String, Vec<&Tuple>> = targets
        .iter()
        .filter_map(|t| join_key(t, foreign_key).map(|k| (k, t)))
        .into_group_map();

    source
        .iter()
        .map(|row| {
            let matches = join_key(row, primary_key)
                .and_then(|k| groups.get(&k))
                .map(|group| group.iter().map(|t| Value::Object((*t).clone())).collect())
                .unwrap_or_default();
            attach(row, name, Value::Array(matches))
        })
        .collect()
}

/// OneToMany that keeps only the first match per source row; extras are
/// dropped, a missing match attaches null.
pub fn join_one_to_one(
    source: &[Tuple],
    targets: &[Tuple],
    primary_key: &str,
    foreign_key: &str,
    name: &str,
) -> Vec<Tuple> {
    let groups: HashMap<String, Vec<&Tuple>> = targets
        .iter()
        .filter_map(|t| join_key(t, foreign_key).map(|k| (k, t)))
        .into_group_map();

    source
        .iter()
        .map(|row| {
            let first = join_key(row, primary_key)
                .and_then(|k| groups.get(&k))
                .and_then(|group| group.first())
                .map(|t| Value::Object((*t).clone()))
                .unwrap_or(Value::Null);
            attach(row, name, first)
        })
        .collect()
}

/// For each source tuple, attach the single target tuple whose primary key
/// equals the source's foreign key; a miss attaches null, never an error.
pub fn join_many_to_one(
    source: &[Tuple],
    targets: &[Tuple],
    foreign_key: &str,
    target_primary_key: &str,
    name: &str,
) -> Vec<Tuple> {
    let mut by_pk: HashMap<String, &Tuple> = HashMap::new();
    for t in targets {
        if let Some(k) = join_key(t, target_primary_key) {
            by_pk.entry(k).or_insert(t);
        }
    }

    source
        .iter()
        .map(|row| {
            let found = join_key(row, foreign_key)
                .and_then(|k| by_pk.get(&k))
                .map(|t| Value::Object((*t).clone()))
                .unwrap_or(Value::Null);
            attach(row, name, found)
        })
        .collect()
}

/// For each source tuple, attach every target tuple reachable through join
/// rows matching on both sides. Reached targets keep join-row order.
#[allow(clippy::too_many_arguments)]
pub fn join_many_to_many(
    source: &[Tuple],
    join_rows: &[Tuple],
    targets: &[Tuple],
    primary_key: &str,
    source_foreign_key: &str,
    target_foreign_key: &str,
    target_primary_key: &str,
    name: &str,
) -> Vec<Tuple> {
    let mut targets_by_pk: HashMap<String, &Tuple> = HashMap::new();
    for t in targets {
        if let Some(k) = join_key(t, target_primary_key) {
            targets_by_pk.entry(k).or_insert(t);
        }
    }
    let rows_by_source: HashMap<String, Vec<&Tuple>> = join_rows
        .iter()
        .filter_map(|r| join_key(r, source_foreign_key).map(|k| (k, r)))
        .into_group_map();

    source
        .iter()
        .map(|row| {
            let matches: Vec<Value> = join_key(row, primary_key)
                .and_then(|k| rows_by_source.get(&k))
                .map(|rows| {
                    rows.iter()
                        .filter_map(|r| join_key(r, target_foreign_key))
                        .filter_map(|k| targets_by_pk.get(&k))
                        .map(|t| Value::Object((*t).clone()))
                        .collect()
                })
                .unwrap_or_default();
            attach(row, name, Value::Array(matches))
        })
        .collect()
}

fn attach(row: &Tuple, name: &str, value: Value) -> Tuple {
    let mut out = row.clone();
    out.insert(name.to_string(), value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{JsonResponseHandler, RawResponse, RequestHandler};
    use crate::model::{AssociationDef, Dataset};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tuples(value: Value) -> Vec<Tuple> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                })
                .collect(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_one_to_many_join_shape() {
        let source = tuples(json!([{"id": 1}, {"id": 2}]));
        let target = tuples(json!([
            {"id": 10, "user_id": 1},
            {"id": 11, "user_id": 1},
            {"id": 12, "user_id": 2}
        ]));
        let joined = join_one_to_many(&source, &target, "id", "user_id", "posts");
        assert_eq!(
            Value::Array(joined.into_iter().map(Value::Object).collect()),
            json!([
                {"id": 1, "posts": [{"id": 10, "user_id": 1}, {"id": 11, "user_id": 1}]},
                {"id": 2, "posts": [{"id": 12, "user_id": 2}]}
            ])
        );
    }

    #[test]
    fn test_one_to_many_preserves_source_and_target_order() {
        let source = tuples(json!([{"id": 2}, {"id": 1}]));
        let target = tuples(json!([
            {"id": 11, "user_id": 1},
            {"id": 10, "user_id": 1}
        ]));
        let joined = join_one_to_many(&source, &target, "id", "user_id", "posts");
        assert_eq!(joined[0]["id"], json!(2));
        assert_eq!(
            joined[1]["posts"],
            json!([{"id": 11, "user_id": 1}, {"id": 10, "user_id": 1}])
        );
    }

    #[test]
    fn test_one_to_many_no_match_attaches_empty_array() {
        let source = tuples(json!([{"id": 7}]));
        let joined = join_one_to_many(&source, &[], "id", "user_id", "posts");
        assert_eq!(joined[0]["posts"], json!([]));
    }

    #[test]
    fn test_one_to_one_takes_first_match_only() {
        let source = tuples(json!([{"id": 1}]));
        let target = tuples(json!([
            {"id": 20, "user_id": 1},
            {"id": 21, "user_id": 1}
        ]));
        let joined = join_one_to_one(&source, &target, "id", "user_id", "profile");
        assert_eq!(joined[0]["profile"], json!({"id": 20, "user_id": 1}));
    }

    #[test]
    fn test_many_to_one_missing_match_is_null() {
        let source = tuples(json!([{"id": 5, "user_id": 99}]));
        let target = tuples(json!([{"id": 1, "name": "Jane"}]));
        let joined = join_many_to_one(&source, &target, "user_id", "id", "user");
        assert_eq!(joined[0]["user"], Value::Null);
    }

    #[test]
    fn test_many_to_one_attaches_single_match() {
        let source = tuples(json!([{"id": 5, "user_id": 1}]));
        let target = tuples(json!([{"id": 1, "name": "Jane"}]));
        let joined = join_many_to_one(&source, &target, "user_id", "id", "user");
        assert_eq!(joined[0]["user"], json!({"id": 1, "name": "Jane"}));
    }

    #[test]
    fn test_many_to_many_reachability() {
        let source = tuples(json!([{"id": 1}, {"id": 2}]));
        let rows = tuples(json!([
            {"user_id": 1, "group_id": 10},
            {"user_id": 1, "group_id": 11},
            {"user_id": 2, "group_id": 11}
        ]));
        let target = tuples(json!([
            {"id": 10, "name": "admins"},
            {"id": 11, "name": "testers"}
        ]));
        let joined = join_many_to_many(
            &source, &rows, &target, "id", "user_id", "group_id", "id", "groups",
        );
        assert_eq!(
            joined[0]["groups"],
            json!([{"id": 10, "name": "admins"}, {"id": 11, "name": "testers"}])
        );
        assert_eq!(joined[1]["groups"], json!([{"id": 11, "name": "testers"}]));
    }

    #[test]
    fn test_number_and_string_keys_stay_distinct() {
        let source = tuples(json!([{"id": 1}]));
        let target = tuples(json!([{"id": 30, "user_id": "1"}]));
        let joined = join_one_to_many(&source, &target, "id", "user_id", "posts");
        assert_eq!(joined[0]["posts"], json!([]));
    }

    /// Request handler that counts invocations, for proving the missing-view
    /// precondition fires before any I/O.
    struct CountingHandler {
        calls: AtomicUsize,
        body: Value,
    }

    #[async_trait::async_trait]
    impl RequestHandler for CountingHandler {
        async fn call(&self, _dataset: &Dataset) -> anyhow::Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse::new(200, self.body.to_string()))
        }
    }

    fn relation(name: &str, handler: Arc<CountingHandler>) -> Relation {
        Relation::new(
            name,
            Dataset::new("http://localhost")
                .with_base_path(name)
                .with_request_handler(handler)
                .with_response_handler(Arc::new(JsonResponseHandler)),
        )
    }

    struct PassthroughView;

    #[async_trait::async_trait]
    impl crate::model::RelationView for PassthroughView {
        async fn call(&self, _source: &[Tuple], target: Relation) -> crate::error::Result<Relation> {
            Ok(target)
        }
    }

    #[tokio::test]
    async fn test_missing_view_fails_before_any_request() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            body: json!([]),
        });
        let users = relation("users", handler.clone());
        let posts = relation("posts", handler.clone());
        let assoc = Association::OneToMany(AssociationDef::new("posts"));

        let err = combine(&users, &tuples(json!([{"id": 1}])), &assoc, &posts)
            .await
            .unwrap_err();
        match err {
            Error::MissingAssociationView { name } => assert_eq!(name, "posts"),
            other => panic!("expected missing view error, got {other}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_combine_calls_view_once_then_joins() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            body: json!([
                {"id": 10, "user_id": 1},
                {"id": 12, "user_id": 2}
            ]),
        });
        let users = relation("users", Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            body: json!([]),
        }));
        let posts = relation("posts", handler.clone());
        let assoc = Association::OneToMany(
            AssociationDef::new("posts").with_view(Arc::new(PassthroughView)),
        );

        let joined = combine(&users, &tuples(json!([{"id": 1}, {"id": 2}])), &assoc, &posts)
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(joined[0]["posts"], json!([{"id": 10, "user_id": 1}]));
        assert_eq!(joined[1]["posts"], json!([{"id": 12, "user_id": 2}]));
    }

    #[tokio::test]
    async fn test_many_to_many_combines_through_join_table() {
        let counting = |body: Value| {
            Arc::new(CountingHandler {
                calls: AtomicUsize::new(0),
                body,
            })
        };
        let users = relation("users", counting(json!([])));
        let groups = relation(
            "groups",
            counting(json!([
                {"id": 10, "name": "admins"},
                {"id": 11, "name": "testers"}
            ])),
        );
        let memberships = relation(
            "memberships",
            counting(json!([
                {"user_id": 1, "group_id": 10},
                {"user_id": 2, "group_id": 10},
                {"user_id": 2, "group_id": 11}
            ])),
        );
        let assoc = Association::ManyToMany(
            ManyToManyDef::new("groups")
                .with_view(Arc::new(PassthroughView))
                .with_through(memberships),
        );

        let joined = combine(&users, &tuples(json!([{"id": 1}, {"id": 2}])), &assoc, &groups)
            .await
            .unwrap();
        assert_eq!(joined[0]["groups"], json!([{"id": 10, "name": "admins"}]));
        assert_eq!(
            joined[1]["groups"],
            json!([{"id": 10, "name": "admins"}, {"id": 11, "name": "testers"}])
        );
    }

    #[tokio::test]
    async fn test_many_to_many_requires_through_relation() {
        let users = relation("users", Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            body: json!([]),
        }));
        let groups = relation("groups", Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            body: json!([]),
        }));
        let assoc = Association::ManyToMany(
            ManyToManyDef::new("groups").with_view(Arc::new(PassthroughView)),
        );
        let err = combine(&users, &[], &assoc, &groups).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
