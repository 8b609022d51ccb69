//! In-memory graph store with a small basic-graph-pattern evaluator.
//!
//! The test double for everything above the store contract, and a viable
//! backend for single-process deployments.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{Bindings, GraphStore, TermPattern, TriplePattern};
use crate::error::Result;
use crate::statement::{Statement, Term};

#[derive(Default)]
pub struct MemoryStore {
    statements: RwLock<Vec<Statement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the committed statement set, for assertions in tests.
    pub fn snapshot(&self) -> Vec<Statement> {
        self.statements.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.statements.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.read().unwrap().is_empty()
    }
}

/// Tries to extend `row` so `pattern` matches `term`; fixed terms must be
/// equal, unbound variables bind, bound variables must agree.
fn unify(pattern: &TermPattern, term: &Term, row: &mut Bindings) -> bool {
    match pattern {
        TermPattern::Term(expected) => expected == term,
        TermPattern::Var(name) => match row.get(name) {
            Some(bound) => bound == term,
            None => {
                row.insert(name.clone(), term.clone());
                true
            }
        },
    }
}

fn matches_with(pattern: &TriplePattern, statement: &Statement, row: &Bindings) -> Option<Bindings> {
    let mut candidate = row.clone();
    if unify(&pattern.subject, &statement.subject, &mut candidate)
        && unify(&pattern.predicate, &statement.predicate, &mut candidate)
        && unify(&pattern.object, &statement.object, &mut candidate)
    {
        Some(candidate)
    } else {
        None
    }
}

fn solve(statements: &[Statement], patterns: &[TriplePattern]) -> Vec<Bindings> {
    let mut rows = vec![Bindings::new()];
    for pattern in patterns {
        let mut next = Vec::new();
        for row in &rows {
            for statement in statements {
                if let Some(extended) = matches_with(pattern, statement, row) {
                    next.push(extended);
                }
            }
        }
        rows = next;
        if rows.is_empty() {
            break;
        }
    }
    rows
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn select(&self, patterns: &[TriplePattern]) -> Result<Vec<Bindings>> {
        let statements = self.statements.read().unwrap();
        let mut rows = solve(&statements, patterns);
        // SELECT DISTINCT semantics
        let mut seen: Vec<Bindings> = Vec::new();
        rows.retain(|row| {
            if seen.iter().any(|s| s == row) {
                false
            } else {
                seen.push(row.clone());
                true
            }
        });
        Ok(rows)
    }

    async fn insert(&self, new: &[Statement]) -> Result<()> {
        let mut statements = self.statements.write().unwrap();
        for statement in new {
            if !statements.contains(statement) {
                statements.push(statement.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, template: &[TriplePattern], pattern: &[TriplePattern]) -> Result<()> {
        let mut statements = self.statements.write().unwrap();
        let mut doomed = Vec::new();
        for row in solve(&statements, pattern) {
            for t in template {
                if let Some(statement) = t.instantiate(&row) {
                    doomed.push(statement);
                }
            }
        }
        statements.retain(|statement| !doomed.contains(statement));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(v: &str) -> Term {
        Term::iri(format!("http://example.org/{v}"))
    }

    fn st(s: &str, p: &str, o: Term) -> Statement {
        Statement::new(iri(s), iri(p), o)
    }

    #[tokio::test]
    async fn insert_has_set_semantics() {
        let store = MemoryStore::new();
        let statement = st("s", "p", Term::literal("v"));
        store
            .insert(&[statement.clone(), statement.clone()])
            .await
            .unwrap();
        store.insert(&[statement]).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn join_respects_shared_variables() {
        let store = MemoryStore::new();
        store
            .insert(&[
                st("a", "type", iri("Person")),
                st("a", "name", Term::literal("Alpha")),
                st("b", "type", iri("Person")),
                st("b", "name", Term::literal("Beta")),
            ])
            .await
            .unwrap();

        let rows = store
            .select(&[
                TriplePattern::new(
                    TermPattern::var("p"),
                    TermPattern::term(iri("type")),
                    TermPattern::term(iri("Person")),
                ),
                TriplePattern::new(
                    TermPattern::var("p"),
                    TermPattern::term(iri("name")),
                    TermPattern::term(Term::literal("Alpha")),
                ),
            ])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["p"], iri("a"));
    }

    #[tokio::test]
    async fn ask_defaults_to_select_probe() {
        let store = MemoryStore::new();
        store.insert(&[st("s", "p", Term::literal("v"))]).await.unwrap();
        let present = store
            .ask(&[TriplePattern::new(
                TermPattern::term(iri("s")),
                TermPattern::var("p"),
                TermPattern::var("o"),
            )])
            .await
            .unwrap();
        assert!(present);
    }

    #[tokio::test]
    async fn delete_where_is_idempotent() {
        let store = MemoryStore::new();
        store
            .insert(&[st("s", "p", Term::literal("v")), st("t", "p", Term::literal("w"))])
            .await
            .unwrap();
        let patterns = vec![TriplePattern::new(
            TermPattern::term(iri("s")),
            TermPattern::var("p"),
            TermPattern::var("o"),
        )];
        store.delete_where(&patterns).await.unwrap();
        assert_eq!(store.len(), 1);
        // deleting again against the now-empty match set is a no-op
        store.delete_where(&patterns).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_template_spares_anchor_triples() {
        let store = MemoryStore::new();
        let node = Term::Blank("n1".to_string());
        store
            .insert(&[
                Statement::new(iri("s"), iri("link"), node.clone()),
                Statement::new(node.clone(), iri("p"), Term::literal("v")),
                Statement::new(iri("s"), iri("other"), Term::literal("keep")),
            ])
            .await
            .unwrap();

        let pattern = vec![
            TriplePattern::new(
                TermPattern::term(iri("s")),
                TermPattern::term(iri("link")),
                TermPattern::var("n"),
            ),
            TriplePattern::new(
                TermPattern::var("n"),
                TermPattern::var("p"),
                TermPattern::var("o"),
            ),
        ];
        // template deletes only the located node's triples
        store.delete(&pattern[1..], &pattern).await.unwrap();

        let remaining = store.snapshot();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&Statement::new(iri("s"), iri("link"), node)));

        // the anchor itself goes with the delete-where form
        store.delete_where(&pattern[..1]).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
