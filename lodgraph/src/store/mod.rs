//! The graph store contract and its backends.
//!
//! The core depends on a narrow, pattern-based interface: a read query
//! returning variable bindings, an existence probe, a bulk insert that is
//! atomic from the caller's perspective, and a pattern delete that is a
//! no-op against an already-empty match set. Backends compile patterns to
//! their own wire format; callers never hand-write query text.

mod memory;
mod sparql;

use std::collections::HashMap;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sparql::{SparqlStore, SparqlStoreConfig};

use crate::error::Result;
use crate::statement::{Statement, Term};

/// One position of a triple pattern: a fixed term or a named variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermPattern {
    Term(Term),
    Var(String),
}

impl TermPattern {
    pub fn var(name: impl Into<String>) -> Self {
        TermPattern::Var(name.into())
    }

    pub fn iri(value: impl Into<String>) -> Self {
        TermPattern::Term(Term::Iri(value.into()))
    }

    pub fn term(term: Term) -> Self {
        TermPattern::Term(term)
    }
}

/// A subject-predicate-object pattern; a conjunction of these forms a
/// basic graph pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(subject: TermPattern, predicate: TermPattern, object: TermPattern) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Variable names in positional order, first occurrence only.
    fn variables(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|p| match p {
                TermPattern::Var(name) => Some(name.as_str()),
                TermPattern::Term(_) => None,
            })
    }

    /// The concrete statement this pattern denotes under the given
    /// bindings, if every variable is bound.
    fn instantiate(&self, row: &Bindings) -> Option<Statement> {
        let resolve = |p: &TermPattern| match p {
            TermPattern::Term(term) => Some(term.clone()),
            TermPattern::Var(name) => row.get(name).cloned(),
        };
        Some(Statement::new(
            resolve(&self.subject)?,
            resolve(&self.predicate)?,
            resolve(&self.object)?,
        ))
    }
}

/// One solution row: variable name to bound term.
pub type Bindings = HashMap<String, Term>;

/// Read/write access to an RDF store.
///
/// Implementations own their retry and timeout policy; callers treat every
/// operation as a synchronous, fallible unit.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Verifies the store is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Evaluates a basic graph pattern and returns all solution rows.
    async fn select(&self, patterns: &[TriplePattern]) -> Result<Vec<Bindings>>;

    /// True iff the pattern has at least one solution.
    async fn ask(&self, patterns: &[TriplePattern]) -> Result<bool> {
        Ok(!self.select(patterns).await?.is_empty())
    }

    /// Bulk-inserts a statement set. Either all statements become visible
    /// or none do.
    async fn insert(&self, statements: &[Statement]) -> Result<()>;

    /// Deletes the template's instantiations for every solution of the
    /// pattern: `DELETE { template } WHERE { pattern }` in SPARQL terms.
    /// The pattern locates anonymous nodes; the template controls which
    /// triples go, so link triples can anchor several passes. Idempotent:
    /// deleting against an empty match set succeeds.
    async fn delete(&self, template: &[TriplePattern], pattern: &[TriplePattern]) -> Result<()>;

    /// `DELETE WHERE`: deletes every triple the pattern itself matches.
    async fn delete_where(&self, patterns: &[TriplePattern]) -> Result<()> {
        self.delete(patterns, patterns).await
    }
}
