//! Identity resolution for people and organizations.
//!
//! A candidate either matches exactly one known entity (its URI is reused)
//! or it does not (the caller mints a fresh URI). Zero and multiple
//! matches are both "not found": an ambiguous match is never guessed away.
//! The committed store is consulted first, then the in-flight buffer, so
//! parties introduced earlier in the same transaction are reused.

use std::collections::HashSet;

use lodgraph::statement::{GraphBuffer, Term};
use lodgraph::store::{GraphStore, TermPattern, TriplePattern};
use lodgraph::vocab;

use crate::errors::Result;
use crate::processors::{PartyRole, PersonRecord};

pub struct IdentityResolver<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    /// Resolves a person candidate to an existing URI.
    ///
    /// Primary rule: exactly one Person with this family name and this
    /// lowercased mailbox. Secondary rule (only without an email): if the
    /// buffer records exactly one revision-of edge for the dataset,
    /// exactly one Person with the same family name who is a creator of
    /// the predecessor.
    pub async fn resolve_person(
        &self,
        candidate: &PersonRecord,
        buffer: &GraphBuffer,
        dataset: &Term,
    ) -> Result<Option<Term>> {
        if let (Some(family), Some(email)) = (&candidate.family_name, &candidate.email) {
            let patterns = person_by_email(family, &email.to_lowercase());
            return Ok(exactly_one(self.query(&patterns, buffer).await?));
        }

        if let Some(family) = &candidate.family_name {
            let revisions = buffer.objects_of(dataset, &Term::iri(vocab::prov("wasRevisionOf")));
            if revisions.len() == 1 {
                let patterns = person_by_predecessor(family, revisions[0]);
                return Ok(exactly_one(self.query(&patterns, buffer).await?));
            }
        }

        Ok(None)
    }

    /// Resolves an organization by exact label.
    pub async fn resolve_organization(
        &self,
        name: &str,
        buffer: &GraphBuffer,
    ) -> Result<Option<Term>> {
        let patterns = organization_by_name(name);
        Ok(exactly_one(self.query(&patterns, buffer).await?))
    }

    /// Candidate URIs matching the pattern: committed store first, the
    /// in-flight buffer as fallback.
    async fn query(&self, patterns: &[TriplePattern], buffer: &GraphBuffer) -> Result<Vec<Term>> {
        let rows = self.store.select(patterns).await?;
        let mut matches: Vec<Term> = rows
            .into_iter()
            .filter_map(|mut row| row.remove("party"))
            .collect();
        if matches.is_empty() {
            matches = match_buffer(buffer, patterns);
        }
        Ok(matches)
    }
}

fn person_by_email(family_name: &str, email: &str) -> Vec<TriplePattern> {
    vec![
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::rdf("type")),
            TermPattern::iri(vocab::schema("Person")),
        ),
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::schema("familyName")),
            TermPattern::term(Term::literal(family_name)),
        ),
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::schema("email")),
            TermPattern::term(Term::literal(email)),
        ),
    ]
}

fn person_by_predecessor(family_name: &str, predecessor: &Term) -> Vec<TriplePattern> {
    vec![
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::rdf("type")),
            TermPattern::iri(vocab::schema("Person")),
        ),
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::schema("familyName")),
            TermPattern::term(Term::literal(family_name)),
        ),
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::term(PartyRole::Creator.predicate()),
            TermPattern::term(predecessor.clone()),
        ),
    ]
}

fn organization_by_name(name: &str) -> Vec<TriplePattern> {
    vec![
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::rdf("type")),
            TermPattern::iri(vocab::schema("Organization")),
        ),
        TriplePattern::new(
            TermPattern::var("party"),
            TermPattern::iri(vocab::schema("name")),
            TermPattern::term(Term::literal(name)),
        ),
    ]
}

/// Evaluates subject-variable patterns against the transaction buffer by
/// intersecting per-pattern subject sets.
fn match_buffer(buffer: &GraphBuffer, patterns: &[TriplePattern]) -> Vec<Term> {
    let mut result: Option<Vec<Term>> = None;
    for pattern in patterns {
        let (TermPattern::Term(predicate), TermPattern::Term(object)) =
            (&pattern.predicate, &pattern.object)
        else {
            return Vec::new();
        };
        let subjects: Vec<Term> = buffer
            .matching(None, Some(predicate), Some(object))
            .map(|st| st.subject.clone())
            .collect();
        result = Some(match result {
            None => subjects,
            Some(previous) => previous
                .into_iter()
                .filter(|term| subjects.contains(term))
                .collect(),
        });
    }
    result.unwrap_or_default()
}

fn exactly_one(matches: Vec<Term>) -> Option<Term> {
    let distinct: HashSet<Term> = matches.into_iter().collect();
    if distinct.len() == 1 {
        distinct.into_iter().next()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodgraph::statement::Statement;
    use lodgraph::store::MemoryStore;

    fn person_statements(uri: &str, family: &str, email: &str) -> Vec<Statement> {
        let person = Term::iri(uri);
        vec![
            Statement::new(
                person.clone(),
                Term::iri(vocab::rdf("type")),
                Term::iri(vocab::schema("Person")),
            ),
            Statement::new(
                person.clone(),
                Term::iri(vocab::schema("familyName")),
                Term::literal(family),
            ),
            Statement::new(
                person,
                Term::iri(vocab::schema("email")),
                Term::literal(email),
            ),
        ]
    }

    fn candidate(family: &str, email: Option<&str>) -> PersonRecord {
        PersonRecord {
            family_name: Some(family.to_string()),
            email: email.map(str::to_string),
            ..PersonRecord::default()
        }
    }

    #[tokio::test]
    async fn single_match_is_reused() {
        let store = MemoryStore::new();
        store
            .insert(&person_statements("urn:uuid:p1", "Alpha", "a@example.org"))
            .await
            .unwrap();

        let resolver = IdentityResolver::new(&store);
        let resolved = resolver
            .resolve_person(
                &candidate("Alpha", Some("A@Example.org")),
                &GraphBuffer::new(),
                &Term::iri("https://lodmirror.org/datasets/x"),
            )
            .await
            .unwrap();
        assert_eq!(resolved, Some(Term::iri("urn:uuid:p1")));
    }

    #[tokio::test]
    async fn ambiguous_match_yields_none() {
        let store = MemoryStore::new();
        store
            .insert(&person_statements("urn:uuid:p1", "Alpha", "a@example.org"))
            .await
            .unwrap();
        store
            .insert(&person_statements("urn:uuid:p2", "Alpha", "a@example.org"))
            .await
            .unwrap();

        let resolver = IdentityResolver::new(&store);
        let resolved = resolver
            .resolve_person(
                &candidate("Alpha", Some("a@example.org")),
                &GraphBuffer::new(),
                &Term::iri("https://lodmirror.org/datasets/x"),
            )
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn buffer_is_consulted_when_store_is_empty() {
        let store = MemoryStore::new();
        let mut buffer = GraphBuffer::new();
        for st in person_statements("urn:uuid:p1", "Alpha", "a@example.org") {
            buffer.push(st);
        }

        let resolver = IdentityResolver::new(&store);
        let resolved = resolver
            .resolve_person(
                &candidate("Alpha", Some("a@example.org")),
                &buffer,
                &Term::iri("https://lodmirror.org/datasets/x"),
            )
            .await
            .unwrap();
        assert_eq!(resolved, Some(Term::iri("urn:uuid:p1")));
    }

    #[tokio::test]
    async fn predecessor_rule_requires_single_revision_edge() {
        let store = MemoryStore::new();
        let dataset = Term::iri("https://lodmirror.org/datasets/new");
        let predecessor = Term::iri("https://lodmirror.org/datasets/old");

        let mut statements = person_statements("urn:uuid:p1", "Alpha", "ignored@example.org");
        statements.push(Statement::new(
            Term::iri("urn:uuid:p1"),
            PartyRole::Creator.predicate(),
            predecessor.clone(),
        ));
        store.insert(&statements).await.unwrap();

        let mut buffer = GraphBuffer::new();
        buffer.add(
            dataset.clone(),
            Term::iri(vocab::prov("wasRevisionOf")),
            predecessor.clone(),
        );

        let resolver = IdentityResolver::new(&store);
        let resolved = resolver
            .resolve_person(&candidate("Alpha", None), &buffer, &dataset)
            .await
            .unwrap();
        assert_eq!(resolved, Some(Term::iri("urn:uuid:p1")));

        // a second revision edge makes the rule inapplicable
        buffer.add(
            dataset.clone(),
            Term::iri(vocab::prov("wasRevisionOf")),
            Term::iri("https://lodmirror.org/datasets/older"),
        );
        let resolved = resolver
            .resolve_person(&candidate("Alpha", None), &buffer, &dataset)
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn organization_matches_by_exact_label() {
        let store = MemoryStore::new();
        let org = Term::iri("urn:uuid:o1");
        store
            .insert(&[
                Statement::new(
                    org.clone(),
                    Term::iri(vocab::rdf("type")),
                    Term::iri(vocab::schema("Organization")),
                ),
                Statement::new(
                    org.clone(),
                    Term::iri(vocab::schema("name")),
                    Term::literal("Oceanic Institute"),
                ),
            ])
            .await
            .unwrap();

        let resolver = IdentityResolver::new(&store);
        let buffer = GraphBuffer::new();
        assert_eq!(
            resolver
                .resolve_organization("Oceanic Institute", &buffer)
                .await
                .unwrap(),
            Some(org)
        );
        assert_eq!(
            resolver
                .resolve_organization("Other Institute", &buffer)
                .await
                .unwrap(),
            None
        );
    }
}
