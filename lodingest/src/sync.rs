//! Dataset synchronizer: the upsert protocol for one identifier.
//!
//! One run walks `CheckExisting → DeleteExisting → Extract →
//! ResolveAndAttachParties → Commit`. Commit is the only mutating step on
//! the happy path, performed as one bulk insert, so a failure anywhere
//! leaves either the old statement set (before delete) or a clean slate
//! that the retried run repopulates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lodgraph::statement::Term;
use lodgraph::store::{GraphStore, TermPattern, TriplePattern};
use lodgraph::vocab;

use crate::catalog::CatalogClient;
use crate::errors::{IngestError, Result};
use crate::processors::{self, Extraction, PartyRole};
use crate::resolver::IdentityResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    CheckExisting,
    DeleteExisting,
    Extract,
    ResolveParties,
    Commit,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStage::CheckExisting => "check-existing",
            SyncStage::DeleteExisting => "delete-existing",
            SyncStage::Extract => "extract",
            SyncStage::ResolveParties => "resolve-parties",
            SyncStage::Commit => "commit",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub pid: String,
    /// True when an earlier statement set was deleted first.
    pub replaced: bool,
    pub statements: usize,
}

pub struct DatasetSynchronizer {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn GraphStore>,
}

impl DatasetSynchronizer {
    pub fn new(catalog: Arc<dyn CatalogClient>, store: Arc<dyn GraphStore>) -> Self {
        Self { catalog, store }
    }

    /// Runs the full upsert for one dataset identifier.
    pub async fn sync(&self, pid: &str) -> Result<SyncOutcome> {
        let dataset = Term::iri(vocab::dataset_uri(pid));

        let exists = self
            .store
            .ask(&[TriplePattern::new(
                TermPattern::term(dataset.clone()),
                TermPattern::var("p"),
                TermPattern::var("o"),
            )])
            .await
            .map_err(|e| staged(pid, SyncStage::CheckExisting, e.into()))?;

        if exists {
            log::debug!("{pid}: deleting existing statement set before re-insert");
            self.delete_existing(&dataset)
                .await
                .map_err(|e| staged(pid, SyncStage::DeleteExisting, e))?;
        }

        let mut extraction = self
            .extract(pid)
            .await
            .map_err(|e| staged(pid, SyncStage::Extract, e))?;

        self.resolve_and_attach(&mut extraction)
            .await
            .map_err(|e| staged(pid, SyncStage::ResolveParties, e))?;

        let statements = extraction.buffer.distinct();
        self.store
            .insert(&statements)
            .await
            .map_err(|e| staged(pid, SyncStage::Commit, e.into()))?;

        log::info!(
            "synchronized {pid}: {} statements ({})",
            statements.len(),
            if exists { "replaced" } else { "new" }
        );
        Ok(SyncOutcome {
            pid: pid.to_string(),
            replaced: exists,
            statements: statements.len(),
        })
    }

    async fn extract(&self, pid: &str) -> Result<Extraction> {
        let sysmeta = self.catalog.system_metadata(pid).await?;
        let document = self.catalog.science_metadata(pid).await?;
        let parts = self.catalog.package_members(pid).await?;
        processors::process(&sysmeta, &document, &parts)
    }

    /// Removes the dataset's statement set as one logical unit. Anonymous
    /// nodes are located by pattern queries anchored at the dataset URI
    /// and scrubbed deepest-first: part identifier/checksum nodes (two
    /// hops), part subtrees, the nodes below spatial coverage, the
    /// dataset's own anonymous children (one hop), its attribute triples,
    /// and role edges pointing at it. Every step is a pattern delete, so
    /// running against an already-clean graph is a no-op.
    async fn delete_existing(&self, dataset: &Term) -> Result<()> {
        let ds = || TermPattern::term(dataset.clone());
        let node_triples = || {
            TriplePattern::new(
                TermPattern::var("n"),
                TermPattern::var("p"),
                TermPattern::var("o"),
            )
        };

        // anonymous nodes two hops down: part identifier/checksum nodes
        for link in [vocab::schema("identifier"), vocab::spdx("checksum")] {
            let pattern = [
                TriplePattern::new(
                    ds(),
                    TermPattern::iri(vocab::schema("distribution")),
                    TermPattern::var("part"),
                ),
                TriplePattern::new(
                    TermPattern::var("part"),
                    TermPattern::iri(link),
                    TermPattern::var("n"),
                ),
                node_triples(),
            ];
            self.store.delete(&pattern[2..], &pattern).await?;
        }

        // the nodes below spatial coverage (geo shapes, CRS annotations)
        let below_place = [
            TriplePattern::new(
                ds(),
                TermPattern::iri(vocab::schema("spatialCoverage")),
                TermPattern::var("place"),
            ),
            TriplePattern::new(
                TermPattern::var("place"),
                TermPattern::var("link"),
                TermPattern::var("n"),
            ),
            node_triples(),
        ];
        self.store.delete(&below_place[2..], &below_place).await?;

        // part subtrees, distribution edges included
        self.store
            .delete_where(&[
                TriplePattern::new(
                    ds(),
                    TermPattern::iri(vocab::schema("distribution")),
                    TermPattern::var("part"),
                ),
                TriplePattern::new(
                    TermPattern::var("part"),
                    TermPattern::var("p"),
                    TermPattern::var("o"),
                ),
            ])
            .await?;

        // the dataset's own anonymous children, one hop through the known
        // links (a wildcard hop would reach named neighbors such as the
        // revision predecessor)
        for link in [
            vocab::schema("identifier"),
            vocab::spdx("checksum"),
            vocab::schema("spatialCoverage"),
        ] {
            let pattern = [
                TriplePattern::new(ds(), TermPattern::iri(link), TermPattern::var("n")),
                node_triples(),
            ];
            self.store.delete(&pattern[1..], &pattern).await?;
        }

        // the dataset's own attribute triples
        self.store
            .delete_where(&[TriplePattern::new(
                ds(),
                TermPattern::var("p"),
                TermPattern::var("o"),
            )])
            .await?;

        // role edges pointing at the dataset
        for role in [PartyRole::Creator, PartyRole::Contact] {
            self.store
                .delete_where(&[TriplePattern::new(
                    TermPattern::var("party"),
                    TermPattern::term(role.predicate()),
                    ds(),
                )])
                .await?;
        }

        Ok(())
    }

    /// Resolves or mints every staged party and appends its statements to
    /// the buffer. Organizations go first: a person's affiliation edge
    /// needs the organization URI already settled.
    async fn resolve_and_attach(&self, extraction: &mut Extraction) -> Result<()> {
        let resolver = IdentityResolver::new(self.store.as_ref());
        let dataset = extraction.dataset.clone();
        let mut org_uris: HashMap<String, Term> = HashMap::new();

        let organizations = std::mem::take(&mut extraction.organizations);
        for org in &organizations {
            let resolved = resolver
                .resolve_organization(&org.name, &extraction.buffer)
                .await?;
            let uri = match resolved {
                Some(existing) => existing,
                None => {
                    let minted = Term::iri(vocab::mint_party_uri());
                    extraction.add(
                        minted.clone(),
                        Term::iri(vocab::rdf("type")),
                        Term::iri(vocab::schema("Organization")),
                    );
                    extraction.add(
                        minted.clone(),
                        Term::iri(vocab::schema("name")),
                        Term::literal(&org.name),
                    );
                    if let Some(email) = &org.email {
                        extraction.add(
                            minted.clone(),
                            Term::iri(vocab::schema("email")),
                            Term::literal(email.to_lowercase()),
                        );
                    }
                    if let Some(address) = &org.address {
                        extraction.add(
                            minted.clone(),
                            Term::iri(vocab::schema("address")),
                            Term::literal(address),
                        );
                    }
                    minted
                }
            };
            if let Some(role) = org.role {
                extraction.add(uri.clone(), role.predicate(), dataset.clone());
            }
            org_uris.insert(org.name.clone(), uri);
        }

        let people = std::mem::take(&mut extraction.people);
        for person in &people {
            let resolved = resolver
                .resolve_person(person, &extraction.buffer, &dataset)
                .await?;
            let uri = match resolved {
                Some(existing) => existing,
                None => {
                    let minted = Term::iri(vocab::mint_party_uri());
                    extraction.add(
                        minted.clone(),
                        Term::iri(vocab::rdf("type")),
                        Term::iri(vocab::schema("Person")),
                    );
                    let fields = [
                        ("name", &person.full_name),
                        ("givenName", &person.given_name),
                        ("familyName", &person.family_name),
                        ("honorificPrefix", &person.salutation),
                        ("address", &person.address),
                    ];
                    for (local, value) in fields {
                        if let Some(value) = value {
                            extraction.add(
                                minted.clone(),
                                Term::iri(vocab::schema(local)),
                                Term::literal(value),
                            );
                        }
                    }
                    if let Some(email) = &person.email {
                        extraction.add(
                            minted.clone(),
                            Term::iri(vocab::schema("email")),
                            Term::literal(email.to_lowercase()),
                        );
                    }
                    if let Some(affiliation) = &person.affiliation {
                        if let Some(org_uri) = org_uris.get(affiliation) {
                            extraction.add(
                                minted.clone(),
                                Term::iri(vocab::schema("affiliation")),
                                org_uri.clone(),
                            );
                        }
                    }
                    minted
                }
            };
            if let Some(role) = person.role {
                extraction.add(uri.clone(), role.predicate(), dataset.clone());
            }
        }

        Ok(())
    }
}

fn staged(pid: &str, stage: SyncStage, source: IngestError) -> IngestError {
    IngestError::Sync {
        pid: pid.to_string(),
        stage,
        source: Box::new(source),
    }
}
