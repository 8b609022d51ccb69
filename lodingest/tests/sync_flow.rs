//! End-to-end synchronizer scenarios against the in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use lodgraph::statement::{Statement, Term};
use lodgraph::store::{GraphStore, MemoryStore};
use lodgraph::vocab;
use lodingest::catalog::{CatalogClient, SearchPage, SearchQuery};
use lodingest::errors::Result;
use lodingest::sync::DatasetSynchronizer;
use lodingest::sysmeta::{AccessRule, Checksum, ChecksumAlgorithm, SystemMetadata};

struct MockCatalog {
    sysmeta: HashMap<String, SystemMetadata>,
    documents: Mutex<HashMap<String, String>>,
    members: HashMap<String, Vec<SystemMetadata>>,
}

impl MockCatalog {
    fn new() -> Self {
        Self {
            sysmeta: HashMap::new(),
            documents: Mutex::new(HashMap::new()),
            members: HashMap::new(),
        }
    }

    fn with_dataset(mut self, meta: SystemMetadata, document: &str) -> Self {
        let pid = meta.identifier.clone();
        self.documents
            .lock()
            .unwrap()
            .insert(pid.clone(), document.to_string());
        self.sysmeta.insert(pid, meta);
        self
    }

    fn with_members(mut self, pid: &str, members: Vec<SystemMetadata>) -> Self {
        self.members.insert(pid.to_string(), members);
        self
    }

    fn set_document(&self, pid: &str, document: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(pid.to_string(), document.to_string());
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchPage> {
        Ok(SearchPage::default())
    }

    async fn system_metadata(&self, pid: &str) -> Result<SystemMetadata> {
        Ok(self.sysmeta.get(pid).cloned().expect("sysmeta fixture"))
    }

    async fn science_metadata(&self, pid: &str) -> Result<String> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(pid)
            .cloned()
            .expect("document fixture"))
    }

    async fn package_members(&self, pid: &str) -> Result<Vec<SystemMetadata>> {
        Ok(self.members.get(pid).cloned().unwrap_or_default())
    }
}

fn sample_sysmeta(pid: &str, format_id: &str) -> SystemMetadata {
    SystemMetadata {
        identifier: pid.to_string(),
        series_id: None,
        format_id: format_id.to_string(),
        size: 1024,
        checksum: Checksum {
            value: "cafebabe".to_string(),
            algorithm: ChecksumAlgorithm::Sha256,
        },
        obsoletes: None,
        obsoleted_by: None,
        date_uploaded: Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
        date_modified: Some(Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap()),
        file_name: None,
        access_rules: vec![AccessRule {
            subjects: vec!["public".to_string()],
            permissions: vec!["read".to_string()],
        }],
    }
}

const EML_FORMAT: &str = "eml://ecoinformatics.org/eml-2.1.1";

fn eml_document(abstract_text: &str, email: &str) -> String {
    format!(
        r#"<eml:eml xmlns:eml="eml://ecoinformatics.org/eml-2.1.1">
  <dataset>
    <title>Kelp Forest Survey</title>
    <creator>
      <individualName><givenName>Ada</givenName><surName>Alpha</surName></individualName>
      <organizationName>Oceanic Institute</organizationName>
      <electronicMailAddress>{email}</electronicMailAddress>
    </creator>
    <abstract><para>{abstract_text}</para></abstract>
    <keywordSet><keyword>kelp</keyword><keyword>survey</keyword></keywordSet>
    <coverage>
      <geographicCoverage>
        <boundingCoordinates>
          <westBoundingCoordinate>-122.5</westBoundingCoordinate>
          <eastBoundingCoordinate>-122.1</eastBoundingCoordinate>
          <northBoundingCoordinate>37.9</northBoundingCoordinate>
          <southBoundingCoordinate>37.4</southBoundingCoordinate>
        </boundingCoordinates>
      </geographicCoverage>
    </coverage>
  </dataset>
</eml:eml>"#
    )
}

fn person_subjects(store: &MemoryStore) -> HashSet<Term> {
    store
        .snapshot()
        .into_iter()
        .filter(|st| {
            st.predicate == Term::iri(vocab::rdf("type"))
                && st.object == Term::iri(vocab::schema("Person"))
        })
        .map(|st| st.subject)
        .collect()
}

fn non_blank_statements(store: &MemoryStore) -> HashSet<Statement> {
    store
        .snapshot()
        .into_iter()
        .filter(|st| !st.subject.is_blank() && !st.object.is_blank())
        .collect()
}

#[tokio::test]
async fn resynchronization_is_idempotent() {
    let pid = "doi:10.5063/KELP";
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(sample_sysmeta(pid, EML_FORMAT), &eml_document("Original.", "a@example.org")),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);

    let first = synchronizer.sync(pid).await.unwrap();
    assert!(!first.replaced);
    let count_after_first = store.len();
    let grounded_after_first = non_blank_statements(&store);

    let second = synchronizer.sync(pid).await.unwrap();
    assert!(second.replaced);
    assert_eq!(store.len(), count_after_first);
    assert_eq!(non_blank_statements(&store), grounded_after_first);
}

#[tokio::test]
async fn upsert_replaces_changed_fields() {
    let pid = "doi:10.5063/KELP";
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(sample_sysmeta(pid, EML_FORMAT), &eml_document("Original.", "a@example.org")),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer =
        DatasetSynchronizer::new(Arc::clone(&catalog) as Arc<dyn CatalogClient>, Arc::clone(&store) as Arc<dyn GraphStore>);

    synchronizer.sync(pid).await.unwrap();
    catalog.set_document(pid, &eml_document("Updated.", "a@example.org"));
    synchronizer.sync(pid).await.unwrap();

    let dataset = Term::iri(vocab::dataset_uri(pid));
    let description = Term::iri(vocab::schema("description"));
    let descriptions: Vec<Statement> = store
        .snapshot()
        .into_iter()
        .filter(|st| st.subject == dataset && st.predicate == description)
        .collect();
    assert_eq!(descriptions.len(), 1);
    assert_eq!(descriptions[0].object, Term::literal("Updated."));
}

#[tokio::test]
async fn identity_is_reused_across_runs() {
    let doc = eml_document("Shared creator.", "a@example.org");
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(sample_sysmeta("pid-one", EML_FORMAT), &doc)
            .with_dataset(sample_sysmeta("pid-two", EML_FORMAT), &doc),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);

    synchronizer.sync("pid-one").await.unwrap();
    synchronizer.sync("pid-two").await.unwrap();

    let people = person_subjects(&store);
    assert_eq!(people.len(), 1, "same person must not be minted twice");

    let person = people.into_iter().next().unwrap();
    let creator_of: HashSet<Term> = store
        .snapshot()
        .into_iter()
        .filter(|st| {
            st.subject == person && st.predicate == Term::iri(vocab::lod("isCreatorOf"))
        })
        .map(|st| st.object)
        .collect();
    assert!(creator_of.contains(&Term::iri(vocab::dataset_uri("pid-one"))));
    assert!(creator_of.contains(&Term::iri(vocab::dataset_uri("pid-two"))));
}

#[tokio::test]
async fn different_emails_mint_distinct_people() {
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(
                sample_sysmeta("pid-one", EML_FORMAT),
                &eml_document("First.", "a@example.org"),
            )
            .with_dataset(
                sample_sysmeta("pid-two", EML_FORMAT),
                &eml_document("Second.", "b@example.org"),
            ),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);

    synchronizer.sync("pid-one").await.unwrap();
    synchronizer.sync("pid-two").await.unwrap();

    assert_eq!(person_subjects(&store).len(), 2);
}

#[tokio::test]
async fn ambiguous_identity_mints_fresh_instead_of_guessing() {
    let pid = "doi:10.5063/KELP";
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(sample_sysmeta(pid, EML_FORMAT), &eml_document("Text.", "a@example.org")),
    );
    let store = Arc::new(MemoryStore::new());

    // pre-seeded inconsistent fixture: two persons already match the rule
    for uri in ["urn:uuid:seed-1", "urn:uuid:seed-2"] {
        let person = Term::iri(uri);
        store
            .insert(&[
                Statement::new(
                    person.clone(),
                    Term::iri(vocab::rdf("type")),
                    Term::iri(vocab::schema("Person")),
                ),
                Statement::new(
                    person.clone(),
                    Term::iri(vocab::schema("familyName")),
                    Term::literal("Alpha"),
                ),
                Statement::new(
                    person,
                    Term::iri(vocab::schema("email")),
                    Term::literal("a@example.org"),
                ),
            ])
            .await
            .unwrap();
    }

    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);
    synchronizer.sync(pid).await.unwrap();

    assert_eq!(person_subjects(&store).len(), 3, "resolution must mint, not guess");
}

#[tokio::test]
async fn self_and_package_descriptor_members_are_not_parts() {
    let pid = "doi:10.5063/KELP";
    let own = sample_sysmeta(pid, EML_FORMAT);
    let mut resource_map = sample_sysmeta("resource-map-1", "http://www.openarchives.org/ore/terms");
    resource_map.size = 10;
    let mut data_file = sample_sysmeta("file-1", "text/csv");
    data_file.size = 2000;
    data_file.file_name = Some("observations.csv".to_string());

    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(own.clone(), &eml_document("With parts.", "a@example.org"))
            .with_members(pid, vec![own, resource_map, data_file]),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);
    synchronizer.sync(pid).await.unwrap();

    let dataset = Term::iri(vocab::dataset_uri(pid));
    let distributions: Vec<Term> = store
        .snapshot()
        .into_iter()
        .filter(|st| {
            st.subject == dataset && st.predicate == Term::iri(vocab::schema("distribution"))
        })
        .map(|st| st.object)
        .collect();
    assert_eq!(distributions, vec![Term::iri(vocab::object_uri("file-1"))]);

    // total size = own 1024 + emitted part 2000; excluded members add nothing
    let size: Vec<Term> = store
        .snapshot()
        .into_iter()
        .filter(|st| st.subject == dataset && st.predicate == Term::iri(vocab::schema("size")))
        .map(|st| st.object)
        .collect();
    assert_eq!(
        size,
        vec![Term::typed_literal("3024", vocab::xsd("long"))]
    );
}

#[tokio::test]
async fn unsupported_format_is_a_permanent_failure() {
    let pid = "pid-unknown";
    let catalog = Arc::new(
        MockCatalog::new()
            .with_dataset(sample_sysmeta(pid, "application/x-unknown"), "<doc/>"),
    );
    let store = Arc::new(MemoryStore::new());
    let synchronizer = DatasetSynchronizer::new(catalog, Arc::clone(&store) as Arc<dyn GraphStore>);

    let err = synchronizer.sync(pid).await.unwrap_err();
    assert!(err.is_permanent());
    assert!(err.to_string().contains(pid));
    assert!(err.to_string().contains("extract"));
    assert!(store.is_empty(), "no partial state may be committed");
}
