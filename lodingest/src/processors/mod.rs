//! Record processors: one extraction strategy per schema dialect.
//!
//! Dialects are dispatched by exact format-identifier match against a
//! static table; dialects with no semantic differences for the current
//! vocabulary share one strategy. Every dialect runs the shared base
//! emission (types, identifiers, timestamps, checksum, parts) around its
//! own tree-walking step.

mod base;
mod dcx;
mod eml;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use lodgraph::statement::{GraphBuffer, Term};
use lodgraph::vocab;

use crate::errors::{IngestError, Result};
use crate::sysmeta::SystemMetadata;
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Ecological Metadata Language, 2.0.0 through 2.2.0.
    Eml,
    /// Dublin Core extended documents.
    DublinCore,
}

static FORMAT_TABLE: Lazy<HashMap<&'static str, Dialect>> = Lazy::new(|| {
    HashMap::from([
        ("eml://ecoinformatics.org/eml-2.0.0", Dialect::Eml),
        ("eml://ecoinformatics.org/eml-2.0.1", Dialect::Eml),
        ("eml://ecoinformatics.org/eml-2.1.0", Dialect::Eml),
        ("eml://ecoinformatics.org/eml-2.1.1", Dialect::Eml),
        ("https://eml.ecoinformatics.org/eml-2.2.0", Dialect::Eml),
        (
            "http://ns.dataone.org/metadata/schema/onedcx/v1.0",
            Dialect::DublinCore,
        ),
    ])
});

impl Dialect {
    /// Looks up the dialect for a declared format identifier.
    pub fn for_format(format_id: &str) -> Option<Dialect> {
        FORMAT_TABLE.get(format_id).copied()
    }
}

/// Role a party plays for the dataset being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    Creator,
    Contact,
}

impl PartyRole {
    /// Predicate for the party-to-dataset edge.
    pub fn predicate(&self) -> Term {
        match self {
            PartyRole::Creator => Term::iri(vocab::lod("isCreatorOf")),
            PartyRole::Contact => Term::iri(vocab::lod("isContactOf")),
        }
    }
}

/// A person extracted from the science metadata, staged for identity
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct PersonRecord {
    pub full_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub salutation: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Name of the affiliated organization, if any; the organization
    /// itself is staged as its own record.
    pub affiliation: Option<String>,
    pub role: Option<PartyRole>,
}

/// An organization extracted from the science metadata.
#[derive(Debug, Clone)]
pub struct OrgRecord {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    /// `None` for organizations only referenced as affiliations.
    pub role: Option<PartyRole>,
}

/// The result of processing one record: the statement buffer plus party
/// candidates awaiting resolution.
#[derive(Debug)]
pub struct Extraction {
    pub dataset: Term,
    pub buffer: GraphBuffer,
    pub organizations: Vec<OrgRecord>,
    pub people: Vec<PersonRecord>,
}

impl Extraction {
    fn new(dataset_uri: String) -> Self {
        Self {
            dataset: Term::iri(dataset_uri),
            buffer: GraphBuffer::new(),
            organizations: Vec::new(),
            people: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, subject: Term, predicate: Term, object: Term) {
        self.buffer.add(subject, predicate, object);
    }

    /// Stages an affiliation organization unless one with the same name is
    /// already staged.
    pub(crate) fn ensure_org(&mut self, name: &str) {
        if !self.organizations.iter().any(|org| org.name == name) {
            self.organizations.push(OrgRecord {
                name: name.to_string(),
                email: None,
                address: None,
                role: None,
            });
        }
    }
}

/// Turns one record (system metadata, parsed science metadata, package
/// member descriptors) into a statement set and staged party candidates.
///
/// Re-invoking on the same inputs yields the same statement set under set
/// semantics; blank node labels differ but the shapes they anchor do not.
pub fn process(
    sysmeta: &SystemMetadata,
    science_metadata: &str,
    parts: &[SystemMetadata],
) -> Result<Extraction> {
    let dialect = Dialect::for_format(&sysmeta.format_id)
        .ok_or_else(|| IngestError::UnsupportedFormat(sysmeta.format_id.clone()))?;
    let document = Element::parse(science_metadata)?;

    let mut extraction = Extraction::new(vocab::dataset_uri(&sysmeta.identifier));
    base::emit_dataset(&mut extraction, sysmeta, parts)?;

    match dialect {
        Dialect::Eml => eml::extract(&document, &mut extraction)?,
        Dialect::DublinCore => dcx::extract(&document, &mut extraction)?,
    }

    base::emit_parts(&mut extraction, sysmeta, parts)?;
    base::finalize(&mut extraction, sysmeta);

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eml_versions_share_one_strategy() {
        for format in [
            "eml://ecoinformatics.org/eml-2.0.0",
            "eml://ecoinformatics.org/eml-2.0.1",
            "eml://ecoinformatics.org/eml-2.1.0",
            "eml://ecoinformatics.org/eml-2.1.1",
            "https://eml.ecoinformatics.org/eml-2.2.0",
        ] {
            assert_eq!(Dialect::for_format(format), Some(Dialect::Eml));
        }
    }

    #[test]
    fn unknown_format_has_no_dialect() {
        assert_eq!(Dialect::for_format("text/csv"), None);
    }
}
