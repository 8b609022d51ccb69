//! Extraction for Dublin Core extended documents.
//!
//! Dublin Core records are much flatter than EML: creators are bare name
//! strings, so staged person records carry a full name only and identity
//! resolution falls through to minting.

use lodgraph::statement::Term;
use lodgraph::vocab;

use super::{Extraction, PartyRole, PersonRecord};
use crate::errors::Result;
use crate::xml::Element;

pub(super) fn extract(document: &Element, extraction: &mut Extraction) -> Result<()> {
    let ds = extraction.dataset.clone();

    let mut titles = Vec::new();
    document.descendants_named("title", &mut titles);
    if let Some(title) = titles.iter().find(|t| !t.text.is_empty()) {
        extraction.add(
            ds.clone(),
            Term::iri(vocab::schema("name")),
            Term::literal(&title.text),
        );
    }

    let mut descriptions = Vec::new();
    document.descendants_named("description", &mut descriptions);
    document.descendants_named("abstract", &mut descriptions);
    if let Some(description) = descriptions.iter().find(|d| !d.text.is_empty()) {
        extraction.add(
            ds.clone(),
            Term::iri(vocab::schema("description")),
            Term::literal(&description.text),
        );
    }

    let mut dates = Vec::new();
    document.descendants_named("date", &mut dates);
    if let Some(date) = dates.iter().find(|d| !d.text.is_empty()) {
        extraction.add(
            ds.clone(),
            Term::iri(vocab::schema("datePublished")),
            Term::literal(&date.text),
        );
    }

    let mut subjects = Vec::new();
    document.descendants_named("subject", &mut subjects);
    for subject in subjects.iter().filter(|s| !s.text.is_empty()) {
        extraction.add(
            ds.clone(),
            Term::iri(vocab::schema("keywords")),
            Term::literal(&subject.text),
        );
    }

    let mut creators = Vec::new();
    document.descendants_named("creator", &mut creators);
    for creator in creators.iter().filter(|c| !c.text.is_empty()) {
        extraction.people.push(PersonRecord {
            full_name: Some(creator.text.clone()),
            role: Some(PartyRole::Creator),
            ..PersonRecord::default()
        });
    }

    Ok(())
}
