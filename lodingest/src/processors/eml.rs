//! Extraction for the Ecological Metadata Language family.
//!
//! All supported EML versions are handled by one walker; the elements it
//! touches did not change meaning between 2.0.0 and 2.2.0.

use lodgraph::statement::Term;
use lodgraph::vocab;

use super::{Extraction, OrgRecord, PartyRole, PersonRecord};
use crate::errors::{IngestError, Result};
use crate::xml::Element;

pub(super) fn extract(document: &Element, extraction: &mut Extraction) -> Result<()> {
    let dataset = document.child("dataset").ok_or_else(|| {
        IngestError::MalformedDocument("EML document has no dataset element".to_string())
    })?;
    let ds = extraction.dataset.clone();

    if let Some(title) = dataset.text_of("title") {
        extraction.add(ds.clone(), Term::iri(vocab::schema("name")), Term::literal(title));
    }

    if let Some(abstract_element) = dataset.child("abstract") {
        let text = abstract_element.all_text();
        if !text.is_empty() {
            extraction.add(
                ds.clone(),
                Term::iri(vocab::schema("description")),
                Term::literal(text),
            );
        }
    }

    if let Some(pub_date) = dataset.text_of("pubDate") {
        extraction.add(
            ds.clone(),
            Term::iri(vocab::schema("datePublished")),
            Term::literal(pub_date),
        );
    }

    for keyword_set in dataset.children_named("keywordSet") {
        for keyword in keyword_set.children_named("keyword") {
            if !keyword.text.is_empty() {
                extraction.add(
                    ds.clone(),
                    Term::iri(vocab::schema("keywords")),
                    Term::literal(&keyword.text),
                );
            }
        }
    }

    for creator in dataset.children_named("creator") {
        stage_party(creator, PartyRole::Creator, extraction);
    }
    for contact in dataset.children_named("contact") {
        stage_party(contact, PartyRole::Contact, extraction);
    }

    if let Some(coverage) = dataset.child("coverage") {
        for geographic in coverage.children_named("geographicCoverage") {
            emit_spatial(geographic, extraction);
        }
        for temporal in coverage.children_named("temporalCoverage") {
            emit_temporal(temporal, extraction);
        }
    }

    for annotation in dataset.children_named("annotation") {
        if let (Some(property), Some(value)) =
            (annotation.text_of("propertyURI"), annotation.text_of("valueURI"))
        {
            extraction.add(ds.clone(), Term::iri(property), Term::iri(value));
        }
    }

    Ok(())
}

/// Stages a responsible party as a person or organization record. Parties
/// with neither an individual nor an organization name (e.g. bare position
/// names) carry no resolvable identity and are skipped.
fn stage_party(party: &Element, role: PartyRole, extraction: &mut Extraction) {
    let email = party.text_of("electronicMailAddress");
    let address = party.child("address").map(format_address).filter(|a| !a.is_empty());
    let organization_name = party.text_of("organizationName");

    if let Some(individual) = party.child("individualName") {
        let given_name = individual.text_of("givenName");
        let family_name = individual.text_of("surName");
        let salutation = individual.text_of("salutation");
        let full_name = {
            let pieces: Vec<&str> = [given_name.as_deref(), family_name.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if pieces.is_empty() {
                None
            } else {
                Some(pieces.join(" "))
            }
        };

        if let Some(affiliation) = &organization_name {
            extraction.ensure_org(affiliation);
        }

        extraction.people.push(PersonRecord {
            full_name,
            given_name,
            family_name,
            salutation,
            email,
            address,
            affiliation: organization_name,
            role: Some(role),
        });
    } else if let Some(name) = organization_name {
        extraction.organizations.push(OrgRecord {
            name,
            email,
            address,
            role: Some(role),
        });
    }
}

fn format_address(address: &Element) -> String {
    let mut pieces: Vec<String> = address
        .children_named("deliveryPoint")
        .map(|p| p.text.clone())
        .filter(|p| !p.is_empty())
        .collect();
    for field in ["city", "administrativeArea", "postalCode", "country"] {
        if let Some(value) = address.text_of(field) {
            pieces.push(value);
        }
    }
    pieces.join(", ")
}

/// Emits a spatial coverage subtree: a point when all four bounds coincide
/// pairwise, otherwise a box, each with the fixed CRS annotation.
fn emit_spatial(geographic: &Element, extraction: &mut Extraction) {
    let Some(bounds) = geographic.child("boundingCoordinates") else {
        return;
    };
    let coordinate = |name: &str| -> Option<f64> {
        bounds.text_of(name).and_then(|v| v.parse::<f64>().ok())
    };
    let (Some(west), Some(east), Some(north), Some(south)) = (
        coordinate("westBoundingCoordinate"),
        coordinate("eastBoundingCoordinate"),
        coordinate("northBoundingCoordinate"),
        coordinate("southBoundingCoordinate"),
    ) else {
        return;
    };

    let ds = extraction.dataset.clone();
    let place = Term::fresh_blank();
    let geo = Term::fresh_blank();

    extraction.add(
        ds,
        Term::iri(vocab::schema("spatialCoverage")),
        place.clone(),
    );
    extraction.add(
        place.clone(),
        Term::iri(vocab::rdf("type")),
        Term::iri(vocab::schema("Place")),
    );
    extraction.add(place.clone(), Term::iri(vocab::schema("geo")), geo.clone());

    if west == east && north == south {
        extraction.add(
            geo.clone(),
            Term::iri(vocab::rdf("type")),
            Term::iri(vocab::schema("GeoCoordinates")),
        );
        extraction.add(
            geo.clone(),
            Term::iri(vocab::schema("latitude")),
            Term::typed_literal(north.to_string(), vocab::xsd("decimal")),
        );
        extraction.add(
            geo,
            Term::iri(vocab::schema("longitude")),
            Term::typed_literal(west.to_string(), vocab::xsd("decimal")),
        );
    } else {
        extraction.add(
            geo.clone(),
            Term::iri(vocab::rdf("type")),
            Term::iri(vocab::schema("GeoShape")),
        );
        extraction.add(
            geo,
            Term::iri(vocab::schema("box")),
            Term::literal(format!("{south},{west} {north},{east}")),
        );
    }

    let crs = Term::fresh_blank();
    extraction.add(
        place.clone(),
        Term::iri(vocab::schema("additionalProperty")),
        crs.clone(),
    );
    extraction.add(
        crs.clone(),
        Term::iri(vocab::rdf("type")),
        Term::iri(vocab::schema("PropertyValue")),
    );
    extraction.add(
        crs.clone(),
        Term::iri(vocab::schema("propertyID")),
        Term::iri(vocab::SPATIAL_REFERENCE_PROPERTY.to_string()),
    );
    extraction.add(
        crs,
        Term::iri(vocab::schema("value")),
        Term::iri(vocab::SPATIAL_REFERENCE_SYSTEM.to_string()),
    );
}

fn emit_temporal(temporal: &Element, extraction: &mut Extraction) {
    let ds = extraction.dataset.clone();
    let predicate = Term::iri(vocab::schema("temporalCoverage"));

    if let Some(range) = temporal.child("rangeOfDates") {
        let begin = range
            .find(&["beginDate", "calendarDate"])
            .map(|e| e.text.clone());
        let end = range
            .find(&["endDate", "calendarDate"])
            .map(|e| e.text.clone());
        if let (Some(begin), Some(end)) = (begin, end) {
            extraction.add(ds, predicate, Term::literal(format!("{begin}/{end}")));
        }
    } else if let Some(single) = temporal.find(&["singleDateTime", "calendarDate"]) {
        if !single.text.is_empty() {
            extraction.add(ds, predicate, Term::literal(&single.text));
        }
    }
}
