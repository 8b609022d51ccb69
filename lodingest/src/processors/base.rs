//! Base emission shared by every dialect.

use lodgraph::identifier::{classify_scheme, resolve_url, Scheme};
use lodgraph::statement::{GraphBuffer, Term};
use lodgraph::vocab;

use super::Extraction;
use crate::errors::Result;
use crate::sysmeta::{Checksum, SystemMetadata};

/// Emits the dataset's dialect-independent statements: type, identifier
/// nodes, DOI cross-link, timestamps, dereference URL, revision link,
/// declared format, accessibility flag, checksum node, and total byte
/// size.
pub(super) fn emit_dataset(
    extraction: &mut Extraction,
    sysmeta: &SystemMetadata,
    parts: &[SystemMetadata],
) -> Result<()> {
    let ds = extraction.dataset.clone();
    let buffer = &mut extraction.buffer;

    buffer.add(
        ds.clone(),
        Term::iri(vocab::rdf("type")),
        Term::iri(vocab::schema("Dataset")),
    );

    emit_identifier_node(buffer, &ds, &sysmeta.identifier);
    if let Some(sid) = &sysmeta.series_id {
        emit_identifier_node(buffer, &ds, sid);
    }
    // A DOI-identified dataset is also dereferenceable outside the mirror.
    if classify_scheme(&sysmeta.identifier) == Scheme::Doi {
        if let Some(doi_url) = resolve_url(&sysmeta.identifier) {
            buffer.add(
                ds.clone(),
                Term::iri(vocab::schema("sameAs")),
                Term::iri(doi_url),
            );
        }
    }

    if let Some(url) = resolve_url(&sysmeta.identifier) {
        buffer.add(ds.clone(), Term::iri(vocab::schema("url")), Term::iri(url));
    }

    if let Some(modified) = &sysmeta.date_modified {
        buffer.add(
            ds.clone(),
            Term::iri(vocab::schema("dateModified")),
            Term::typed_literal(modified.to_rfc3339(), vocab::xsd("dateTime")),
        );
    }

    if let Some(obsoletes) = &sysmeta.obsoletes {
        buffer.add(
            ds.clone(),
            Term::iri(vocab::prov("wasRevisionOf")),
            Term::iri(vocab::dataset_uri(obsoletes)),
        );
    }

    buffer.add(
        ds.clone(),
        Term::iri(vocab::schema("encodingFormat")),
        Term::literal(&sysmeta.format_id),
    );

    buffer.add(
        ds.clone(),
        Term::iri(vocab::schema("isAccessibleForFree")),
        Term::typed_literal(sysmeta.is_public().to_string(), vocab::xsd("boolean")),
    );

    emit_checksum_node(buffer, &ds, &sysmeta.checksum);

    let total_size: u64 = sysmeta.size
        + parts
            .iter()
            .filter(|part| is_emitted_part(part, sysmeta))
            .map(|part| part.size)
            .sum::<u64>();
    buffer.add(
        ds.clone(),
        Term::iri(vocab::schema("size")),
        Term::typed_literal(total_size.to_string(), vocab::xsd("long")),
    );

    Ok(())
}

/// Emits one statement subtree per package member that qualifies as a
/// Part: never the dataset's own descriptor and never a child package
/// descriptor.
pub(super) fn emit_parts(
    extraction: &mut Extraction,
    sysmeta: &SystemMetadata,
    parts: &[SystemMetadata],
) -> Result<()> {
    let ds = extraction.dataset.clone();
    let buffer = &mut extraction.buffer;

    for part in parts.iter().filter(|part| is_emitted_part(part, sysmeta)) {
        let object = Term::iri(vocab::object_uri(&part.identifier));

        buffer.add(
            ds.clone(),
            Term::iri(vocab::schema("distribution")),
            object.clone(),
        );
        buffer.add(
            object.clone(),
            Term::iri(vocab::rdf("type")),
            Term::iri(vocab::schema("DataDownload")),
        );
        emit_identifier_node(buffer, &object, &part.identifier);
        if let Some(url) = resolve_url(&part.identifier) {
            buffer.add(
                object.clone(),
                Term::iri(vocab::schema("contentUrl")),
                Term::iri(url),
            );
        }
        buffer.add(
            object.clone(),
            Term::iri(vocab::schema("encodingFormat")),
            Term::literal(&part.format_id),
        );
        if let Some(uploaded) = &part.date_uploaded {
            buffer.add(
                object.clone(),
                Term::iri(vocab::schema("uploadDate")),
                Term::typed_literal(uploaded.to_rfc3339(), vocab::xsd("dateTime")),
            );
        }
        if let Some(modified) = &part.date_modified {
            buffer.add(
                object.clone(),
                Term::iri(vocab::schema("dateModified")),
                Term::typed_literal(modified.to_rfc3339(), vocab::xsd("dateTime")),
            );
        }
        buffer.add(
            object.clone(),
            Term::iri(vocab::schema("contentSize")),
            Term::typed_literal(part.size.to_string(), vocab::xsd("long")),
        );
        if let Some(file_name) = &part.file_name {
            buffer.add(
                object.clone(),
                Term::iri(vocab::schema("name")),
                Term::literal(file_name),
            );
        }
        emit_checksum_node(buffer, &object, &part.checksum);
    }

    Ok(())
}

/// Fallbacks applied after dialect extraction: the upload timestamp serves
/// as publication date only when the dialect did not supply one.
pub(super) fn finalize(extraction: &mut Extraction, sysmeta: &SystemMetadata) {
    let ds = extraction.dataset.clone();
    let published = Term::iri(vocab::schema("datePublished"));
    if extraction
        .buffer
        .matching(Some(&ds), Some(&published), None)
        .next()
        .is_none()
    {
        if let Some(uploaded) = &sysmeta.date_uploaded {
            extraction.buffer.add(
                ds,
                published,
                Term::typed_literal(uploaded.to_rfc3339(), vocab::xsd("dateTime")),
            );
        }
    }
}

fn is_emitted_part(part: &SystemMetadata, sysmeta: &SystemMetadata) -> bool {
    part.identifier != sysmeta.identifier && !part.is_package_descriptor()
}

/// Attaches an identifier node carrying the raw string, its classified
/// scheme, and its resolve URL.
fn emit_identifier_node(buffer: &mut GraphBuffer, owner: &Term, raw: &str) {
    let node = Term::fresh_blank();
    buffer.add(
        owner.clone(),
        Term::iri(vocab::schema("identifier")),
        node.clone(),
    );
    buffer.add(
        node.clone(),
        Term::iri(vocab::rdf("type")),
        Term::iri(vocab::schema("PropertyValue")),
    );
    buffer.add(
        node.clone(),
        Term::iri(vocab::schema("propertyID")),
        Term::literal(classify_scheme(raw).label()),
    );
    buffer.add(
        node.clone(),
        Term::iri(vocab::schema("value")),
        Term::literal(raw),
    );
    if let Some(url) = resolve_url(raw) {
        buffer.add(node, Term::iri(vocab::schema("url")), Term::iri(url));
    }
}

fn emit_checksum_node(buffer: &mut GraphBuffer, owner: &Term, checksum: &Checksum) {
    let node = Term::fresh_blank();
    buffer.add(
        owner.clone(),
        Term::iri(vocab::spdx("checksum")),
        node.clone(),
    );
    buffer.add(
        node.clone(),
        Term::iri(vocab::rdf("type")),
        Term::iri(vocab::spdx("Checksum")),
    );
    buffer.add(
        node.clone(),
        Term::iri(vocab::spdx("algorithm")),
        Term::iri(checksum.algorithm.iri()),
    );
    buffer.add(
        node,
        Term::iri(vocab::spdx("checksumValue")),
        Term::literal(&checksum.value),
    );
}
