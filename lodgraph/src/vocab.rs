//! Vocabulary constants and URI minting for the mirror graph.

use uuid::Uuid;

use crate::identifier::encode_id;

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SCHEMA: &str = "https://schema.org/";
pub const SPDX: &str = "http://spdx.org/rdf/terms#";
pub const PROV: &str = "http://www.w3.org/ns/prov#";

/// Project-local terms for party-to-dataset role edges.
pub const LOD: &str = "https://lodmirror.org/ns#";

/// Base for minted dataset and digital-object URIs.
pub const BASE: &str = "https://lodmirror.org/";

/// Fixed coordinate-reference-system annotation attached to every spatial
/// coverage node.
pub const SPATIAL_REFERENCE_PROPERTY: &str =
    "http://dbpedia.org/resource/Spatial_reference_system";
pub const SPATIAL_REFERENCE_SYSTEM: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

pub fn rdf(local: &str) -> String {
    format!("{RDF}{local}")
}

pub fn xsd(local: &str) -> String {
    format!("{XSD}{local}")
}

pub fn schema(local: &str) -> String {
    format!("{SCHEMA}{local}")
}

pub fn spdx(local: &str) -> String {
    format!("{SPDX}{local}")
}

pub fn prov(local: &str) -> String {
    format!("{PROV}{local}")
}

pub fn lod(local: &str) -> String {
    format!("{LOD}{local}")
}

/// The graph URI for a dataset with the given primary identifier.
pub fn dataset_uri(pid: &str) -> String {
    format!("{BASE}datasets/{}", encode_id(pid))
}

/// The graph URI for a digital object (dataset part).
pub fn object_uri(id: &str) -> String {
    format!("{BASE}objects/{}", encode_id(id))
}

/// Mints a URI for a newly discovered person or organization.
pub fn mint_party_uri() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}
