//! Identifier scheme classification and canonical resolve URLs.
//!
//! Pure functions over raw identifier strings; no network access.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Resolve-service endpoint for identifiers that are not themselves
/// dereferenceable (ark, urn, local).
pub const RESOLVE_SERVICE_URL: &str = "https://lodmirror.org/resolve/";

const DOI_PREFIXES: [&str; 3] = ["doi:", "http://doi.org/", "https://doi.org/"];

/// Characters kept verbatim when an identifier is embedded in a URL path.
const ID_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The naming scheme of a raw identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Doi,
    Ark,
    Uri,
    Urn,
    Local,
}

impl Scheme {
    pub fn label(&self) -> &'static str {
        match self {
            Scheme::Doi => "doi",
            Scheme::Ark => "ark",
            Scheme::Uri => "uri",
            Scheme::Urn => "urn",
            Scheme::Local => "local",
        }
    }
}

/// Classifies an identifier by prefix. DOI forms are matched
/// case-insensitively; anything without a recognized prefix is `Local`.
pub fn classify_scheme(id: &str) -> Scheme {
    let lower = id.trim().to_ascii_lowercase();
    if DOI_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        Scheme::Doi
    } else if lower.starts_with("ark:") {
        Scheme::Ark
    } else if lower.starts_with("http:") || lower.starts_with("https:") {
        Scheme::Uri
    } else if lower.starts_with("urn:") {
        Scheme::Urn
    } else {
        Scheme::Local
    }
}

/// Computes the canonical dereference URL for an identifier.
///
/// DOIs resolve through doi.org, http(s) identifiers resolve as themselves,
/// and everything else goes through the catalog resolve service with the
/// identifier percent-encoded. Empty input yields `None`.
pub fn resolve_url(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    match classify_scheme(id) {
        Scheme::Doi => Some(format!("http://doi.org/{}", doi_name(id))),
        Scheme::Uri => Some(id.to_string()),
        Scheme::Ark | Scheme::Urn | Scheme::Local => {
            Some(format!("{RESOLVE_SERVICE_URL}{}", encode_id(id)))
        }
    }
}

/// Strips the scheme prefix from a DOI identifier, leaving the DOI name.
fn doi_name(id: &str) -> &str {
    let lower = id.to_ascii_lowercase();
    for prefix in DOI_PREFIXES {
        if lower.starts_with(prefix) {
            return &id[prefix.len()..];
        }
    }
    id
}

/// Percent-encodes an identifier for embedding in a URL path segment.
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, ID_SAFE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_classification() {
        assert_eq!(classify_scheme("doi:10.5063/ABC"), Scheme::Doi);
        assert_eq!(classify_scheme("DOI:10.5063/ABC"), Scheme::Doi);
        assert_eq!(classify_scheme("https://doi.org/10.5063/ABC"), Scheme::Doi);
        assert_eq!(classify_scheme("ark:/1234"), Scheme::Ark);
        assert_eq!(classify_scheme("http://x"), Scheme::Uri);
        assert_eq!(classify_scheme("urn:x"), Scheme::Urn);
        assert_eq!(classify_scheme("plain-id"), Scheme::Local);
    }

    #[test]
    fn doi_resolves_through_doi_org() {
        assert_eq!(
            resolve_url("doi:10.5063/ABC").as_deref(),
            Some("http://doi.org/10.5063/ABC")
        );
        assert_eq!(
            resolve_url("https://doi.org/10.5063/ABC").as_deref(),
            Some("http://doi.org/10.5063/ABC")
        );
    }

    #[test]
    fn uri_resolves_as_itself() {
        assert_eq!(
            resolve_url("https://example.org/data.csv").as_deref(),
            Some("https://example.org/data.csv")
        );
    }

    #[test]
    fn local_resolves_through_service() {
        assert_eq!(
            resolve_url("my dataset:1").as_deref(),
            Some("https://lodmirror.org/resolve/my%20dataset%3A1")
        );
    }

    #[test]
    fn empty_input_has_no_resolve_url() {
        assert_eq!(resolve_url(""), None);
        assert_eq!(resolve_url("   "), None);
    }
}
