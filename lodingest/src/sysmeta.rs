//! System-metadata descriptors for datasets and their package members.

use chrono::{DateTime, Utc};

use crate::errors::{IngestError, Result};
use crate::xml::Element;

/// Principal naming anonymous public access in access-policy rules.
pub const PUBLIC_PRINCIPAL: &str = "public";

/// Format identifiers marking a member as a child package descriptor
/// rather than a data object.
const PACKAGE_FORMAT_IDS: &[&str] = &["http://www.openarchives.org/ore/terms"];

/// The fixed set of supported checksum algorithms; anything else is a
/// fatal error for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn parse(label: &str) -> Result<Self> {
        match label.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "MD5" => Ok(ChecksumAlgorithm::Md5),
            "SHA1" => Ok(ChecksumAlgorithm::Sha1),
            "SHA256" => Ok(ChecksumAlgorithm::Sha256),
            "SHA384" => Ok(ChecksumAlgorithm::Sha384),
            "SHA512" => Ok(ChecksumAlgorithm::Sha512),
            _ => Err(IngestError::UnsupportedChecksum(label.to_string())),
        }
    }

    /// SPDX algorithm individual for this algorithm.
    pub fn iri(&self) -> String {
        let local = match self {
            ChecksumAlgorithm::Md5 => "checksumAlgorithm_md5",
            ChecksumAlgorithm::Sha1 => "checksumAlgorithm_sha1",
            ChecksumAlgorithm::Sha256 => "checksumAlgorithm_sha256",
            ChecksumAlgorithm::Sha384 => "checksumAlgorithm_sha384",
            ChecksumAlgorithm::Sha512 => "checksumAlgorithm_sha512",
        };
        lodgraph::vocab::spdx(local)
    }
}

#[derive(Debug, Clone)]
pub struct Checksum {
    pub value: String,
    pub algorithm: ChecksumAlgorithm,
}

/// One allow-rule from the access policy.
#[derive(Debug, Clone, Default)]
pub struct AccessRule {
    pub subjects: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SystemMetadata {
    pub identifier: String,
    pub series_id: Option<String>,
    pub format_id: String,
    pub size: u64,
    pub checksum: Checksum,
    pub obsoletes: Option<String>,
    pub obsoleted_by: Option<String>,
    pub date_uploaded: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub file_name: Option<String>,
    pub access_rules: Vec<AccessRule>,
}

impl SystemMetadata {
    pub fn from_xml(doc: &str) -> Result<Self> {
        Self::from_element(&Element::parse(doc)?)
    }

    pub fn from_element(root: &Element) -> Result<Self> {
        let identifier = root.text_of("identifier").ok_or_else(|| {
            IngestError::MalformedDocument("system metadata missing identifier".to_string())
        })?;
        let format_id = root.text_of("formatId").ok_or_else(|| {
            IngestError::MalformedDocument(format!(
                "system metadata for {identifier} missing formatId"
            ))
        })?;

        let checksum_element = root.child("checksum").ok_or_else(|| {
            IngestError::MalformedDocument(format!(
                "system metadata for {identifier} missing checksum"
            ))
        })?;
        let algorithm_label = checksum_element.attr("algorithm").ok_or_else(|| {
            IngestError::MalformedDocument(format!(
                "checksum for {identifier} missing algorithm"
            ))
        })?;
        let checksum = Checksum {
            value: checksum_element.text.clone(),
            algorithm: ChecksumAlgorithm::parse(algorithm_label)?,
        };

        let size = root
            .text_of("size")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let mut access_rules = Vec::new();
        if let Some(policy) = root.child("accessPolicy") {
            for allow in policy.children_named("allow") {
                access_rules.push(AccessRule {
                    subjects: allow
                        .children_named("subject")
                        .map(|s| s.text.clone())
                        .collect(),
                    permissions: allow
                        .children_named("permission")
                        .map(|p| p.text.clone())
                        .collect(),
                });
            }
        }

        Ok(SystemMetadata {
            identifier,
            series_id: root.text_of("seriesId"),
            format_id,
            size,
            checksum,
            obsoletes: root.text_of("obsoletes"),
            obsoleted_by: root.text_of("obsoletedBy"),
            date_uploaded: parse_timestamp(root, "dateUploaded"),
            date_modified: parse_timestamp(root, "dateModified"),
            file_name: root.text_of("fileName"),
            access_rules,
        })
    }

    /// True iff any allow-rule grants read to the public principal.
    pub fn is_public(&self) -> bool {
        self.access_rules.iter().any(|rule| {
            rule.subjects.iter().any(|s| s == PUBLIC_PRINCIPAL)
                && rule.permissions.iter().any(|p| p.eq_ignore_ascii_case("read"))
        })
    }

    /// True iff this descriptor's format marks a child package descriptor.
    pub fn is_package_descriptor(&self) -> bool {
        PACKAGE_FORMAT_IDS.contains(&self.format_id.as_str())
    }
}

fn parse_timestamp(root: &Element, name: &str) -> Option<DateTime<Utc>> {
    let raw = root.text_of(name)?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(err) => {
            log::warn!("ignoring unparseable {name} '{raw}': {err}");
            None
        }
    }
}
