//! Entity URN parsing and validation
//!
//! Entity identifiers have the form `urn:<namespace>:<entity-type>:<entity-id>`,
//! e.g. `urn:sm:user:alice`. The canonical string form doubles as the storage
//! key, so two identifiers are equal iff their canonical strings are equal.

use std::fmt;
use std::str::FromStr;

/// Namespace used by the secure messaging platform.
pub const SECURE_MESSAGING: &str = "sm";

const SCHEME: &str = "urn";
const MAX_URN_LEN: usize = 256;

/// URN validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrnError {
    /// Scheme is not `urn`
    #[error("Invalid URN scheme: expected 'urn:'")]
    InvalidScheme,

    /// Wrong number of `:`-separated segments
    #[error("Invalid URN: expected 4 ':'-separated segments, got {0}")]
    SegmentCount(usize),

    /// Named segment is empty
    #[error("Empty URN {0}")]
    EmptySegment(&'static str),

    /// Named segment holds a character outside its allowed set
    #[error("Invalid character in URN {0}")]
    InvalidCharacter(&'static str),

    /// Canonical form is longer than the storage key limit
    #[error("URN exceeds {} bytes", MAX_URN_LEN)]
    TooLong,
}

/// A validated entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityUrn {
    canonical: String,
    // byte offsets where the entity type and entity id begin
    type_start: usize,
    id_start: usize,
}

impl EntityUrn {
    /// Builds a URN from its components, applying the same rules as [`EntityUrn::parse`].
    pub fn new(namespace: &str, entity_type: &str, entity_id: &str) -> Result<Self, UrnError> {
        validate_namespace(namespace)?;
        validate_entity_type(entity_type)?;
        validate_entity_id(entity_id)?;

        let canonical = format!("{SCHEME}:{namespace}:{entity_type}:{entity_id}");
        if canonical.len() > MAX_URN_LEN {
            return Err(UrnError::TooLong);
        }

        let type_start = SCHEME.len() + 1 + namespace.len() + 1;
        let id_start = type_start + entity_type.len() + 1;

        Ok(Self {
            canonical,
            type_start,
            id_start,
        })
    }

    /// Parses a URN from its string form.
    /// The scheme is matched case-insensitively and canonicalized to `urn`.
    pub fn parse(raw: &str) -> Result<Self, UrnError> {
        if raw.len() > MAX_URN_LEN {
            return Err(UrnError::TooLong);
        }

        let segments: Vec<&str> = raw.split(':').collect();
        if !segments[0].eq_ignore_ascii_case(SCHEME) {
            return Err(UrnError::InvalidScheme);
        }
        if segments.len() != 4 {
            return Err(UrnError::SegmentCount(segments.len()));
        }

        Self::new(segments[1], segments[2], segments[3])
    }

    /// Namespace component (e.g. `sm`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.canonical[SCHEME.len() + 1..self.type_start - 1]
    }

    /// Entity type component (e.g. `user`).
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.canonical[self.type_start..self.id_start - 1]
    }

    /// Entity id component; this is what gets compared with an authenticated subject.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.canonical[self.id_start..]
    }

    /// Canonical string form, used verbatim as the storage key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns true if `subject` owns this identifier.
    #[must_use]
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.entity_id() == subject
    }
}

impl fmt::Display for EntityUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for EntityUrn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityUrn {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

fn validate_namespace(namespace: &str) -> Result<(), UrnError> {
    if namespace.is_empty() {
        return Err(UrnError::EmptySegment("namespace"));
    }
    if !namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(UrnError::InvalidCharacter("namespace"));
    }
    Ok(())
}

fn validate_entity_type(entity_type: &str) -> Result<(), UrnError> {
    if entity_type.is_empty() {
        return Err(UrnError::EmptySegment("entity type"));
    }
    if !entity_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(UrnError::InvalidCharacter("entity type"));
    }
    Ok(())
}

fn validate_entity_id(entity_id: &str) -> Result<(), UrnError> {
    if entity_id.is_empty() {
        return Err(UrnError::EmptySegment("entity id"));
    }
    if entity_id
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == ':')
    {
        return Err(UrnError::InvalidCharacter("entity id"));
    }
    Ok(())
}
