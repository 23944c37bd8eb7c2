//! Proptest generators for key service domain types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proptest::prelude::*;

/// Generate valid URN namespaces.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("sm".to_string()), "[a-z][a-z0-9-]{0,15}"]
}

/// Generate valid entity types.
pub fn entity_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("user".to_string()),
        Just("device".to_string()),
        Just("service".to_string()),
        "[a-z][a-z0-9_-]{0,15}",
    ]
}

/// Generate valid entity ids: printable, no `/` or `:`.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9-]{1,36}",
        "[A-Za-z0-9._@+-]{1,64}",
        "[a-z]{1,8}[äöüéñ]{1,4}",
    ]
}

/// Generate `(namespace, entity type, entity id)` triples that form a valid URN.
pub fn urn_parts_strategy() -> impl Strategy<Value = (String, String, String)> {
    (
        namespace_strategy(),
        entity_type_strategy(),
        entity_id_strategy(),
    )
}

/// Generate valid URN strings, with the scheme in mixed case.
pub fn urn_string_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("urn"), Just("URN"), Just("Urn")],
        urn_parts_strategy(),
    )
        .prop_map(|(scheme, (ns, ty, id))| format!("{scheme}:{ns}:{ty}:{id}"))
}

/// Generate strings that must never parse as a URN.
pub fn invalid_urn_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // wrong scheme
        urn_parts_strategy().prop_map(|(ns, ty, id)| format!("urx:{ns}:{ty}:{id}")),
        // too few segments
        (namespace_strategy(), entity_type_strategy())
            .prop_map(|(ns, ty)| format!("urn:{ns}:{ty}")),
        // too many segments
        urn_parts_strategy().prop_map(|(ns, ty, id)| format!("urn:{ns}:{ty}:{id}:extra")),
        // empty entity id
        (namespace_strategy(), entity_type_strategy())
            .prop_map(|(ns, ty)| format!("urn:{ns}:{ty}:")),
        // whitespace in entity id
        urn_parts_strategy().prop_map(|(ns, ty, id)| format!("urn:{ns}:{ty}:{id} x")),
        // slash in entity id
        urn_parts_strategy().prop_map(|(ns, ty, id)| format!("urn:{ns}:{ty}:{id}/x")),
        // bare words
        "[a-z]{1,20}",
    ]
}

/// Generate non-empty key material.
pub fn key_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..128)
}

/// Generate key material that may be empty.
pub fn maybe_empty_key_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Generate base64-encoded non-empty key material, as sent on the wire.
pub fn base64_key_strategy() -> impl Strategy<Value = String> {
    key_bytes_strategy().prop_map(|bytes| STANDARD.encode(bytes))
}
