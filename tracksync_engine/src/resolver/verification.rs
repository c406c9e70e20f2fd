use crate::sync_types::{ExternalOrderRef, PlatformOrder};

/// True if one of the order's custom attributes has exactly the value `id`. When `attribute_key` is given, only
/// attributes with that key (compared case-insensitively) count.
pub fn attribute_matches(order: &PlatformOrder, id: &ExternalOrderRef, attribute_key: Option<&str>) -> bool {
    order.custom_attributes.iter().any(|attr| {
        let key_ok = attribute_key.map(|k| attr.key.trim().eq_ignore_ascii_case(k.trim())).unwrap_or(true);
        key_ok && attr.value.trim() == id.as_str()
    })
}

/// Confirms that a candidate returned by a free-text search really refers to `id`. Text search matches on
/// fragments of many fields, so a candidate only counts if the reference is part of its name, is one of its tags, or
/// is the exact value of a custom attribute.
pub fn verify_candidate(order: &PlatformOrder, id: &ExternalOrderRef, attribute_key: Option<&str>) -> bool {
    if id.is_empty() {
        return false;
    }
    order.display_name.contains(id.as_str()) || order.has_tag(id.as_str()) || attribute_matches(order, id, attribute_key)
}
