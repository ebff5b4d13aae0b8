use uuid::Uuid;

// ============================================================================
// Cache key namespaces
// ============================================================================
//
// Shared with the dashboard collaborators, which read summary entries but
// never invalidate anything themselves. Bulk invalidation always goes
// through these prefixes, never through enumerated keys.
//
// ============================================================================

pub const ORDER_DETAIL_PREFIX: &str = "order:detail:";
pub const ORDER_LIST_PREFIX: &str = "orders:list:";
pub const SUMMARY_PREFIX: &str = "dashboard:";
pub const SEARCH_TERMS_KEY: &str = "orders:search-terms";

pub fn order_detail(id: Uuid) -> String {
    format!("{ORDER_DETAIL_PREFIX}{id}")
}

/// List keys embed the normalized search term and the sort so each distinct
/// query caches independently.
pub fn order_list(term: Option<&str>, sort_by: &str, descending: bool) -> String {
    let direction = if descending { "desc" } else { "asc" };
    format!(
        "{ORDER_LIST_PREFIX}{}:sort:{}:{}",
        normalize_term(term),
        sort_by.trim().to_lowercase(),
        direction
    )
}

/// Summary keys are parameterized by the dashboard's reporting filter.
pub fn summary(filter: &str) -> String {
    format!("{SUMMARY_PREFIX}{}", filter.trim().to_lowercase())
}

pub fn normalize_term(term: Option<&str>) -> String {
    match term.map(str::trim).filter(|t| !t.is_empty()) {
        Some(term) => term.to_lowercase(),
        None => "all".to_string(),
    }
}
