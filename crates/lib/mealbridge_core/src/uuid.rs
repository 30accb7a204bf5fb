// Principal identifiers are UUIDv7 so that insertion order matches id order,
// which keeps the `principals` primary-key index append-only.

use uuid::Uuid;

/// Generate a new principal identifier (UUIDv7, timestamp-sortable).
pub fn principal_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_id_is_v7() {
        let id = principal_id();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn principal_ids_sort_by_creation() {
        let a = principal_id();
        let b = principal_id();
        assert!(b >= a);
    }
}
