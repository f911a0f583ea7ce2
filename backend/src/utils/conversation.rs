use uuid::Uuid;

/// Builds the key that groups all messages between two users into a single
/// thread. The pair is sorted before joining, so both orderings of the same
/// two users yield the same key; it also serves as the room identifier for
/// live delivery.
pub fn conversation_key(a: Uuid, b: Uuid) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}", first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(conversation_key(a, b), conversation_key(b, a));
    }

    #[test]
    fn test_key_contains_both_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let key = conversation_key(a, b);

        assert!(key.contains(&a.to_string()));
        assert!(key.contains(&b.to_string()));
    }

    #[test]
    fn test_distinct_pairs_get_distinct_keys() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        assert_ne!(conversation_key(a, b), conversation_key(a, c));
        assert_ne!(conversation_key(a, b), conversation_key(b, c));
    }
}
