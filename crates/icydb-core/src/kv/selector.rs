use super::KeySelector;

/// Resolve a key selector against a sorted, deduplicated key slice, to the
/// index of the first key the selector designates (`keys.len()` if none
/// qualify). Used by the in-memory reference store; a real FDB-like store
/// performs the equivalent resolution server-side.
#[must_use]
pub fn resolve_selector(keys: &[Vec<u8>], selector: &KeySelector) -> usize {
    match selector {
        KeySelector::FirstGreaterOrEqual(k) => keys.partition_point(|existing| existing < k),
        KeySelector::FirstGreaterThan(k) => keys.partition_point(|existing| existing <= k),
        KeySelector::LastLessOrEqual(k) => {
            let gt = keys.partition_point(|existing| existing <= k);
            gt
        }
        KeySelector::LastLessThan(k) => keys.partition_point(|existing| existing < k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<Vec<u8>> {
        vec![b"a".to_vec(), b"c".to_vec(), b"e".to_vec()]
    }

    #[test]
    fn first_greater_or_equal_on_exact_match() {
        let idx = resolve_selector(&keys(), &KeySelector::FirstGreaterOrEqual(b"c".to_vec()));
        assert_eq!(idx, 1);
    }

    #[test]
    fn first_greater_or_equal_between_keys() {
        let idx = resolve_selector(&keys(), &KeySelector::FirstGreaterOrEqual(b"b".to_vec()));
        assert_eq!(idx, 1);
    }

    #[test]
    fn first_greater_than_exact_match_skips_it() {
        let idx = resolve_selector(&keys(), &KeySelector::FirstGreaterThan(b"c".to_vec()));
        assert_eq!(idx, 2);
    }

    #[test]
    fn past_end_resolves_to_len() {
        let idx = resolve_selector(&keys(), &KeySelector::FirstGreaterThan(b"z".to_vec()));
        assert_eq!(idx, keys().len());
    }
}
