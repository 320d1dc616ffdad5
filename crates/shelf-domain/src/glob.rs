//! Single-level id matching with `*` as the only wildcard.

#[must_use]
pub fn is_pattern(candidate: &str) -> bool {
    candidate.contains('*')
}

/// Case-sensitive match of `id` against `pattern`, where `*` matches any
/// (possibly empty) run of characters.
#[must_use]
pub fn matches(pattern: &str, id: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return id.is_empty();
    };
    let Some(mut rest) = id.strip_prefix(head) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Ids from `candidates` matching `pattern`, in the order given.
pub fn filter<'a, I>(pattern: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    candidates
        .into_iter()
        .filter(|id| matches(pattern, id))
        .cloned()
        .collect()
}
