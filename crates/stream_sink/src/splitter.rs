//! Batch splitting for destinations with per-request ceilings

/// Partition `items` into consecutive groups
///
/// Greedy left to right: the next item joins the current group unless that
/// would push the group past `max_records` items or `max_bytes` summed size,
/// in which case it opens a new group. An item larger than `max_bytes` on its
/// own still gets a singleton group; rejecting it is the destination's call.
///
/// Order is preserved within and across groups and no group is empty.
pub fn split<T, F>(
    items: impl IntoIterator<Item = T>,
    size_of: F,
    max_records: usize,
    max_bytes: usize,
) -> Vec<Vec<T>>
where
    F: Fn(&T) -> usize,
{
    let mut groups = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_bytes = 0usize;

    for item in items {
        let size = size_of(&item);
        let too_many = current.len() + 1 > max_records;
        let too_big = current_bytes.saturating_add(size) > max_bytes;

        if !current.is_empty() && (too_many || too_big) {
            groups.push(std::mem::take(&mut current));
            current_bytes = 0;
        }

        current.push(item);
        current_bytes = current_bytes.saturating_add(size);
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
