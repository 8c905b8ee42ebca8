//! Reduction of overlapping candidates to a consistent span set.

use parley_core::DetectedEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    None,
    /// Same span, same entity type.
    Duplicate,
    Overlap,
}

fn conflict(a: &DetectedEntity, b: &DetectedEntity, just_duplicates: bool) -> Conflict {
    if !a.overlaps(b) {
        return Conflict::None;
    }
    if a.same_span(b) {
        // Identical spans of different types are alternative readings.
        return if a.entity == b.entity {
            Conflict::Duplicate
        } else {
            Conflict::None
        };
    }
    if just_duplicates {
        Conflict::None
    } else {
        Conflict::Overlap
    }
}

/// Greedy longest-span-first selection.
///
/// Candidates are considered by descending length, then ascending start. A
/// candidate whose type is in `expected` evicts overlapping accepted
/// entities of unexpected types; rejected candidates that no longer conflict
/// afterwards are put back. The result is ordered by start.
pub fn non_overlapping(
    entities: Vec<DetectedEntity>,
    expected: &[String],
    just_duplicates: bool,
) -> Vec<DetectedEntity> {
    let is_expected = |e: &DetectedEntity| expected.iter().any(|x| x == &e.entity);

    let mut order: Vec<usize> = (0..entities.len()).collect();
    order.sort_by(|&a, &b| {
        entities[b]
            .len()
            .cmp(&entities[a].len())
            .then(entities[a].start.cmp(&entities[b].start))
    });

    let mut accepted: Vec<usize> = Vec::new();
    let mut rejected: Vec<usize> = Vec::new();

    for &i in &order {
        let candidate = &entities[i];
        let conflicts: Vec<(usize, Conflict)> = accepted
            .iter()
            .map(|&j| (j, conflict(candidate, &entities[j], just_duplicates)))
            .filter(|(_, c)| *c != Conflict::None)
            .collect();

        if conflicts.is_empty() {
            accepted.push(i);
            continue;
        }
        let duplicate = conflicts.iter().any(|(_, c)| *c == Conflict::Duplicate);
        let blocked_by_expected = conflicts.iter().any(|&(j, _)| is_expected(&entities[j]));
        if duplicate || !is_expected(candidate) || blocked_by_expected {
            rejected.push(i);
            continue;
        }

        // Expected type wins: evict, then reconsider everything rejected so far.
        accepted.retain(|j| !conflicts.iter().any(|(k, _)| k == j));
        rejected.extend(conflicts.iter().map(|(k, _)| *k));
        accepted.push(i);

        let mut still_rejected = Vec::with_capacity(rejected.len());
        for r in rejected {
            let fits = accepted
                .iter()
                .all(|&j| conflict(&entities[r], &entities[j], just_duplicates) == Conflict::None);
            if fits {
                accepted.push(r);
            } else {
                still_rejected.push(r);
            }
        }
        rejected = still_rejected;
    }

    accepted.sort_by(|&a, &b| {
        entities[a]
            .start
            .cmp(&entities[b].start)
            .then(entities[a].end.cmp(&entities[b].end))
            .then(a.cmp(&b))
    });
    let mut slots: Vec<Option<DetectedEntity>> = entities.into_iter().map(Some).collect();
    accepted
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(entity: &str, start: usize, end: usize) -> DetectedEntity {
        DetectedEntity::new(entity, entity, entity, start, end)
    }

    fn spans(result: &[DetectedEntity]) -> Vec<(&str, usize, usize)> {
        result.iter().map(|d| (d.entity.as_str(), d.start, d.end)).collect()
    }

    fn expect(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_spans_of_different_types_both_survive() {
        let result = non_overlapping(vec![e("a", 2, 5), e("b", 2, 5)], &[], false);
        assert_eq!(spans(&result), vec![("a", 2, 5), ("b", 2, 5)]);
    }

    #[test]
    fn longer_span_wins() {
        let result = non_overlapping(vec![e("a", 2, 6), e("b", 2, 5)], &[], false);
        assert_eq!(spans(&result), vec![("a", 2, 6)]);
    }

    #[test]
    fn expected_type_evicts_overlap() {
        let result = non_overlapping(vec![e("a", 2, 4), e("b", 3, 6)], &expect(&["b"]), false);
        assert_eq!(spans(&result), vec![("b", 3, 6)]);

        let result = non_overlapping(vec![e("a", 2, 7), e("b", 3, 6)], &expect(&["b"]), false);
        assert_eq!(spans(&result), vec![("b", 3, 6)]);
    }

    #[test]
    fn eviction_puts_back_freed_candidates() {
        let input = vec![e("a", 0, 10), e("c", 1, 4), e("b", 8, 11)];
        let result = non_overlapping(input, &expect(&["b"]), false);
        assert_eq!(spans(&result), vec![("c", 1, 4), ("b", 8, 11)]);
    }

    #[test]
    fn duplicates_are_dropped() {
        let result = non_overlapping(vec![e("a", 2, 5), e("a", 2, 5)], &expect(&["a"]), false);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn just_duplicates_keeps_partial_overlaps() {
        let input = vec![e("a", 0, 4), e("b", 2, 6), e("b", 2, 6)];
        let result = non_overlapping(input, &[], true);
        assert_eq!(spans(&result), vec![("a", 0, 4), ("b", 2, 6)]);
    }

    #[test]
    fn output_is_sorted_and_non_overlapping() {
        let input = vec![e("x", 10, 12), e("y", 0, 3), e("z", 2, 11), e("w", 5, 6)];
        let result = non_overlapping(input, &[], false);
        assert_eq!(spans(&result), vec![("z", 2, 11)]);
        for pair in result.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }
}
