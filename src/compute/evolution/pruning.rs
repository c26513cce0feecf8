//! Diversity pruning of the breeding pool.

use std::collections::HashMap;

use crate::schema::Candidate;

/// Cap each cluster's contribution to the breeding pool.
///
/// Keeps the first `cap` members of every cluster in their existing order
/// and drops the rest. Unclustered candidates are always kept. The result
/// preserves the order of `members`.
pub fn prune_clusters(generation: &[Candidate], members: &[usize], cap: usize) -> Vec<usize> {
    let mut kept_per_cluster: HashMap<usize, usize> = HashMap::new();

    let pruned: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&position| match generation[position].cluster_index() {
            None => true,
            Some(cluster) => {
                let kept = kept_per_cluster.entry(cluster).or_insert(0);
                if *kept < cap {
                    *kept += 1;
                    true
                } else {
                    false
                }
            }
        })
        .collect();

    log::info!(
        "Breeding pool size after pruning: {} (from {})",
        pruned.len(),
        members.len()
    );
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_caps_cluster_keeps_order() {
        let generation = vec![
            Candidate::new("0", "a").with_group(0, 4),
            Candidate::new("1", "b"),
            Candidate::new("2", "c").with_group(0, 4),
            Candidate::new("3", "d").with_group(0, 4),
            Candidate::new("4", "e").with_group(1, 1),
            Candidate::new("5", "f").with_group(0, 4),
        ];
        let members: Vec<usize> = (0..generation.len()).collect();
        assert_eq!(prune_clusters(&generation, &members, 2), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_unclustered_never_pruned() {
        let generation: Vec<Candidate> = (0..5)
            .map(|i| Candidate::new(i.to_string(), i.to_string()))
            .collect();
        let members: Vec<usize> = (0..5).collect();
        assert_eq!(prune_clusters(&generation, &members, 1), members);
    }

    proptest! {
        #[test]
        fn prop_cluster_size_is_min_of_size_and_cap(
            groups in prop::collection::vec(prop::option::of(0usize..4), 0..60),
            cap in 1usize..6,
        ) {
            let generation: Vec<Candidate> = groups
                .iter()
                .enumerate()
                .map(|(i, g)| {
                    let c = Candidate::new(i.to_string(), i.to_string());
                    match g {
                        Some(index) => c.with_group(*index, 0),
                        None => c,
                    }
                })
                .collect();
            let members: Vec<usize> = (0..generation.len()).collect();
            let pruned = prune_clusters(&generation, &members, cap);

            for cluster in 0..4 {
                let before = groups.iter().filter(|g| **g == Some(cluster)).count();
                let after = pruned
                    .iter()
                    .filter(|&&p| generation[p].cluster_index() == Some(cluster))
                    .count();
                prop_assert_eq!(after, before.min(cap));
            }

            let unclustered_before = groups.iter().filter(|g| g.is_none()).count();
            let unclustered_after = pruned
                .iter()
                .filter(|&&p| generation[p].similarity_group.is_none())
                .count();
            prop_assert_eq!(unclustered_after, unclustered_before);
            prop_assert!(pruned.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
