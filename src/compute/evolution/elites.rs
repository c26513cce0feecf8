//! Elite selection: survivors carried unchanged into the next generation.
//!
//! Niche elites run first so every qualifying cluster is represented before
//! raw top-N elitism fills its slots. Both tracks share one set of used
//! titles, so no title survives twice through elitism.

use std::collections::{HashMap, HashSet};

use crate::schema::Candidate;

/// Positions (in the previous generation) of the selected elites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EliteSelection {
    /// Best qualifying member per cluster.
    pub niche: Vec<usize>,
    /// Highest-fitness candidates overall.
    pub top: Vec<usize>,
}

impl EliteSelection {
    /// Total elites.
    pub fn len(&self) -> usize {
        self.niche.len() + self.top.len()
    }

    /// Whether no elite was selected.
    pub fn is_empty(&self) -> bool {
        self.niche.is_empty() && self.top.is_empty()
    }

    /// Niche elites followed by top-N elites.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.niche.iter().chain(self.top.iter()).copied()
    }
}

/// Select niche elites then top-N elites, never exceeding `capacity` in total.
///
/// `active` lists the positions eligible for selection.
pub fn select_elites(
    generation: &[Candidate],
    active: &[usize],
    fitness_floor: f64,
    top_limit: usize,
    capacity: usize,
    used_titles: &mut HashSet<String>,
) -> EliteSelection {
    let niche = niche_elites(generation, active, fitness_floor, capacity, used_titles);
    let top = top_elites(
        generation,
        active,
        top_limit.min(capacity - niche.len()),
        used_titles,
    );
    EliteSelection { niche, top }
}

/// Best member of each cluster at or above `fitness_floor`.
///
/// Clusters are visited in order of first appearance. Within a cluster the
/// first of equally rated members wins. Clusters with no qualifying member,
/// or whose best member's title is already used, contribute nothing.
pub fn niche_elites(
    generation: &[Candidate],
    active: &[usize],
    fitness_floor: f64,
    limit: usize,
    used_titles: &mut HashSet<String>,
) -> Vec<usize> {
    let mut cluster_order: Vec<usize> = Vec::new();
    let mut best: HashMap<usize, Option<usize>> = HashMap::new();

    for &position in active {
        let candidate = &generation[position];
        let Some(cluster) = candidate.cluster_index() else {
            continue;
        };
        let slot = best.entry(cluster).or_insert_with(|| {
            cluster_order.push(cluster);
            None
        });

        match candidate.fitness {
            Some(fitness) if fitness >= fitness_floor => {
                let better = slot.is_none_or(|current| {
                    fitness > generation[current].rank_fitness()
                });
                if better {
                    *slot = Some(position);
                }
            }
            _ => log::debug!(
                "Not a niche elite, below fitness floor: {} {:?}",
                candidate.title,
                candidate.fitness
            ),
        }
    }

    let mut elites = Vec::new();
    for cluster in cluster_order {
        if elites.len() >= limit {
            break;
        }
        let Some(position) = best[&cluster] else {
            log::debug!("No candidate above fitness floor in cluster {}", cluster);
            continue;
        };
        let title = &generation[position].title;
        if used_titles.insert(title.clone()) {
            log::debug!("Added niche elite from cluster {}: {}", cluster, title);
            elites.push(position);
        }
    }
    elites
}

/// Up to `limit` highest-fitness candidates whose titles are not yet used.
///
/// Unrated candidates sort after every rated one; ties keep generation order.
pub fn top_elites(
    generation: &[Candidate],
    active: &[usize],
    limit: usize,
    used_titles: &mut HashSet<String>,
) -> Vec<usize> {
    let mut ranked = active.to_vec();
    ranked.sort_by(|&a, &b| {
        generation[b]
            .rank_fitness()
            .total_cmp(&generation[a].rank_fitness())
    });

    let mut elites = Vec::with_capacity(limit);
    for position in ranked {
        if elites.len() >= limit {
            break;
        }
        let title = &generation[position].title;
        if used_titles.insert(title.clone()) {
            log::debug!("Added elite: {}", title);
            elites.push(position);
        }
    }
    elites
}
