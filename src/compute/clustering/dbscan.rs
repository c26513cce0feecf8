//! Density-based grouping of projected points.

use rayon::prelude::*;

/// Group points by density.
///
/// A point whose neighborhood (points at distance strictly below `radius`,
/// itself included) holds at least `min_points` members is a core point.
/// Clusters grow from core points through their neighborhoods. Returned
/// clusters list member indices in discovery order; noise points are omitted.
/// Output depends only on the input order.
pub fn dbscan(points: &[Vec<f64>], radius: f64, min_points: usize) -> Vec<Vec<usize>> {
    let neighborhoods = neighborhoods(points, radius);

    let mut visited = vec![false; points.len()];
    let mut assigned = vec![false; points.len()];
    let mut clusters = Vec::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        if neighborhoods[start].len() < min_points {
            // Noise for now; may still be claimed as a border point later
            continue;
        }

        let mut cluster = vec![start];
        assigned[start] = true;

        let mut frontier = neighborhoods[start].clone();
        let mut cursor = 0;
        while cursor < frontier.len() {
            let point = frontier[cursor];
            cursor += 1;

            if !visited[point] {
                visited[point] = true;
                if neighborhoods[point].len() >= min_points {
                    frontier.extend_from_slice(&neighborhoods[point]);
                }
            }
            if !assigned[point] {
                assigned[point] = true;
                cluster.push(point);
            }
        }

        clusters.push(cluster);
    }

    clusters
}

/// Neighbor lists for every point, computed in parallel.
fn neighborhoods(points: &[Vec<f64>], radius: f64) -> Vec<Vec<usize>> {
    points
        .par_iter()
        .map(|p| {
            points
                .iter()
                .enumerate()
                .filter(|(_, q)| euclidean(p, q) < radius)
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

#[inline]
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
