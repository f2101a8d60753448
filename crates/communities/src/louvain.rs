use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::debug;

use crate::modularity::{Adjacency, Partition, from_labels, modularity};

const MAX_LEVELS: usize = 32;
const MAX_PASSES: usize = 100;
const MIN_GAIN: f64 = 1e-7;

/// Multi-level Louvain with a seeded node visiting order.
pub struct LouvainDetector {
    seed: u64,
}

impl LouvainDetector {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns a partition of node positions.
    ///
    /// Fails on a graph without positive, finite total edge weight.
    pub fn detect(&self, adj: &Adjacency) -> Result<Partition> {
        let two_m: f64 = adj.iter().flatten().map(|(_, w)| w).sum();
        if !two_m.is_finite() || two_m <= 0.0 {
            bail!("Louvain needs positive total edge weight (got {two_m})");
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment: Vec<usize> = (0..adj.len()).collect();
        let mut level_adj: Vec<Vec<(usize, f64)>> = adj.to_vec();
        let mut best_q = modularity(adj, &from_labels(&assignment));

        for level in 0..MAX_LEVELS {
            let (communities, moved) = one_level(&level_adj, two_m, &mut rng);
            if !moved {
                break;
            }

            let (renumbered, count) = renumber(&communities);
            let next: Vec<usize> = assignment.iter().map(|&c| renumbered[c]).collect();
            let q = modularity(adj, &from_labels(&next));
            debug!(level, communities = count, modularity = q, "Louvain level");
            if q - best_q <= MIN_GAIN {
                break;
            }

            best_q = q;
            assignment = next;
            level_adj = aggregate(&level_adj, &renumbered, count);
        }

        Ok(from_labels(&assignment))
    }
}

/// Local moving phase. Returns the community of every node and whether any
/// node changed community.
fn one_level(adj: &Adjacency, two_m: f64, rng: &mut StdRng) -> (Vec<usize>, bool) {
    let n = adj.len();
    let k: Vec<f64> = adj.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut tot = k.clone();

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut moved_any = false;
    for _ in 0..MAX_PASSES {
        let mut moved = false;

        for &node in &order {
            let current = community[node];
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &(nbr, w) in &adj[node] {
                if nbr != node {
                    *links.entry(community[nbr]).or_insert(0.0) += w;
                }
            }

            tot[current] -= k[node];
            let gain = |c: usize, w: f64| w - tot[c] * k[node] / two_m;

            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &w) in &links {
                let g = gain(c, w);
                if g > best_gain {
                    best_gain = g;
                    best = c;
                }
            }

            tot[best] += k[node];
            if best != current {
                community[node] = best;
                moved = true;
            }
        }

        if !moved {
            break;
        }
        moved_any = true;
    }

    (community, moved_any)
}

/// Maps community labels to `0..count` in first-seen order.
fn renumber(communities: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(communities.len());
    for &c in communities {
        let next = mapping.len();
        out.push(*mapping.entry(c).or_insert(next));
    }
    (out, mapping.len())
}

/// Collapses each community into one node; internal weight becomes a
/// self-loop so degrees are preserved.
fn aggregate(adj: &Adjacency, community: &[usize], count: usize) -> Vec<Vec<(usize, f64)>> {
    let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
    for (u, nbrs) in adj.iter().enumerate() {
        for &(v, w) in nbrs {
            *merged[community[u]].entry(community[v]).or_insert(0.0) += w;
        }
    }
    merged.into_iter().map(|m| m.into_iter().collect()).collect()
}
