use crate::modularity::{Adjacency, Partition, from_labels};

const MAX_SWEEPS: usize = 100;

/// Asynchronous label propagation in node order.
///
/// Each node adopts the most frequent label among its neighbors. A node
/// keeps its label whenever that label is already among the most frequent;
/// otherwise the smallest such label wins, so the result is deterministic.
pub fn label_propagation(adj: &Adjacency) -> Partition {
    let n = adj.len();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut counts: Vec<usize> = vec![0; n];

    for _ in 0..MAX_SWEEPS {
        let mut changed = false;

        for node in 0..n {
            if adj[node].is_empty() {
                continue;
            }

            let mut touched = Vec::with_capacity(adj[node].len());
            for &(nbr, _) in &adj[node] {
                let l = labels[nbr];
                if counts[l] == 0 {
                    touched.push(l);
                }
                counts[l] += 1;
            }

            let top = touched.iter().map(|&l| counts[l]).max().unwrap_or(0);
            let current = labels[node];
            if counts[current] != top {
                let best = touched
                    .iter()
                    .copied()
                    .filter(|&l| counts[l] == top)
                    .min()
                    .unwrap_or(current);
                labels[node] = best;
                changed = true;
            }

            for l in touched {
                counts[l] = 0;
            }
        }

        if !changed {
            break;
        }
    }

    from_labels(&labels)
}
