use std::collections::BTreeMap;

use crate::modularity::{Adjacency, Partition, canonical};

/// Clauset-Newman-Moore agglomeration: starting from singletons, repeatedly
/// merge the connected pair of communities with the largest modularity gain
/// until no merge improves modularity.
pub fn greedy_modularity(adj: &Adjacency) -> Partition {
    let n = adj.len();
    let degrees: Vec<f64> = adj.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let two_m: f64 = degrees.iter().sum();

    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    if two_m <= 0.0 {
        return canonical(members);
    }

    // e[i][j]: fraction of edge ends joining communities i and j.
    let mut e: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    for (u, nbrs) in adj.iter().enumerate() {
        for &(v, w) in nbrs {
            if u != v {
                *e[u].entry(v).or_insert(0.0) += w / two_m;
            }
        }
    }
    let mut a: Vec<f64> = degrees.iter().map(|d| d / two_m).collect();
    let mut alive = vec![true; n];

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in (0..n).filter(|&i| alive[i]) {
            for (&j, &eij) in &e[i] {
                if j <= i {
                    continue;
                }
                let dq = 2.0 * (eij - a[i] * a[j]);
                if best.is_none_or(|(b, _, _)| dq > b) {
                    best = Some((dq, i, j));
                }
            }
        }

        let Some((dq, i, j)) = best else { break };
        if dq <= 0.0 {
            break;
        }

        // Fold j into i.
        let row_j = std::mem::take(&mut e[j]);
        for (k, w) in row_j {
            if k == i {
                continue;
            }
            *e[i].entry(k).or_insert(0.0) += w;
            if let Some(back) = e[k].remove(&j) {
                *e[k].entry(i).or_insert(0.0) += back;
            }
        }
        e[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;
        alive[j] = false;

        let moved = std::mem::take(&mut members[j]);
        members[i].extend(moved);
    }

    canonical(members)
}
