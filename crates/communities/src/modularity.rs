/// Weighted adjacency: `adj[u]` lists `(v, weight)`, each undirected edge
/// stored on both endpoints.
pub type Adjacency = [Vec<(usize, f64)>];

/// Node positions grouped into communities.
pub type Partition = Vec<Vec<usize>>;

/// Newman modularity `sum_c [ L_c / m - (d_c / 2m)^2 ]`.
///
/// Returns 0.0 for a graph without edge weight.
pub fn modularity(adj: &Adjacency, partition: &[Vec<usize>]) -> f64 {
    let n = adj.len();
    let mut community = vec![usize::MAX; n];
    for (c, members) in partition.iter().enumerate() {
        for &node in members {
            if node < n {
                community[node] = c;
            }
        }
    }

    let degrees: Vec<f64> = adj.iter().map(|nbrs| nbrs.iter().map(|(_, w)| w).sum()).collect();
    let two_m: f64 = degrees.iter().sum();
    if two_m <= 0.0 {
        return 0.0;
    }

    let mut internal = vec![0.0; partition.len()];
    let mut totals = vec![0.0; partition.len()];
    for (u, nbrs) in adj.iter().enumerate() {
        let cu = community[u];
        if cu == usize::MAX {
            continue;
        }
        totals[cu] += degrees[u];
        for &(v, w) in nbrs {
            if community[v] == cu {
                internal[cu] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&totals)
        .map(|(l, d)| l / two_m - (d / two_m).powi(2))
        .sum()
}

/// Orders communities by size (descending), then by smallest member.
pub fn canonical(mut partition: Partition) -> Partition {
    for members in &mut partition {
        members.sort_unstable();
    }
    partition.retain(|c| !c.is_empty());
    partition.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
    partition
}

/// Groups node positions by label, labels compared for equality only.
pub fn from_labels(labels: &[usize]) -> Partition {
    let mut slot = std::collections::HashMap::new();
    let mut partition: Partition = Vec::new();
    for (node, label) in labels.iter().enumerate() {
        let idx = *slot.entry(*label).or_insert_with(|| {
            partition.push(Vec::new());
            partition.len() - 1
        });
        partition[idx].push(node);
    }
    canonical(partition)
}
