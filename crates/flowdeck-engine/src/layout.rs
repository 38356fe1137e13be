//! Subtree-weighted tree layout.
//!
//! Positions are deterministic for a given node/edge order: depth (maximum
//! over all paths from a root) fixes the x coordinate, and each node is
//! centered in a vertical band sized proportionally to its subtree weight,
//! recursively subdivided among its children. Sibling bands never overlap.

use std::collections::{HashMap, VecDeque};

use flowdeck_core::types::{Edge, Node, Position};

/// Horizontal distance between consecutive depths.
pub const X_SPACING: f64 = 280.0;
/// Vertical band height per unit of subtree weight.
pub const ROW_HEIGHT: f64 = 120.0;

/// Compute positions for every node. Nodes unreachable from any root are
/// appended below the laid-out region at fixed spacing.
pub fn layout(nodes: &[Node], edges: &[Edge]) -> HashMap<String, Position> {
    let n = nodes.len();
    let mut positions = HashMap::with_capacity(n);
    if n == 0 {
        return positions;
    }

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    // adjacency in edge order, deduplicated; self-loops ignored
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut incoming = vec![0usize; n];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        else {
            continue;
        };
        if s == t || children[s].contains(&t) {
            continue;
        }
        children[s].push(t);
        incoming[t] += 1;
    }

    // roots: no incoming edge; a fully cyclic graph gets a synthetic root
    let mut roots: Vec<usize> = (0..n).filter(|&i| incoming[i] == 0).collect();
    if roots.is_empty() {
        roots.push(0);
    }

    // depth by BFS, keeping the maximum over all paths; the n-step cap
    // terminates relaxation on cyclic graphs
    let mut depth = vec![0usize; n];
    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    while let Some(u) = queue.pop_front() {
        for &v in &children[u] {
            let candidate = depth[u] + 1;
            if candidate > depth[v] && candidate <= n {
                depth[v] = candidate;
                queue.push_back(v);
            }
        }
    }

    let mut weights = vec![None; n];
    for i in 0..n {
        subtree_weight(i, &children, &mut weights, &mut vec![false; n]);
    }
    let weight = |i: usize| weights[i].unwrap_or(1);

    let mut placed = vec![false; n];
    let mut cursor = 0.0;
    for &root in &roots {
        let band = weight(root) as f64 * ROW_HEIGHT;
        place_band(
            root,
            cursor,
            band,
            &children,
            &depth,
            &weights,
            &mut placed,
            &mut positions,
            nodes,
        );
        cursor += band;
    }

    // isolated components below the laid-out region
    for i in 0..n {
        if !placed[i] {
            positions.insert(
                nodes[i].id.clone(),
                Position {
                    x: depth[i] as f64 * X_SPACING,
                    y: cursor + ROW_HEIGHT / 2.0,
                },
            );
            cursor += ROW_HEIGHT;
        }
    }

    positions
}

/// Bottom-up subtree weight: leaves weigh 1, internal nodes sum their
/// children (minimum 1). A node revisited through a cycle counts as 1.
fn subtree_weight(
    u: usize,
    children: &[Vec<usize>],
    memo: &mut Vec<Option<usize>>,
    on_stack: &mut Vec<bool>,
) -> usize {
    if let Some(w) = memo[u] {
        return w;
    }
    if on_stack[u] {
        return 1;
    }
    on_stack[u] = true;
    let sum: usize = children[u]
        .iter()
        .map(|&c| subtree_weight(c, children, memo, on_stack))
        .sum();
    on_stack[u] = false;
    let w = sum.max(1);
    memo[u] = Some(w);
    w
}

/// Place `u` at the center of its band, then subdivide the band among its
/// not-yet-placed children proportionally to their weights. A node reachable
/// from several parents keeps its first placement.
#[allow(clippy::too_many_arguments)]
fn place_band(
    u: usize,
    y0: f64,
    band: f64,
    children: &[Vec<usize>],
    depth: &[usize],
    weights: &[Option<usize>],
    placed: &mut [bool],
    positions: &mut HashMap<String, Position>,
    nodes: &[Node],
) {
    if placed[u] {
        return;
    }
    placed[u] = true;
    positions.insert(
        nodes[u].id.clone(),
        Position {
            x: depth[u] as f64 * X_SPACING,
            y: y0 + band / 2.0,
        },
    );

    let pending: Vec<usize> = children[u].iter().copied().filter(|&c| !placed[c]).collect();
    let total: usize = pending.iter().map(|&c| weights[c].unwrap_or(1)).sum();
    if total == 0 {
        return;
    }

    let mut child_y = y0;
    for c in pending {
        let child_band = weights[c].unwrap_or(1) as f64 / total as f64 * band;
        place_band(
            c, child_y, child_band, children, depth, weights, placed, positions, nodes,
        );
        child_y += child_band;
    }
}
