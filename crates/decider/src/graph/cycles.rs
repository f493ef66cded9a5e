//! Cycle detection over parent -> child edges

use std::collections::HashSet;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find every distinct cycle reachable by depth-first search
///
/// `children[i]` lists the nodes that depend on node `i`. A DFS is started
/// from every node; whenever it meets a node that is still on the active path,
/// the path slice from that node onwards is a cycle. Cycles are rotated so
/// they start at their lowest index, then deduplicated, and returned in the
/// order they were first found. A self-loop is a cycle of length one.
pub(crate) fn find_cycles(children: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut found = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();

    for start in 0..children.len() {
        let mut color = vec![Color::White; children.len()];
        let mut path: Vec<usize> = Vec::new();
        // (node, index of the next child to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = Color::Gray;
        path.push(start);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(&child) = children[node].get(next) else {
                color[node] = Color::Black;
                path.pop();
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match color[child] {
                Color::White => {
                    color[child] = Color::Gray;
                    path.push(child);
                    stack.push((child, 0));
                }
                Color::Gray => {
                    if let Some(pos) = path.iter().position(|&n| n == child) {
                        let cycle = canonical(&path[pos..]);
                        if seen.insert(cycle.clone()) {
                            found.push(cycle);
                        }
                    }
                }
                Color::Black => {}
            }
        }
    }

    found
}

/// Rotate a cycle to start at its smallest node
fn canonical(cycle: &[usize]) -> Vec<usize> {
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, node)| *node)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[pivot..].iter().chain(&cycle[..pivot]).copied().collect()
}
