use crate::entity::{Edge, Entity};
use std::collections::{HashMap, HashSet};

/// Bidirectional BFS: alternates expanding whichever frontier is
/// smaller, terminates as soon as the two frontiers intersect, then
/// reconstructs by concatenating the forward path to the meeting node
/// with the reversed backward path from the meeting node (spec
/// §4.12). `max_hops` bounds the combined hop count of both
/// directions, since that combined count is the length of the
/// resulting path.
pub fn bidirectional_bfs(
    entities: &HashMap<String, Entity>,
    adjacency: &HashMap<String, Vec<Edge>>,
    source_id: &str,
    target_id: &str,
    max_hops: usize,
) -> Option<Vec<String>> {
    if source_id == target_id {
        return Some(vec![source_id.to_string()]);
    }
    let known = |id: &str| entities.contains_key(id) || adjacency.contains_key(id);
    if !known(source_id) || !known(target_id) {
        return None;
    }

    let mut forward_parent: HashMap<String, String> = HashMap::new();
    let mut backward_parent: HashMap<String, String> = HashMap::new();
    let mut forward_visited: HashSet<String> = HashSet::from([source_id.to_string()]);
    let mut backward_visited: HashSet<String> = HashSet::from([target_id.to_string()]);
    let mut forward_frontier = vec![source_id.to_string()];
    let mut backward_frontier = vec![target_id.to_string()];

    let mut hops_used = 0usize;
    while hops_used < max_hops {
        hops_used += 1;

        let expand_forward = forward_frontier.len() <= backward_frontier.len();
        let meeting = if expand_forward {
            expand(
                &forward_frontier,
                adjacency,
                &mut forward_visited,
                &mut forward_parent,
                &backward_visited,
            )
        } else {
            expand(
                &backward_frontier,
                adjacency,
                &mut backward_visited,
                &mut backward_parent,
                &forward_visited,
            )
        };

        let next_frontier = match meeting {
            ExpandResult::Met(node) => {
                return Some(reconstruct(&forward_parent, &backward_parent, source_id, target_id, &node));
            }
            ExpandResult::Next(next) => next,
        };

        if next_frontier.is_empty() {
            return None;
        }
        if expand_forward {
            forward_frontier = next_frontier;
        } else {
            backward_frontier = next_frontier;
        }
    }
    None
}

enum ExpandResult {
    Met(String),
    Next(Vec<String>),
}

fn expand(
    frontier: &[String],
    adjacency: &HashMap<String, Vec<Edge>>,
    visited: &mut HashSet<String>,
    parent: &mut HashMap<String, String>,
    other_visited: &HashSet<String>,
) -> ExpandResult {
    let mut next = Vec::new();
    for node in frontier {
        for edge in adjacency.get(node).into_iter().flatten() {
            let neighbor = &edge.target_id;
            if visited.contains(neighbor) {
                continue;
            }
            visited.insert(neighbor.clone());
            parent.insert(neighbor.clone(), node.clone());
            if other_visited.contains(neighbor) {
                return ExpandResult::Met(neighbor.clone());
            }
            next.push(neighbor.clone());
        }
    }
    ExpandResult::Next(next)
}

fn reconstruct(
    forward_parent: &HashMap<String, String>,
    backward_parent: &HashMap<String, String>,
    source_id: &str,
    target_id: &str,
    meeting: &str,
) -> Vec<String> {
    let mut forward_path = vec![meeting.to_string()];
    let mut cur = meeting.to_string();
    while cur != source_id {
        cur = forward_parent[&cur].clone();
        forward_path.push(cur.clone());
    }
    forward_path.reverse();

    let mut cur = meeting.to_string();
    while cur != target_id {
        cur = backward_parent[&cur].clone();
        forward_path.push(cur.clone());
    }
    forward_path
}
