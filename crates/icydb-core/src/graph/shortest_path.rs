//! Module: graph::shortest_path
//! Responsibility: bounded, resumable unweighted shortest path over a
//! graph index (spec.md §4.7) — breadth-first, optionally bidirectional.
//! Does not own: edge lookup (`graph::traversal`) or any other algorithm.
//! Boundary: `shortest_path` is the only entry point; it never mutates the
//! index, only reads through `EdgeIndex`.

use crate::graph::traversal::{EdgeIndex, node_key};
use crate::kv::Transaction;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LimitReason {
    MaxDepth,
    MaxNodesExplored,
}

#[derive(Debug)]
pub struct ShortestPathResult {
    pub path: Option<Vec<FieldValue>>,
    pub distance: Option<u64>,
    pub nodes_explored: u64,
    pub duration_ns: u64,
    pub is_complete: bool,
    pub limit_reason: Option<LimitReason>,
}

#[derive(Clone, Copy, Debug)]
pub struct ShortestPathOptions {
    pub max_depth: Option<u64>,
    pub max_nodes_explored: Option<u64>,
    pub bidirectional: bool,
}

impl Default for ShortestPathOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_nodes_explored: None,
            bidirectional: false,
        }
    }
}

struct Frontier {
    queue: VecDeque<(FieldValue, u64)>,
    came_from: HashMap<Vec<u8>, (Vec<u8>, FieldValue)>,
    depth_of: HashMap<Vec<u8>, u64>,
}

impl Frontier {
    fn seeded(start: &FieldValue) -> Self {
        let mut depth_of = HashMap::new();
        depth_of.insert(node_key(start), 0);
        let mut queue = VecDeque::new();
        queue.push_back((start.clone(), 0));
        Self {
            queue,
            came_from: HashMap::new(),
            depth_of,
        }
    }
}

/// Unweighted shortest path from `start` to `goal`. Bidirectional search
/// alternates expanding the smaller of the two frontiers until they meet,
/// halving the explored radius on symmetric graphs; single-direction BFS
/// is used when `options.bidirectional` is false.
pub fn shortest_path(
    edges: &EdgeIndex,
    start: &FieldValue,
    goal: &FieldValue,
    options: ShortestPathOptions,
    txn: &mut dyn Transaction,
) -> Result<ShortestPathResult, InternalError> {
    let started_at = Instant::now();
    let start_key = node_key(start);
    let goal_key = node_key(goal);

    if start_key == goal_key {
        return Ok(ShortestPathResult {
            path: Some(vec![start.clone()]),
            distance: Some(0),
            nodes_explored: 1,
            duration_ns: started_at.elapsed().as_nanos() as u64,
            is_complete: true,
            limit_reason: None,
        });
    }

    let mut explored: u64 = 0;
    let mut fwd = Frontier::seeded(start);
    let mut bwd = Frontier::seeded(goal);

    loop {
        let expand_forward = !options.bidirectional || fwd.queue.len() <= bwd.queue.len();
        let (active, other, reversed) = if expand_forward {
            (&mut fwd, &bwd, false)
        } else {
            (&mut bwd, &fwd, true)
        };

        let Some((node, depth)) = active.queue.pop_front() else {
            break;
        };

        if let Some(max_nodes) = options.max_nodes_explored {
            if explored >= max_nodes {
                return Ok(timed_out(started_at, explored, LimitReason::MaxNodesExplored));
            }
        }
        explored += 1;

        if let Some(max_depth) = options.max_depth {
            if depth >= max_depth {
                continue;
            }
        }

        let hops = if reversed {
            edges.backward(&node, txn)?
        } else {
            edges.forward(&node, txn)?
        };

        for (_, next) in hops {
            let next_key = node_key(&next);
            if active.depth_of.contains_key(&next_key) {
                continue;
            }
            active.depth_of.insert(next_key.clone(), depth + 1);
            active.came_from.insert(next_key.clone(), (node_key(&node), node.clone()));
            active.queue.push_back((next.clone(), depth + 1));

            if other.depth_of.contains_key(&next_key) {
                let total_depth = depth + 1 + other.depth_of[&next_key];
                let path = if reversed {
                    reconstruct(&bwd, &fwd, &next_key, &next)
                } else {
                    reconstruct(&fwd, &bwd, &next_key, &next)
                };
                return Ok(ShortestPathResult {
                    path: Some(path),
                    distance: Some(total_depth),
                    nodes_explored: explored,
                    duration_ns: started_at.elapsed().as_nanos() as u64,
                    is_complete: true,
                    limit_reason: None,
                });
            }
        }
    }

    Ok(ShortestPathResult {
        path: None,
        distance: None,
        nodes_explored: explored,
        duration_ns: started_at.elapsed().as_nanos() as u64,
        is_complete: true,
        limit_reason: None,
    })
}

fn timed_out(started_at: Instant, explored: u64, reason: LimitReason) -> ShortestPathResult {
    ShortestPathResult {
        path: None,
        distance: None,
        nodes_explored: explored,
        duration_ns: started_at.elapsed().as_nanos() as u64,
        is_complete: false,
        limit_reason: Some(reason),
    }
}

fn walk_back(frontier: &Frontier, meeting_key: &[u8], meeting_node: &FieldValue) -> Vec<FieldValue> {
    let mut path = vec![meeting_node.clone()];
    let mut cursor = meeting_key.to_vec();
    while let Some((prev_key, prev_node)) = frontier.came_from.get(&cursor) {
        path.push(prev_node.clone());
        cursor = prev_key.clone();
    }
    path.reverse();
    path
}

fn reconstruct(
    from_side: &Frontier,
    to_side: &Frontier,
    meeting_key: &[u8],
    meeting_node: &FieldValue,
) -> Vec<FieldValue> {
    let mut head = walk_back(from_side, meeting_key, meeting_node);
    let mut cursor = meeting_key.to_vec();
    let mut tail = Vec::new();
    while let Some((next_key, next_node)) = to_side.came_from.get(&cursor) {
        tail.push(next_node.clone());
        cursor = next_key.clone();
    }
    head.extend(tail);
    head
}
