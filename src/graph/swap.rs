//! Swap Search (C9) — DFS enumerating chains that cross `start` and
//! terminate at a free slot on either side (§4.9).

use super::hop::{get_1_hop, is_free, HopDirection, HopMode};
use super::{ClassId, NodeId, SchedulingGraph};

/// Enumerate swap chains through `start`: `free → a → b → … → start → … → free`.
/// Each neighbour of `start` contributes independent backward and forward
/// continuations; every combination of the two is emitted.
pub fn swap(graph: &SchedulingGraph, start: NodeId, max_depth: u32) -> Vec<Vec<NodeId>> {
    let mut out = Vec::new();
    let Some(class_id) = graph.course(start).classes.values().next().copied() else {
        return out;
    };

    for &course in graph.class(class_id).courses.values() {
        if course == start {
            continue;
        }

        let bwd_hop = get_1_hop(graph, start, course, HopDirection::Bwd, HopMode::Swap, &[]);
        let fwd_hop = get_1_hop(graph, start, course, HopDirection::Fwd, HopMode::Swap, &[]);
        let (Some(bwd_hop), Some(fwd_hop)) = (bwd_hop, fwd_hop) else {
            continue;
        };
        if bwd_hop == start || fwd_hop == start {
            continue;
        }

        let backward_paths = if is_free(graph, Some(bwd_hop), HopMode::Swap, &[]) {
            vec![vec![bwd_hop]]
        } else {
            let mut collected = Vec::new();
            let mut path = Vec::new();
            dfs(graph, start, bwd_hop, 0, max_depth, &mut path, &mut collected);
            collected
        };
        if backward_paths.is_empty() {
            continue;
        }

        let forward_paths = if is_free(graph, Some(fwd_hop), HopMode::Swap, &[]) {
            vec![vec![course, fwd_hop]]
        } else {
            let mut collected = Vec::new();
            let mut path = vec![course];
            dfs(graph, start, fwd_hop, 0, max_depth, &mut path, &mut collected);
            collected
        };
        if forward_paths.is_empty() {
            continue;
        }

        for bwd_path in &backward_paths {
            for fwd_path in &forward_paths {
                let mut full = Vec::with_capacity(bwd_path.len() + 1 + fwd_path.len());
                full.extend(bwd_path.iter().rev().copied());
                full.push(start);
                full.extend(fwd_path.iter().copied());
                out.push(full);
            }
        }
    }

    out
}

/// Inner DFS treating `path` as a freed-set: nodes already committed to the
/// chain are available as landing spots for further moves (§4.9).
///
/// `start` is always the outer query node passed down unchanged through
/// every recursive call -- never the hop that began this particular
/// continuation -- so a `next`/`hop2` that happens to equal an intermediate
/// hop is a legitimate revisit, while only a `next`/`hop2` that equals the
/// true query node is skipped as re-entering the start.
fn dfs(
    graph: &SchedulingGraph,
    start: NodeId,
    current: NodeId,
    depth: u32,
    max_depth: u32,
    path: &mut Vec<NodeId>,
    out: &mut Vec<Vec<NodeId>>,
) {
    if depth >= max_depth {
        return;
    }
    let Some(class_id): Option<ClassId> = graph.course(current).classes.values().next().copied() else {
        return;
    };

    for &next in graph.class(class_id).courses.values() {
        if next == start {
            continue;
        }
        let hop1 = get_1_hop(graph, current, next, HopDirection::Bwd, HopMode::Swap, path);
        if !hop1.is_some_and(|h| is_free(graph, Some(h), HopMode::Swap, path)) {
            continue;
        }

        let hop2 = get_1_hop(graph, current, next, HopDirection::Fwd, HopMode::Swap, path);
        let Some(hop2) = hop2 else {
            continue;
        };
        if hop2 == start {
            continue;
        }

        if is_free(graph, Some(hop2), HopMode::Swap, path) {
            let mut result = path.clone();
            result.push(current);
            result.push(next);
            result.push(hop2);
            out.push(result);
            continue;
        }

        path.push(current);
        path.push(next);
        dfs(graph, start, hop2, depth + 1, max_depth, path, out);
        path.pop();
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Role;
    use crate::streak::{StreakLog, StreakTime};
    use crate::timetable::{Counterpart, CourseInfo};
    use proptest::prelude::*;

    fn busy(log: &mut StreakLog, weekday: u8, period: u8, class: &str, teacher: &str) {
        log.roles.insert(class.to_owned(), Role::Class);
        log.roles.insert(teacher.to_owned(), Role::Teacher);
        log.entries.insert(
            (class.to_owned(), StreakTime::new(weekday, period, 1)),
            Some(CourseInfo {
                subject: "Math".to_owned(),
                counterpart: vec![Counterpart { participant: teacher.to_owned(), url: String::new() }],
            }),
        );
        log.entries.insert(
            (teacher.to_owned(), StreakTime::new(weekday, period, 1)),
            Some(CourseInfo {
                subject: "Math".to_owned(),
                counterpart: vec![Counterpart { participant: class.to_owned(), url: String::new() }],
            }),
        );
    }

    fn free_for_teacher(log: &mut StreakLog, weekday: u8, period: u8, teacher: &str) {
        log.roles.insert(teacher.to_owned(), Role::Teacher);
        log.entries.insert((teacher.to_owned(), StreakTime::new(weekday, period, 1)), None);
    }

    /// A chain requiring the inner DFS to recurse two levels deep before
    /// landing free, not just the one level a single hop needs.
    ///
    /// A is busy at (1,1) in class 101 with P1; that is `start`. The
    /// backward hop out of 101 lands on A's own node at (1,2) in class 102,
    /// busy with P2 -- one level of recursion (depth 0) resolves A free at
    /// (1,3) as the bwd-check but finds P2 still busy at (1,2) in class 103
    /// (paired with P3), so it must recurse again (depth 1) before P2's
    /// bwd-check (free at (1,4)) and P3's fwd-check (free at (1,2)) finally
    /// land. The forward side resolves directly: P1 is free on its own
    /// schedule at (1,1).
    fn two_level_swap_chain() -> SchedulingGraph {
        let mut log = StreakLog::default();
        busy(&mut log, 1, 1, "101", "A");
        busy(&mut log, 1, 2, "101", "P1");
        busy(&mut log, 1, 2, "102", "A");
        busy(&mut log, 1, 3, "102", "P2");
        busy(&mut log, 1, 2, "103", "P2");
        busy(&mut log, 1, 4, "103", "P3");
        free_for_teacher(&mut log, 1, 1, "P1");
        free_for_teacher(&mut log, 1, 3, "A");
        free_for_teacher(&mut log, 1, 4, "P2");
        free_for_teacher(&mut log, 1, 2, "P3");
        SchedulingGraph::build(&log).unwrap()
    }

    #[test]
    fn two_level_chain_needs_two_levels_of_recursion_to_resolve() {
        let graph = two_level_swap_chain();
        let start = NodeId(
            graph
                .courses
                .iter()
                .position(|c| c.time == StreakTime::new(1, 1, 1) && c.classes.contains_key("101"))
                .unwrap(),
        );

        assert!(swap(&graph, start, 0).is_empty(), "depth 0 can't even enter the first recursion level");
        assert!(swap(&graph, start, 1).is_empty(), "depth 1 resolves the bwd-check but not P2's still-busy hop");
        let paths = swap(&graph, start, 2);
        assert_eq!(paths.len(), 1, "depth 2 is enough for the chain to bottom out, got {paths:?}");
        assert_eq!(paths[0].len(), 8, "free(P3) -> busy(P3) -> busy(P2) -> free(P2) -> free(A) -> busy(P2,103) -> A(102) -> start");
    }

    proptest::proptest! {
        /// No chain `swap()` returns ever exceeds the edge count the DFS's
        /// own depth bound allows. Each recursive call contributes at most 2
        /// nodes to its side before a terminal call adds 3 more, and each
        /// side can recurse at most `max_depth` calls deep, so neither side's
        /// sub-path can exceed `2 * max_depth + 2` nodes -- unlike rotation's
        /// one-node-per-level cycles, a swap chain is not bounded by
        /// `max_depth + 1` edges directly.
        #[test]
        fn no_swap_chain_exceeds_the_depth_bound(max_depth in 0u32..6) {
            let graph = two_level_swap_chain();
            let start = NodeId(
                graph
                    .courses
                    .iter()
                    .position(|c| c.time == StreakTime::new(1, 1, 1) && c.classes.contains_key("101"))
                    .unwrap(),
            );

            for path in swap(&graph, start, max_depth) {
                let edges = path.len() as u32 - 1;
                prop_assert!(edges <= 4 * max_depth + 3, "chain of {} edges exceeds the depth-{max_depth} bound: {path:?}", edges);
            }
        }
    }

    #[test]
    fn class_with_a_single_course_has_no_swap_candidates() {
        let mut log = StreakLog::default();
        busy(&mut log, 1, 1, "101", "A");
        let graph = SchedulingGraph::build(&log).unwrap();
        let start = NodeId(0);

        assert!(swap(&graph, start, 3).is_empty());
    }

    #[test]
    fn neighbour_is_skipped_when_the_hop_has_no_enclosing_free_streak() {
        // A is busy at period 1 with nothing preceding it in the class, so
        // find_streak_start_if_free's backward walk is immediately empty;
        // any neighbour resolved through the absent-teacher-slot branch
        // must be skipped rather than produce a bogus chain.
        let mut log = StreakLog::default();
        busy(&mut log, 1, 1, "101", "A");
        busy(&mut log, 1, 2, "101", "B");
        let graph = SchedulingGraph::build(&log).unwrap();

        let start = NodeId(
            graph
                .courses
                .iter()
                .position(|c| c.time == StreakTime::new(1, 1, 1))
                .unwrap(),
        );

        assert!(swap(&graph, start, 3).is_empty());
    }
}
