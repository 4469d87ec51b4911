//! Rotation Search (C8) — DFS for cycles through a class's clique (§4.8).

use super::hop::{get_1_hop, is_free, HopDirection, HopMode};
use super::{NodeId, SchedulingGraph};
use std::collections::HashSet;

/// Enumerate every simple cycle starting and ending at `start`, up to
/// `max_depth` edges. Neighbours of a course are every other course in the
/// same class (`class.courses.values()`); an edge is feasible only when the
/// corresponding hop lands on a free node (§4.8).
pub fn rotation(graph: &SchedulingGraph, start: NodeId, max_depth: u32) -> Vec<Vec<NodeId>> {
    let mut cycles = Vec::new();
    let mut path = vec![start];
    let mut visited = HashSet::new();
    visit(graph, start, start, 0, max_depth, &mut path, &mut visited, &mut cycles);
    cycles
}

fn visit(
    graph: &SchedulingGraph,
    start: NodeId,
    current: NodeId,
    depth: u32,
    max_depth: u32,
    path: &mut Vec<NodeId>,
    visited: &mut HashSet<NodeId>,
    out: &mut Vec<Vec<NodeId>>,
) {
    if depth >= max_depth {
        return;
    }
    let Some(class_id) = graph.course(current).classes.values().next().copied() else {
        return;
    };

    for &neighbor in graph.class(class_id).courses.values() {
        let hop = get_1_hop(graph, current, neighbor, HopDirection::Bwd, HopMode::Rotation, &[]);
        let feasible = hop.is_some_and(|h| is_free(graph, Some(h), HopMode::Rotation, &[]));
        if !feasible {
            continue;
        }

        if neighbor == start {
            let mut cycle = path.clone();
            cycle.push(start);
            out.push(cycle);
            continue;
        }
        if visited.contains(&neighbor) {
            continue;
        }

        visited.insert(neighbor);
        path.push(neighbor);
        visit(graph, start, neighbor, depth + 1, max_depth, path, visited, out);
        path.pop();
        visited.remove(&neighbor);
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

    /// Four teachers all busy in the same class/weekday at periods 1-4,
    /// everywhere else free: a complete clique of 4 course nodes. Each
    /// teacher's free periods are registered on their own schedule too, so
    /// every cross-teacher hop resolves via the present-and-free branch.
    fn four_clique() -> SchedulingGraph {
        let mut log = StreakLog::default();
        busy(&mut log, 1, 1, "101", "A");
        busy(&mut log, 1, 2, "101", "B");
        busy(&mut log, 1, 3, "101", "C");
        busy(&mut log, 1, 4, "101", "D");
        for &(teacher, own_period) in &[("A", 1u8), ("B", 2), ("C", 3), ("D", 4)] {
            for period in 1..=4u8 {
                if period != own_period {
                    free_for_teacher(&mut log, 1, period, teacher);
                }
            }
        }
        SchedulingGraph::build(&log).unwrap()
    }

    #[test]
    fn depth_bound_excludes_the_longest_cycles() {
        let graph = four_clique();
        let start = graph
            .courses
            .iter()
            .position(|c| c.time == StreakTime::new(1, 1, 1))
            .unwrap();

        let unbounded = rotation(&graph, NodeId(start), 5);
        assert_eq!(unbounded.len(), 15, "3 two-cycles + 6 three-cycles + 6 four-cycles");

        let bounded = rotation(&graph, NodeId(start), 3);
        assert_eq!(bounded.len(), 9, "3 two-cycles + 6 three-cycles, no 4-cycles");
    }

    #[test]
    fn every_cycle_starts_and_ends_at_start() {
        let graph = four_clique();
        let start = graph
            .courses
            .iter()
            .position(|c| c.time == StreakTime::new(1, 1, 1))
            .unwrap();

        for cycle in rotation(&graph, NodeId(start), 5) {
            assert_eq!(cycle.first(), Some(&NodeId(start)));
            assert_eq!(cycle.last(), Some(&NodeId(start)));
        }
    }

    proptest::proptest! {
        /// No cycle's edge count ever exceeds the requested `max_depth`,
        /// whatever depth is asked for (§8 depth bound).
        #[test]
        fn no_cycle_exceeds_the_requested_depth(max_depth in 0u32..6) {
            let graph = four_clique();
            let start = graph
                .courses
                .iter()
                .position(|c| c.time == StreakTime::new(1, 1, 1))
                .unwrap();

            for cycle in rotation(&graph, NodeId(start), max_depth) {
                prop_assert!(cycle.len() as u32 - 1 <= max_depth);
            }
        }
    }
}
