//! Hop Predicates (C7) — the feasibility core of every move (§4.7).

use super::{ClassId, CourseNode, NodeId, SchedulingGraph};
use crate::streak::StreakTime;

/// Which search is asking. Rotation never treats a path-released node as
/// free; swap does, via its freed-set (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopMode {
    Rotation,
    Swap,
}

/// `bwd` evaluates the move as proposed; `fwd` evaluates the symmetric case
/// by swapping `src`/`dst` before delegating (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopDirection {
    Bwd,
    Fwd,
}

/// `true` iff `node` is intrinsically free, or (`mode == Swap` and `node` is
/// in the caller's freed-set — nodes the in-progress path would vacate).
pub fn is_free(graph: &SchedulingGraph, node: Option<NodeId>, mode: HopMode, freed: &[NodeId]) -> bool {
    match node {
        None => false,
        Some(id) => {
            let node = graph.course(id);
            node.is_free || (mode == HopMode::Swap && freed.contains(&id))
        }
    }
}

/// Walk `class`'s slot map backward from `course.time.period` toward 1,
/// looking for an enclosing free streak long enough to subsume the queried
/// range. `period` is 1-based; the walk never goes below 1, and skips over
/// periods that aren't themselves a streak-start (§4.7).
///
/// Called from `get_1_hop`'s absent branch with `course = src`, which is
/// always a busy node — any free run this finds necessarily ends strictly
/// before `src`'s own position, so the length check can never pass. Every
/// realistic case is resolved earlier, by a teacher's own free periods
/// being directly visible on their `courses` map (see `SchedulingGraph::build`);
/// this fallback exists for the literal contract and for callers that probe
/// it directly, not because rotation/swap rely on it succeeding.
pub fn find_streak_start_if_free(graph: &SchedulingGraph, class_id: ClassId, course: &CourseNode) -> Option<NodeId> {
    let class = graph.class(class_id);
    let weekday = course.time.weekday;
    let period = course.time.period;

    for i in (1..period).rev() {
        let probe = StreakTime::new(weekday, i, 1);
        if let Some(&node_id) = class.courses.get(&probe) {
            let candidate = graph.course(node_id);
            return if candidate.is_free
                && (candidate.time.streak as u16) >= (period - i) as u16 + course.time.streak as u16
            {
                Some(node_id)
            } else {
                None
            };
        }
    }
    None
}

/// Compute the node that would be displaced if `src`'s teacher took `dst`'s
/// time slot. `direction == Fwd` evaluates the symmetric case by swapping
/// `src`/`dst` first (§4.7).
pub fn get_1_hop(
    graph: &SchedulingGraph,
    src: NodeId,
    dst: NodeId,
    direction: HopDirection,
    mode: HopMode,
    freed: &[NodeId],
) -> Option<NodeId> {
    let (src, dst) = match direction {
        HopDirection::Bwd => (src, dst),
        HopDirection::Fwd => (dst, src),
    };
    let src_node = graph.course(src);
    let dst_node = graph.course(dst);
    let tau = dst_node.time;

    let teacher_name = src_node.sole_teacher()?;
    let teacher_id = graph.teacher_id(teacher_name)?;
    let teacher = graph.teacher(teacher_id);

    match teacher.courses.get(&tau) {
        None => {
            let class_id = *src_node.classes.values().next()?;
            let candidate = find_streak_start_if_free(graph, class_id, src_node)?;
            if is_free(graph, Some(candidate), mode, freed) {
                Some(candidate)
            } else {
                None
            }
        }
        Some(&node_id) => {
            let node = graph.course(node_id);
            if node.is_free {
                (node.time.streak >= tau.streak).then_some(node_id)
            } else {
                (node.time.streak == tau.streak).then_some(node_id)
            }
        }
    }
}
