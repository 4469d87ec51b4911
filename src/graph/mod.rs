//! Scheduling Graph (C6) — arena-owned `CourseNode`/`TeacherNode`/`ClassNode`
//! built from a streak log, with hop predicates (§4.6) and search (§4.8-4.9).
//!
//! Nodes live in flat `Vec`s indexed by newtype ids rather than in an
//! `Rc<RefCell<_>>` cycle: the bipartite cross-references between courses,
//! teachers, and classes would otherwise require either reference-counted
//! cycles or unsafe aliasing, and a graph built this way is naturally
//! `Send + Sync`, so a materialised graph can be searched from multiple
//! tasks without extra synchronisation.

pub mod hop;
pub mod rotation;
pub mod swap;

use crate::error::ValidationError;
use crate::index::Role;
use crate::streak::{StreakLog, StreakTime};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeacherId(pub usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

/// One lesson block. `is_free` nodes have no teacher; valid-for-scheduling
/// busy nodes have exactly one teacher and one class (§3 invariant b).
#[derive(Debug, Clone)]
pub struct CourseNode {
    pub time: StreakTime,
    pub is_free: bool,
    pub subject: String,
    pub teachers: HashMap<String, TeacherId>,
    pub classes: HashMap<String, ClassId>,
}

impl CourseNode {
    /// Valid for scheduling iff at most one of each side is attached (§3b).
    pub fn is_scheduling_eligible(&self) -> bool {
        self.teachers.len() <= 1 && self.classes.len() <= 1
    }

    pub fn sole_teacher(&self) -> Option<&str> {
        if self.teachers.len() == 1 {
            self.teachers.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn sole_class(&self) -> Option<&str> {
        if self.classes.len() == 1 {
            self.classes.keys().next().map(String::as_str)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeacherNode {
    pub name: String,
    pub courses: HashMap<StreakTime, NodeId>,
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub code: String,
    pub courses: HashMap<StreakTime, NodeId>,
}

/// The bipartite scheduling graph: immutable once built, rebuilt wholesale
/// from a fresh streak log on `refresh` (§3 ownership/lifetime note).
#[derive(Debug, Clone, Default)]
pub struct SchedulingGraph {
    pub courses: Vec<CourseNode>,
    pub teachers: Vec<TeacherNode>,
    pub classes: Vec<ClassNode>,
    pub teacher_index: HashMap<String, TeacherId>,
    pub class_index: HashMap<String, ClassId>,
}

impl SchedulingGraph {
    pub fn course(&self, id: NodeId) -> &CourseNode {
        &self.courses[id.0]
    }

    pub fn teacher(&self, id: TeacherId) -> &TeacherNode {
        &self.teachers[id.0]
    }

    pub fn class(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.0]
    }

    pub fn teacher_id(&self, name: &str) -> Option<TeacherId> {
        self.teacher_index.get(name).copied()
    }

    pub fn class_id(&self, code: &str) -> Option<ClassId> {
        self.class_index.get(code).copied()
    }

    fn ensure_teacher(&mut self, name: &str) -> TeacherId {
        if let Some(id) = self.teacher_index.get(name) {
            return *id;
        }
        let id = TeacherId(self.teachers.len());
        self.teachers.push(TeacherNode { name: name.to_owned(), courses: HashMap::new() });
        self.teacher_index.insert(name.to_owned(), id);
        id
    }

    fn ensure_class(&mut self, code: &str) -> ClassId {
        if let Some(id) = self.class_index.get(code) {
            return *id;
        }
        let id = ClassId(self.classes.len());
        self.classes.push(ClassNode { code: code.to_owned(), courses: HashMap::new() });
        self.class_index.insert(code.to_owned(), id);
        id
    }

    fn push_course(&mut self, node: CourseNode) -> NodeId {
        let id = NodeId(self.courses.len());
        self.courses.push(node);
        id
    }

    /// Build the graph from a combined streak log (§4.6, extended). The
    /// class-side entries drive the busy/free nodes a class's clique is
    /// made of; the teacher-side entry at the same streak is consulted as a
    /// cross-check for busy cells.
    ///
    /// A teacher's own free streaks are *also* turned into nodes wired into
    /// that teacher's `courses` map alone (no class attached). Without this,
    /// `get_1_hop` could never observe "the moving teacher is free at τ"
    /// directly — every cross-teacher hop would fall through to the
    /// streak-search fallback and rotation/swap would never find a move.
    /// This generalises the class-only reading of §4.6's literal text to
    /// keep §4.7-4.9 (which assume a teacher's free periods are visible on
    /// their own `courses` map) actually reachable; see DESIGN.md.
    pub fn build(log: &StreakLog) -> Result<SchedulingGraph, ValidationError> {
        let mut graph = SchedulingGraph::default();

        for ((source, streak_time), course_info) in &log.entries {
            if log.roles.get(source) != Some(&Role::Class) {
                continue;
            }
            let class_code = source;

            match course_info {
                None => {
                    let class_id = graph.ensure_class(class_code);
                    let node_id = graph.push_course(CourseNode {
                        time: *streak_time,
                        is_free: true,
                        subject: String::new(),
                        teachers: HashMap::new(),
                        classes: HashMap::from([(class_code.clone(), class_id)]),
                    });
                    graph.classes[class_id.0].courses.insert(*streak_time, node_id);
                }
                Some(course_info) => {
                    if course_info.counterpart.len() != 1 {
                        continue;
                    }
                    let teacher_name = &course_info.counterpart[0].participant;

                    let teacher_key = (teacher_name.clone(), *streak_time);
                    let Some(Some(teacher_side)) = log.entries.get(&teacher_key) else {
                        continue;
                    };
                    if teacher_side.counterpart.len() != 1
                        || teacher_side.counterpart[0].participant != *class_code
                        || teacher_side.subject != course_info.subject
                    {
                        continue;
                    }

                    let teacher_id = graph.ensure_teacher(teacher_name);
                    let class_id = graph.ensure_class(class_code);
                    let node_id = graph.push_course(CourseNode {
                        time: *streak_time,
                        is_free: false,
                        subject: course_info.subject.clone(),
                        teachers: HashMap::from([(teacher_name.clone(), teacher_id)]),
                        classes: HashMap::from([(class_code.clone(), class_id)]),
                    });
                    graph.teachers[teacher_id.0].courses.insert(*streak_time, node_id);
                    graph.classes[class_id.0].courses.insert(*streak_time, node_id);
                }
            }
        }

        for ((source, streak_time), course_info) in &log.entries {
            if log.roles.get(source) != Some(&Role::Teacher) || course_info.is_some() {
                continue;
            }
            let teacher_id = graph.ensure_teacher(source);
            if graph.teachers[teacher_id.0].courses.contains_key(streak_time) {
                continue;
            }
            let node_id = graph.push_course(CourseNode {
                time: *streak_time,
                is_free: true,
                subject: String::new(),
                teachers: HashMap::from([(source.clone(), teacher_id)]),
                classes: HashMap::new(),
            });
            graph.teachers[teacher_id.0].courses.insert(*streak_time, node_id);
        }

        Ok(graph)
    }
}
