//! A bipartite teacher/class scheduling graph: fetch and cache weekly
//! timetables, compress them into streak logs, and search the resulting
//! graph for feasible teacher rotations and slot swaps.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod http;
pub mod identify;
pub mod index;
pub mod logging;
pub mod scheduling;
pub mod streak;
pub mod timetable;
pub mod utils;

pub use config::Config;
pub use error::{CacheError, Error, FetchError, LookupError, Result, ValidationError};
pub use graph::{ClassId, CourseNode, NodeId, SchedulingGraph, TeacherId};
pub use scheduling::SchedulingEngine;
