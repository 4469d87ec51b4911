//! Orchestrator (C10) — the public facade tying index, timetable, cache, and
//! graph layers into three calls: locate a course, rotate it, or swap it
//! (§4.10).

use crate::cache::{preload, safe_filename, ReadThroughCache};
use crate::config::Config;
use crate::error::{Error, LookupError};
use crate::graph::{rotation, swap, NodeId, SchedulingGraph, TeacherId};
use crate::http;
use crate::index::{Index, IndexCrawler, TargetInfo};
use crate::streak::{build_streak_log_dict, StreakTime};
use crate::timetable::{Timetable, TimetableCrawler};
use crate::utils::log_if_slow;
use futures::stream::{self, StreamExt};
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

/// Rebuilding the whole graph touches every timetable; anything past this is
/// worth a warning even though it isn't an error (§4.10 supplement).
const SLOW_REBUILD_THRESHOLD: Duration = Duration::from_secs(5);

/// Whole-operation retries around the initial index fetch, distinct from
/// the HTTP client's own per-request back-off (§4.4 supplement).
const OUTER_INDEX_FETCH_ATTEMPTS: u32 = 2;

/// Owns the HTTP clients, the two cache tiers, and the lazily-built
/// scheduling graph. One instance is meant to live for the process (or test)
/// lifetime; `refresh=true` on any call rebuilds everything from source.
pub struct SchedulingEngine {
    config: Config,
    index_crawler: IndexCrawler,
    timetable_crawler: TimetableCrawler,
    index_cache: ReadThroughCache<Index>,
    timetable_cache: ReadThroughCache<Timetable>,
    graph: RwLock<Option<Arc<SchedulingGraph>>>,
}

impl SchedulingEngine {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let index_client = build_index_client(&config)?;
        let timetable_client = build_timetable_client(&config)?;
        let index_crawler = IndexCrawler::new(index_client, config.base_url.clone());
        let timetable_crawler = TimetableCrawler::new(timetable_client);
        let index_cache = ReadThroughCache::new(format!("{}/index", config.cache_dir));
        let timetable_cache = ReadThroughCache::new(format!("{}/timetables", config.cache_dir));

        Ok(SchedulingEngine {
            config,
            index_crawler,
            timetable_crawler,
            index_cache,
            timetable_cache,
            graph: RwLock::new(None),
        })
    }

    /// Locate the streak-start `CourseNode` a query slot belongs to. Fails
    /// if the teacher is unknown or the slot resolves to a free period (§4.10).
    pub async fn fetch_course_node(
        &self,
        teacher_name: &str,
        weekday: u8,
        period: u8,
        refresh: bool,
    ) -> Result<(Arc<SchedulingGraph>, NodeId), Error> {
        let graph = self.graph(refresh).await?;
        let teacher_id = graph
            .teacher_id(teacher_name)
            .ok_or_else(|| LookupError::UnknownTeacher(teacher_name.to_owned()))?;
        let node_id = locate_streak_start(&graph, teacher_id, weekday, period)
            .ok_or_else(|| LookupError::FreePeriod { teacher: teacher_name.to_owned(), weekday, period })?;
        Ok((graph, node_id))
    }

    /// Resolve the query slot, then enumerate rotation cycles (§4.8, §4.10).
    pub async fn rotation(
        &self,
        teacher_name: &str,
        weekday: u8,
        period: u8,
        max_depth: Option<u32>,
        refresh: bool,
    ) -> Result<Vec<Vec<NodeId>>, Error> {
        let (graph, node_id) = self.fetch_course_node(teacher_name, weekday, period, refresh).await?;
        let depth = max_depth.unwrap_or(self.config.default_max_depth);
        Ok(rotation::rotation(&graph, node_id, depth))
    }

    /// Resolve the query slot, then enumerate swap chains (§4.9, §4.10).
    pub async fn swap(
        &self,
        teacher_name: &str,
        weekday: u8,
        period: u8,
        max_depth: Option<u32>,
        refresh: bool,
    ) -> Result<Vec<Vec<NodeId>>, Error> {
        let (graph, node_id) = self.fetch_course_node(teacher_name, weekday, period, refresh).await?;
        let depth = max_depth.unwrap_or(self.config.default_max_depth);
        Ok(swap::swap(&graph, node_id, depth))
    }

    /// Reuse the in-memory graph unless `refresh` forces a rebuild from the
    /// index down through every timetable (§4.10 refresh semantics).
    async fn graph(&self, refresh: bool) -> Result<Arc<SchedulingGraph>, Error> {
        if !refresh {
            if let Some(graph) = self.graph.read().await.as_ref() {
                return Ok(graph.clone());
            }
        }
        let built = Arc::new(self.build_graph(refresh).await?);
        *self.graph.write().await = Some(built.clone());
        Ok(built)
    }

    async fn build_graph(&self, refresh: bool) -> Result<SchedulingGraph, Error> {
        let start = Instant::now();
        let index = self.index(refresh).await?;
        let timetables = self.fetch_all_timetables(&index, refresh).await;
        let owned: Vec<Timetable> = timetables.iter().map(|t| (**t).clone()).collect();
        let log = build_streak_log_dict(&owned)?;
        let graph = SchedulingGraph::build(&log)?;
        log_if_slow(start, SLOW_REBUILD_THRESHOLD, "scheduling graph rebuild");
        Ok(graph)
    }

    async fn index(&self, refresh: bool) -> Result<Arc<Index>, Error> {
        let retry_delay = self.config.index_retry_min;
        let cached = self
            .index_cache
            .fetch("index", "index.json", refresh, || async {
                preload::fetch_index_with_outer_retry(OUTER_INDEX_FETCH_ATTEMPTS, retry_delay, || async {
                    self.index_crawler.fetch().await.map_err(Error::from)
                })
                .await
            })
            .await?;
        Ok(cached.data)
    }

    /// Fetch every target's timetable with bounded concurrency, skipping
    /// (and logging) any target whose retries are exhausted (§4.4).
    async fn fetch_all_timetables(&self, index: &Index, refresh: bool) -> Vec<Arc<Timetable>> {
        let concurrency = self.config.preload_max_concurrent.max(1);
        let targets: Vec<TargetInfo> = index.all_targets().into_iter().cloned().collect();
        let base_url = index.base_url.clone();

        let results = stream::iter(targets)
            .map(|info| {
                let base_url = base_url.clone();
                async move {
                    let file_name = format!("{}.json", safe_filename(&info.id));
                    let cache_key = info.id.clone();
                    let fetched = self
                        .timetable_cache
                        .fetch(&cache_key, &file_name, refresh, || async {
                            self.timetable_crawler.fetch(&info, &base_url).await
                        })
                        .await;
                    (info.id, fetched)
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut timetables = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(cached) => timetables.push(cached.data),
                Err(e) => warn!(target = id, error = %e, "failed to fetch timetable, skipping"),
            }
        }
        timetables
    }
}

fn build_index_client(config: &Config) -> anyhow::Result<ClientWithMiddleware> {
    http::build_client(
        config.request_timeout,
        config.index_retry_attempts,
        config.index_retry_min,
        config.index_retry_max,
    )
}

fn build_timetable_client(config: &Config) -> anyhow::Result<ClientWithMiddleware> {
    http::build_client(
        config.request_timeout,
        config.timetable_retry_attempts,
        config.timetable_retry_min,
        config.timetable_retry_max,
    )
}

/// Walk `weekday`'s row backward from `period` toward 1 looking for the
/// nearest streak-start the teacher has a lesson registered at; `None` if
/// that streak doesn't actually reach `period` (free gap) or none exists.
fn locate_streak_start(graph: &SchedulingGraph, teacher_id: TeacherId, weekday: u8, period: u8) -> Option<NodeId> {
    let teacher = graph.teacher(teacher_id);
    for p in (1..=period).rev() {
        let probe = StreakTime::new(weekday, p, 1);
        let Some(&node_id) = teacher.courses.get(&probe) else {
            continue;
        };
        let node = graph.course(node_id);
        let covers_query = p as u16 + node.time.streak as u16 - 1 >= period as u16;
        return if covers_query { Some(node_id) } else { None };
    }
    None
}
