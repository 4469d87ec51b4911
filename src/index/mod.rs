//! Index Fetcher & Parser (C2) — directory pages → `category → id → TargetInfo`.

pub mod crawler;

use crate::identify::Role as IdentifyRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use crawler::IndexCrawler;

/// `teacher` iff the url stem begins with `T` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Class,
}

impl From<Role> for IdentifyRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Teacher => IdentifyRole::Teacher,
            Role::Class => IdentifyRole::Class,
        }
    }
}

/// The canonical identity of a teacher or class (§3).
///
/// Two `TargetInfo`s are equal iff their `id` is equal — `id` is the URL
/// stem (e.g. `TA01`, `C101307`), derived once at parse time and immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub target: String,
    pub category: String,
    pub url: String,
    pub role: Role,
    pub id: String,
    pub id_prefix: String,
    pub id_suffix: String,
}

impl PartialEq for TargetInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for TargetInfo {}

impl TargetInfo {
    /// Derive role/id/prefix/suffix from a display name, category, and the
    /// relative URL the directory page links to (e.g. `"TA01.html"`).
    pub fn from_url(target: String, category: String, url: String) -> Self {
        let stem = url
            .rsplit('/')
            .next()
            .unwrap_or(&url)
            .trim_end_matches(".html")
            .trim_end_matches(".HTML")
            .to_owned();
        let role = if stem.starts_with('T') {
            Role::Teacher
        } else {
            Role::Class
        };
        let (id_prefix, id_suffix) = split_prefix_suffix(&stem);
        TargetInfo {
            target,
            category,
            url,
            role,
            id: stem,
            id_prefix,
            id_suffix,
        }
    }
}

/// Split an id like `TA01` into a leading-letters prefix (`TA`) and trailing
/// digits suffix (`01`); ids with no trailing digits get an empty suffix.
fn split_prefix_suffix(id: &str) -> (String, String) {
    let split_at = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    (id[..split_at].to_owned(), id[split_at..].to_owned())
}

pub type CategoryMap = HashMap<String, HashMap<String, TargetInfo>>;

/// A mapping `category → id → TargetInfo` for each of `teacher` and `class`,
/// plus the denormalised lookup views §3 specifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub teacher: CategoryMap,
    pub class: CategoryMap,
    pub last_update: DateTime<Utc>,
    pub base_url: String,

    pub id_to_info: HashMap<String, TargetInfo>,
    pub target_to_unique_info: HashMap<String, TargetInfo>,
    pub target_to_conflicting_ids: HashMap<String, Vec<String>>,
}

impl Index {
    /// Build the denormalised views from the two category maps (§4.2:
    /// unchanged-first-wins then promote-to-conflict on second sighting).
    pub fn build(teacher: CategoryMap, class: CategoryMap, last_update: DateTime<Utc>, base_url: String) -> Self {
        let mut id_to_info = HashMap::new();
        let mut target_to_unique_info: HashMap<String, TargetInfo> = HashMap::new();
        let mut target_to_conflicting_ids: HashMap<String, Vec<String>> = HashMap::new();

        for map in [&teacher, &class] {
            for categories in map.values() {
                for info in categories.values() {
                    id_to_info.insert(info.id.clone(), info.clone());

                    if let Some(conflicts) = target_to_conflicting_ids.get_mut(&info.target) {
                        if !conflicts.contains(&info.id) {
                            conflicts.push(info.id.clone());
                        }
                        continue;
                    }
                    match target_to_unique_info.get(&info.target) {
                        None => {
                            target_to_unique_info.insert(info.target.clone(), info.clone());
                        }
                        Some(existing) if existing.id == info.id => {}
                        Some(existing) => {
                            let existing_id = existing.id.clone();
                            target_to_unique_info.remove(&info.target);
                            target_to_conflicting_ids
                                .insert(info.target.clone(), vec![existing_id, info.id.clone()]);
                        }
                    }
                }
            }
        }

        Index {
            teacher,
            class,
            last_update,
            base_url,
            id_to_info,
            target_to_unique_info,
            target_to_conflicting_ids,
        }
    }

    /// All targets across both roles, for bulk preload.
    pub fn all_targets(&self) -> Vec<&TargetInfo> {
        self.id_to_info.values().collect()
    }
}
