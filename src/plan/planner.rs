//! Crawl planner
//!
//! Expands the configured categories and cities into the full ordered task
//! list once, then hands tasks out and tracks their status. Ordering is
//! stable and reproducible: category-major, cities in configured order.
//! On resume, tasks named in the checkpoint's completed set are pre-marked
//! Done so their quota is never re-spent.

use crate::config::Config;
use std::collections::HashSet;

/// Lifecycle of one search task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InFlight,
    /// Terminal; a search that returned nothing is still Done
    Done,
    /// Retry budget exhausted; eligible for one re-attempt pass at end of run
    Failed,
}

/// One (category, city) search unit in the crawl plan
#[derive(Debug, Clone)]
pub struct SearchTask {
    /// Term sent upstream (e.g. "makeup")
    pub category_term: String,

    /// Display category recorded on accepted records
    pub display_category: String,

    /// Niche tag recorded on accepted records
    pub niche: String,

    pub city: String,
    pub country: String,

    /// Full query string sent to the search endpoint
    pub query: String,

    pub status: TaskStatus,
}

impl SearchTask {
    /// Stable task identity used in checkpoints
    pub fn id(&self) -> String {
        format!("{}::{}", self.category_term, self.city)
    }
}

/// Owns the full ordered task list for one run
pub struct CrawlPlanner {
    tasks: Vec<SearchTask>,
}

impl CrawlPlanner {
    /// Builds the task list from the configured cross product
    ///
    /// A category with an explicit city list is paired with those cities in
    /// the listed order; otherwise with every configured city in config
    /// order.
    pub fn new(config: &Config) -> Self {
        let mut tasks = Vec::new();

        for category in &config.category {
            let cities: Vec<&str> = if category.cities.is_empty() {
                config.city.iter().map(|c| c.name.as_str()).collect()
            } else {
                category.cities.iter().map(|c| c.as_str()).collect()
            };

            for city in cities {
                tasks.push(SearchTask {
                    category_term: category.term.clone(),
                    display_category: category.display.clone(),
                    niche: category.niche.clone(),
                    city: city.to_string(),
                    country: config.country_for_city(city),
                    query: format!("{} {}", city, category.term),
                    status: TaskStatus::Pending,
                });
            }
        }

        Self { tasks }
    }

    /// Pre-marks tasks from a checkpoint's completed set as Done
    ///
    /// Returns the ids that name no task in the current plan (the plan
    /// changed since the checkpoint was written). Callers must carry those
    /// ids forward into future checkpoints: dropping them would shrink the
    /// completed set on disk and discard spent quota.
    pub fn prime_completed(&mut self, completed_ids: &HashSet<String>) -> Vec<String> {
        let mut primed: HashSet<&String> = HashSet::new();
        for task in &mut self.tasks {
            if let Some(id) = completed_ids.get(&task.id()) {
                task.status = TaskStatus::Done;
                primed.insert(id);
            }
        }
        if !primed.is_empty() {
            tracing::info!(
                "Resumed plan: {} of {} tasks already completed",
                primed.len(),
                self.tasks.len()
            );
        }

        completed_ids
            .iter()
            .filter(|id| !primed.contains(id))
            .cloned()
            .collect()
    }

    /// Hands out the next pending task, marking it InFlight
    pub fn next_pending(&mut self) -> Option<SearchTask> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::Pending)?;
        task.status = TaskStatus::InFlight;
        Some(task.clone())
    }

    /// Marks the task with the given id as Done
    pub fn mark_done(&mut self, id: &str) {
        self.set_status(id, TaskStatus::Done);
    }

    /// Marks the task with the given id as Failed
    pub fn mark_failed(&mut self, id: &str) {
        self.set_status(id, TaskStatus::Failed);
    }

    /// Returns an InFlight task to Pending (e.g. on interrupted shutdown)
    pub fn release(&mut self, id: &str) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id() == id) {
            if task.status == TaskStatus::InFlight {
                task.status = TaskStatus::Pending;
            }
        }
    }

    fn set_status(&mut self, id: &str, status: TaskStatus) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id() == id) {
            task.status = status;
        }
    }

    /// Moves every Failed task back to Pending for the end-of-run retry pass
    ///
    /// Returns how many tasks were reset.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for task in &mut self.tasks {
            if task.status == TaskStatus::Failed {
                task.status = TaskStatus::Pending;
                reset += 1;
            }
        }
        reset
    }

    /// Ids of all completed tasks, in plan order
    pub fn completed_ids(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .map(|t| t.id())
            .collect()
    }

    /// Ids of all failed tasks, in plan order
    pub fn failed_ids(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    pub fn done_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count()
    }
}
