//! Crawl planning: the ordered (category x city) task queue

mod planner;

pub use planner::{CrawlPlanner, SearchTask, TaskStatus};
