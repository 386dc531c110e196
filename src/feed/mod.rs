//! Timeline assembly: paging, follow-based visibility, and relative timestamps.

pub mod pagination;
pub mod posts;
pub mod query;
pub mod relative_time;

pub use pagination::{Page, PageQuery, PageRequest, ProfilePagination};
pub use query::{FeedItem, FeedMode};
pub use relative_time::parse_and_format_time;
