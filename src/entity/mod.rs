//! Database entity models for greeting-reel.
//!
//! Each submodule is the Sea-ORM definition of one table. Rows are plain
//! CRUD records; the only invariants are the unique `session_id` on
//! [`video`] and the `paid -> finished | error` status order enforced by
//! [`crate::videos::VideoStore`].

/// Fixed-window counters, one row per `action:ip` key.
pub mod rate_limit;

/// Paid video orders and their rendering state.
pub mod video;

/// Append-only analytics events.
pub mod analytics_event;

/// Append-only page views.
pub mod page_view;
