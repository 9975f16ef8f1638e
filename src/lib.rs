//! Instagram→VK relay daemon.
//!
//! Polls an Instagram account for new posts and stories, stages each item's
//! bytes in a public bucket, republishes them to VK, and records delivery in
//! a SQLite ledger so restarts never double-publish.

pub mod config;
pub mod db;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod transfer;
pub mod vk;
pub mod worker;
