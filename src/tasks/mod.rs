//! Background Tasks Module
//!
//! Contains the background task that runs for the lifetime of a cache.
//!
//! # Tasks
//! - Expiration sweeper: collects the due buckets of expired entries on
//!   every tick

mod sweeper;

pub(crate) use sweeper::{spawn_sweep_task, SweeperHandle};
