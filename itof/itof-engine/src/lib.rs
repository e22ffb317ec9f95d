//! Stateful per-FOV accumulation, whole-frame DSP scheduling, and ROI
//! routing for the iTOF raw-to-depth pipeline.
//!
//! [`FovRouter`] is the entry point: it decodes each incoming ROI's
//! metadata, dispatches it to up to 8 lazily-created per-FOV engines
//! ([`grid_engine::GridEngine`] for multi-ROI FOVs, [`stripe_engine::StripeEngine`]
//! for single-ROI FOVs), and exposes completed [`segment::Segment`]s by poll.

pub mod config;
pub mod error;
pub mod freq_table;
pub mod grid_engine;
pub mod hdr;
pub mod raw_dump;
pub mod raw_roi;
pub mod router;
pub mod segment;
pub mod stripe_engine;
pub mod temp_comp;

pub use config::Config;
pub use error::{Error, Result};
pub use router::{FovRouter, RouterHandle};
pub use segment::Segment;
