//! Remote rendering: edit documents, the service client, and job polling.

mod client;
mod monitor;
mod timeline;

pub use client::{
    JobState, RenderClient, RenderError, RenderStatus, SHOTSTACK_API_BASE_URL,
    SHOTSTACK_API_KEY_ENV,
};
pub use monitor::{monitor_render, MonitorOptions, MonitorOutcome};
pub use timeline::{Asset, Clip, Edit, EditSpec, Output, Timeline, Track};
