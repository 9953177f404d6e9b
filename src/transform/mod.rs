//! Column-level cleaning transforms.

pub mod dedupe;
pub mod outliers;
pub mod text;
pub mod time;
