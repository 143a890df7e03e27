pub mod error;
pub mod ewma;
pub mod history;
pub mod matchup;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod stats;
