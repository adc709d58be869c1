pub mod allocate;
pub mod metrics;
pub mod optimize;
pub mod returns;
