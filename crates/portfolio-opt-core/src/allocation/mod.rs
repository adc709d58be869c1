pub mod deriver;

pub use deriver::{allocate, derive_allocation, AllocationInput, AllocationResult, AssetAllocation};
