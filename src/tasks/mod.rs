pub mod client;
pub mod filters;
pub mod model;
pub mod store;

pub use client::TaskClient;
pub use filters::TaskFilters;
pub use store::TaskStore;
