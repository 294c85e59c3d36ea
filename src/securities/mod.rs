pub mod client;
pub mod filters;
pub mod model;
pub mod store;

pub use client::SecurityClient;
pub use filters::SecurityFilters;
pub use store::SecurityStore;
