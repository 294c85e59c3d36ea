pub mod client;
pub mod model;
pub mod store;

pub use client::OhlcvClient;
pub use model::OhlcvJob;
pub use store::OhlcvStore;
