//! Data models for Haulscope

mod contract;
mod dashboard;
mod filter;
mod fleet;
mod metrics;
mod principal;
mod scope;
mod technical;
mod trip;
mod violation;

pub use contract::*;
pub use dashboard::*;
pub use filter::*;
pub use fleet::*;
pub use metrics::*;
pub use principal::*;
pub use scope::*;
pub use technical::*;
pub use trip::*;
pub use violation::*;
