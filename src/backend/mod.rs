//! The two backend engines behind the dispatch layer
//!
//! Each submodule mirrors one native engine ABI: its configuration record,
//! its status codes, and the traits an embedder implements to wire the real
//! engine in. Both keep their own process-wide plan cache.

pub mod clf;
pub mod vkf;
