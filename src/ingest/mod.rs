//! Feed ingestion.
//!
//! Submodules:
//! - `waqi`: the live WAQI "feed by location" client and the `FeedSource`
//!   seam the render cycle fetches through.

pub mod waqi;
