//! Event-replay ledger analysis: replays a date-ordered personal
//! transaction ledger into aggregation buckets, maintains a capital event
//! trail per priced holding, and computes income and capital gains tax
//! through progressive bands with top-slicing relief for chargeable gains.

pub mod accounts;
pub mod analysis;
pub mod buckets;
pub mod capital;
pub mod config;
pub mod events;
pub mod prices;
pub mod replay;
pub mod rollup;
pub mod tax;
