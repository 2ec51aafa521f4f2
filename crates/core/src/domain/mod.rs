pub mod contract;
pub mod recommendation;
pub mod snapshot;
pub mod view;
pub mod watchlist;
