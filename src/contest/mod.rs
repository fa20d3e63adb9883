//! Contest context manager and standings manager.

pub mod context;
pub mod standings;

pub use context::{build_context, ContestContext};
pub use standings::{build_standings, ContestStandings, StandingsColumn, StandingsInput, StandingsRow};
