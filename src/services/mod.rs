pub mod alerting;
pub mod orchestrator;
pub mod progression;
pub mod providers;
pub mod range;
pub mod score_index;
pub mod selection;
pub mod statistics;
