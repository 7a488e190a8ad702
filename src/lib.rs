pub mod fetch;
pub mod geo;
pub mod output;
pub mod stations;
pub mod traffic;
pub mod trips;
