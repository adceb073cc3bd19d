pub mod plot;
pub mod sample;
