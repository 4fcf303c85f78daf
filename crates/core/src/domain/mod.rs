pub mod lead;
pub mod session;
pub mod stats;
