pub mod cli;
pub mod constants;
pub mod error;
pub mod input;
pub mod merge;
pub mod nwalign;
pub mod report;
pub mod types;
pub mod utils;
