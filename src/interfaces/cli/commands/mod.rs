mod config_gen;
mod update;

pub use config_gen::config_generate;
pub use update::{check_database, run_update};
