//! Settings come from a TOML file (see `settings/dev.toml`) with
//! `BOXOFFICE__SECTION__KEY` environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
