use clap::Parser;

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod google_books;
pub mod library;
pub mod logger;
pub mod models;
pub mod reconcile;
pub mod state;
pub mod sync;

pub use app::Biblioteca;
pub use error::BibliotecaError;

pub fn run() -> anyhow::Result<()> {
  let flags = cli::Flags::parse();
  let config = config::Config::load(flags.config.as_deref())?;
  logger::init(&config.log_file()?, config.level()?, flags.verbose)?;
  log::info!("[app] starting command={:?}", flags.command);
  cli::run_command(flags, config)
}
