use console::style;

fn main() {
  if let Err(err) = biblioteca_lib::run() {
    eprintln!("{} {:#}", style("✘").red(), err);
    std::process::exit(1);
  }
}
