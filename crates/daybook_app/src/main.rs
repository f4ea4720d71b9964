use clap::Parser;
use daybook_app::app::{run, AppConfig};
use daybook_app::cli::Cli;

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().unwrap_or_default();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = run(config, cli.command, &mut stdout) {
        eprintln!("daybook: {err:#}");
        std::process::exit(1);
    }
}
