use clap::Parser;
use clarity::api::{Cli, Command, render_report, run_http_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            if let Err(e) = run_http_server(args).await {
                eprintln!("Server error: {e:#}");
                std::process::exit(1);
            }
        }
        Command::Report(args) => match render_report(&args) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Report error: {e:#}");
                std::process::exit(1);
            }
        },
    }
}
