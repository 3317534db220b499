use crate::demo::{run_demo, run_quote, DemoArgs, QuoteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use leadmarket::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lead Marketplace Engine",
    about = "Run and demonstrate the lead claim and pricing engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price hypothetical leads against the configured tables
    Pricing {
        #[command(subcommand)]
        command: PricingCommand,
    },
    /// Run an end-to-end CLI demo covering intake, claims, and settlement
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PricingCommand {
    /// Quote the credit cost a lead would be listed at right now
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Pricing {
            command: PricingCommand::Quote(args),
        } => run_quote(args),
        Command::Demo(args) => run_demo(args),
    }
}
