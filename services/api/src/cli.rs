use crate::demo::{run_demo, run_stats, DemoArgs, StatsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use courier_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Courier Intake",
    about = "Collect courier job applications and route them to a moderator",
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
    /// Print application counts and the latest undecided applications
    Stats(StatsArgs),
    /// Walk one applicant through the form and moderate the result, printing the transcript
    Demo(DemoArgs),
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
        Command::Stats(args) => run_stats(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["courier-intake-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn subcommands_accept_their_flags() {
        let cli = Cli::try_parse_from(["courier-intake-api", "stats", "--limit", "3"])
            .expect("parses");
        assert!(matches!(cli.command, Some(Command::Stats(StatsArgs { limit: 3 }))));

        let cli = Cli::try_parse_from([
            "courier-intake-api",
            "demo",
            "--edit-policy",
            "summary",
            "--reject",
        ])
        .expect("parses");
        assert!(matches!(cli.command, Some(Command::Demo(args)) if args.reject));

        assert!(Cli::try_parse_from(["courier-intake-api", "demo", "--edit-policy", "loop"]).is_err());
    }
}
