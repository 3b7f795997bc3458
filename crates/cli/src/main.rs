mod cmd;
mod util;

use std::process::ExitCode;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

#[derive(FromArgs, PartialEq, Debug)]
/// Open Graph image tooling for the documentation site.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Params(cmd::params::Args),
    Prerender(cmd::prerender::Args),
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let result = match args.command {
        SubCommand::Params(args) => cmd::params::run(args),
        SubCommand::Prerender(args) => cmd::prerender::run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
