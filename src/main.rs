use anyhow::Result;
use clap::Parser;
use fotometa::Opts;
use fotometa::cli::SubCommandExtend;
use fotometa::config::SubCommand;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Annotate(cmd) => cmd.run(&opts).await,
        SubCommand::Batch(cmd) => cmd.run(&opts).await,
        SubCommand::Highlight(cmd) => cmd.run(&opts).await,
    }
}
