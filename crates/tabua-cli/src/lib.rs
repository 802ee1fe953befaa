mod cli;
mod config;
mod emit;
mod init;
mod reverse_cmd;
mod write;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Init(args) => init::run(args),
        cli::Command::Reverse(args) => reverse_cmd::run(args).await,
    }
}
