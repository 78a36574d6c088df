use super::args::{Cli, Command};

pub mod create;
pub mod update;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Create(args) => create::run(args).await,
        Command::Update(args) => update::run(args).await,
    }
}
