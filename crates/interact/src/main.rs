use data_contract_interact::{runner, Config, Console, EthereumClient};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let log_level = Config::log_level_from_args();
    runner::init_logging(log_level);
    info!(%log_level, "DataContract interaction starting up.");

    let mut console = Console::stdio();
    let code = runner::run(Config::parse(), EthereumClient::new, &mut console).await;
    ExitCode::from(code)
}
