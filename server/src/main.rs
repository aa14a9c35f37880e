use affiliate_server::{config::Config, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and defaults still apply.
    let _ = dotenvy::dotenv();
    env_logger::init();

    start_server(Config::from_env()?).await
}
