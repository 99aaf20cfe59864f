use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    promptcast_cli::cli::app::run().await
}
