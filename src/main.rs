use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    schedassist_cli::cli::run().await
}
