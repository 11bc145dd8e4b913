#[tokio::main]
async fn main() -> anyhow::Result<()> {
    harvest_daemon::run().await
}
