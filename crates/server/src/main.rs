#[tokio::main]
async fn main() -> anyhow::Result<()> {
    affinity_server::run().await
}
