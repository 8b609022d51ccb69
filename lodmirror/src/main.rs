#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lodmirror::run_cli().await
}
