#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ft_capture::cli::run().await
}
