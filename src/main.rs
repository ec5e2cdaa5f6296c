use dd_upload_pipeline::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
