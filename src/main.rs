#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = daily_checklist::data_dir_from_env();
    daily_checklist::serve(data_dir)
        .await
        .map_err(|error| anyhow::anyhow!("checklist daemon failed: {}", error))
}
