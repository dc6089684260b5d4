#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_portal_client::run().await {
        eprintln!("exam-portal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
