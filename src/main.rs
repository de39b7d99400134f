#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_conductor::run().await {
        eprintln!("exam-conductor fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
