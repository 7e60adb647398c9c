#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = farms_cbt_rust::run().await {
        eprintln!("farms-cbt fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
