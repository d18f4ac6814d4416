use tracing::info;

use homolog_cli::commands::Cli;

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    match Cli::run().await {
        Ok(_) => info!("all done"),
        Err(e) => {
            eprintln!("Error: {e}");

            let mut chain = e.chain().skip(1).peekable();
            if chain.peek().is_some() {
                eprintln!("\nCaused by:");
                for (index, err) in chain.enumerate() {
                    eprintln!("    {index}: {err}");
                }
            }
            std::process::exit(1);
        }
    }
}
