use clinical_suite_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    // .env is applied inside from_env, before the filter reads RUST_LOG
    let config = AppConfig::from_env();
    clinical_suite_lib::init_tracing();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = clinical_suite_lib::run(config).await {
        tracing::error!("Fatal: {e}");
        std::process::exit(1);
    }
}
