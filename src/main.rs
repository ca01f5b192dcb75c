use easyeat::{app, config};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Optional first argument overrides the config file path.
    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or(config::CONFIG_FILE);

    let config = config::load_config(Path::new(config_path))?;
    app::run(config).await
}
