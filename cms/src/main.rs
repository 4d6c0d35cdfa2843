use cms::command::load_settings;
use cms::commands::default_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = default_registry();
    let matches = registry.build_cli().get_matches();
    let settings = load_settings(&matches)?;
    cms::core::logging::setup_logging(&settings);
    registry.execute(&matches, &settings).await?;
    Ok(())
}
