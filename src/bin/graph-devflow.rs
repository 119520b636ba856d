use graph_devflow::{
    app,
    settings::RunSettings,
    utils::{from_env::FromEnv, tracing::init_tracing},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    let _guard = init_tracing();

    let settings = RunSettings::from_env()?;
    app::run(&settings, &mut std::io::stdout().lock()).await?;

    Ok(())
}
