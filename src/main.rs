use anyhow::Result;
use log::*;

use engine::{Engine, EngineConfig, NoopApp};

fn main() {
    pretty_env_logger::init();

    if let Err(err) = run() {
        error!("{:#}", err);
        eprintln!("BOREAL_ERROR: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = EngineConfig::with_shader_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"));

    let engine = Engine::new(config)?;
    engine.run(&mut NoopApp)?;

    info!("Exited cleanly.");
    Ok(())
}
