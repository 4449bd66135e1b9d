use stripdeck_core::{Command, EngineConfig};

pub fn run(config: &EngineConfig, command: Command) {
    let gateway = super::make_gateway(config);
    let rt = super::runtime();
    match rt.block_on(command.send(&gateway)) {
        Ok(()) => println!("✓ {command} acknowledged"),
        Err(e) => super::fail(e),
    }
}
