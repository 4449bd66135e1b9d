use stripdeck_core::EngineConfig;

pub fn run(config: EngineConfig) {
    let mut app = match crate::tui::app::App::new(config) {
        Ok(app) => app,
        Err(e) => super::fail(e),
    };
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
