use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let demo_mode = std::env::args().any(|arg| arg == "--demo");
    #[cfg(feature = "tauri-app")]
    if !demo_mode {
        bond_desktop::run_tauri();
        return;
    }

    let result = if demo_mode {
        bond_desktop::run_demo()
    } else {
        bond_desktop::run()
    };

    if let Err(err) = result {
        tracing::error!(%err, "bond console backend stopped");
        std::process::exit(1);
    }
}
