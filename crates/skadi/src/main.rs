use anyhow::{Context, Result};

use skadi::{
    client,
    daemon_response::DaemonResponse,
    opts::{self, ActionWithServer},
    server, SkadiPaths,
};

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("skadi"), log_level_filter)
            .filter(Some("skadi_payload"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = opts
        .config_path
        .map(SkadiPaths::from_config_dir)
        .unwrap_or_else(SkadiPaths::default)
        .context("Failed to initialize skadi paths")?;

    match opts.action {
        // make sure that there isn't already a skadi daemon running.
        opts::Action::Daemon if client::check_server_running(paths.get_ipc_socket_file()) => {
            eprintln!("skadi server already running.");
        }
        opts::Action::Daemon => {
            log::info!("Initializing skadi server. ({})", paths.get_ipc_socket_file().display());
            let _ = std::fs::remove_file(paths.get_ipc_socket_file());
            server::initialize_server(paths, None)?;
        }

        opts::Action::WithServer(ActionWithServer::KillServer) => {
            if let Some(response) = client::handle_server_command(&paths, &ActionWithServer::KillServer, 1)? {
                handle_daemon_response(response);
            }
        }

        // a running daemon is necessary for this command
        opts::Action::WithServer(action) => {
            if let Some(response) = client::handle_server_command(&paths, &action, 5)? {
                handle_daemon_response(response);
            }
        }
    }
    Ok(())
}

fn handle_daemon_response(res: DaemonResponse) {
    match res {
        DaemonResponse::Success(x) => println!("{}", x),
        DaemonResponse::Failure(x) => {
            eprintln!("{}", x);
            std::process::exit(1);
        }
    }
}
