use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    app::{Bar, BarCommand},
    config::SkadiConfig,
    dispatch::CommandDispatcher,
    ipc_server,
    paths::SkadiPaths,
    process_bridge::SystemProcessBridge,
};

/// Run the bar daemon in the foreground until it is killed.
pub fn initialize_server(paths: SkadiPaths, action: Option<BarCommand>) -> Result<()> {
    log::info!("Loading paths: {}", &paths);
    let config = SkadiConfig::load(paths.get_config_dir());
    log::debug!("Using config: {:?}", config);

    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down skadi daemon...");
        if let Err(e) = crate::application_lifecycle::send_exit() {
            log::error!("Failed to send application shutdown event to workers: {:?}", e);
            std::process::exit(1);
        }
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("skadi-server")
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")?;

    rt.block_on(async {
        let (evt_send, evt_recv) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher = CommandDispatcher::new(Arc::new(SystemProcessBridge));
        let (mut bar, _snapshot_recv) = Bar::start(config, dispatcher, evt_send.clone());

        // if an action was given to the daemon initially, execute it first.
        if let Some(action) = action {
            bar.handle_command(action);
        }

        let async_part = init_async_part(paths.clone(), evt_send);
        bar.run(evt_recv).await;

        if let Err(e) = async_part.await {
            log::error!("skadi exiting with error: {:?}", e);
        }
    });

    let _ = std::fs::remove_file(paths.get_ipc_socket_file());
    log::info!("skadi daemon finished");
    Ok(())
}

fn init_async_part(paths: SkadiPaths, evt_send: UnboundedSender<BarCommand>) -> tokio::task::JoinHandle<()> {
    let ipc_server_join_handle = {
        let evt_send = evt_send.clone();
        tokio::spawn(async move { ipc_server::run_server(evt_send, paths.get_ipc_socket_file()).await })
    };

    let forward_exit_to_app_handle = tokio::spawn(async move {
        // Wait for application exit event
        let _ = crate::application_lifecycle::recv_exit().await;
        log::debug!("Forward task received exit event");
        // Then forward that to the application
        let _ = evt_send.send(BarCommand::KillServer);
    });

    tokio::spawn(async move {
        let (ipc_result, forward_result) = tokio::join!(ipc_server_join_handle, forward_exit_to_app_handle);
        match ipc_result {
            Ok(Err(e)) => {
                log::error!("IPC server failed: {:?}", e);
            }
            Err(e) => log::error!("IPC server task panicked: {:?}", e),
            Ok(Ok(())) => {}
        }
        if let Err(e) = forward_result {
            log::error!("Exit forwarding task panicked: {:?}", e);
        }
    })
}
