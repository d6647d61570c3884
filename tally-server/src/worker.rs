use monoio::net::TcpListener;
use std::sync::Arc;
use tally_core::{Pipeline, TallyConfig};
use tracing::{error, info};

/// Shared state across all worker threads.
///
/// Everything here is built once at startup and never mutated.
pub struct SharedState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<TallyConfig>,
}

impl SharedState {
    pub fn new(pipeline: Pipeline, config: TallyConfig) -> Arc<Self> {
        Arc::new(Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        })
    }
}

/// Spawn monoio worker threads, one per core.
///
/// Each thread runs an independent monoio runtime with its own
/// TCP listener (via SO_REUSEPORT) and event loop.
pub fn spawn_workers(
    shared: Arc<SharedState>,
    num_workers: usize,
) -> std::io::Result<Vec<std::thread::JoinHandle<()>>> {
    let listen_addr = shared.config.server.http_addr.clone();
    let mut handles = Vec::with_capacity(num_workers);

    for worker_id in 0..num_workers {
        let shared = Arc::clone(&shared);
        let addr = listen_addr.clone();

        let handle = std::thread::Builder::new()
            .name(format!("tally-worker-{worker_id}"))
            .spawn(move || {
                let mut rt = match monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(worker = worker_id, error = %e, "Failed to build monoio runtime");
                        return;
                    }
                };

                rt.block_on(worker_loop(worker_id, shared, addr));
            })?;

        handles.push(handle);
    }

    info!(workers = num_workers, addr = %listen_addr, "Workers spawned");
    Ok(handles)
}

/// Main loop for a single worker thread.
async fn worker_loop(worker_id: usize, shared: Arc<SharedState>, addr: String) {
    let listener = match TcpListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            error!(worker = worker_id, addr = %addr, error = %e, "Worker failed to bind");
            return;
        }
    };

    info!(worker = worker_id, addr = %addr, "Worker listening");
    accept_loop(worker_id, listener, Arc::clone(&shared.pipeline)).await;
}

/// Accept connections forever, one task per connection.
pub async fn accept_loop(worker_id: usize, listener: TcpListener, pipeline: Arc<Pipeline>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                // TCP_NODELAY: responses go out in a single write
                let _ = stream.set_nodelay(true);

                let pipeline = Arc::clone(&pipeline);
                monoio::spawn(async move {
                    if let Err(e) =
                        crate::connection::handle_connection(stream, peer_addr, pipeline).await
                    {
                        tracing::debug!(error = %e, "Connection closed");
                    }
                });
            }
            Err(e) => {
                error!(worker = worker_id, error = %e, "Accept error");
            }
        }
    }
}
