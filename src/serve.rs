//! Long-running modes: `watch` streams change events, `serve` keeps a live
//! index and answers newline-delimited JSON queries on stdin.

use std::thread::JoinHandle;

use archdex::{
    Detector,
    FolderIndex,
    Settings,
    SharedIndex,
    StopHandle,
    channel::{EventSender, event_channel},
    error::{Error, Result},
    shared::consume_events,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// One query read from stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request {
    Partial {
        query: String,
    },
    Key {
        kind: String,
        query: String,
    },
    Files {
        id: u64,
        #[serde(default)]
        images: bool,
    },
    Info {
        id: u64,
    },
    Status,
}

/// Answer one request line.
fn respond(index: &SharedIndex, line: &str) -> Value {
    let request = match serde_json::from_str::<Request>(line) {
        Ok(request) => request,
        Err(e) => return json!({ "error": format!("invalid request: {e}") }),
    };

    match request {
        Request::Partial { query } => {
            json!({ "results": index.search_partial(&query) })
        }
        Request::Key { kind, query } => {
            json!({ "results": index.search_by_key_name(&query, &kind) })
        }
        Request::Files { id, images } => {
            let files = if images {
                index.get_images(id)
            } else {
                index.get_files(id)
            };
            let files = files.map(|paths| {
                paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
            });
            json!({ "id": id, "files": files })
        }
        Request::Info { id } => {
            let fields = index.read_descriptor(id).map(|d| descriptor_json(&d));
            json!({ "id": id, "fields": fields })
        }
        Request::Status => serde_json::to_value(index.stats())
            .unwrap_or_else(|e| json!({ "error": e.to_string() })),
    }
}

pub fn descriptor_json(descriptor: &archdex::Descriptor) -> Value {
    let map: Map<String, Value> = descriptor
        .fields()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    Value::Object(map)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
///
/// The SIGTERM listener is installed when this is called, not when the
/// future is first polled. Must be called inside the runtime.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let terminate = signal(SignalKind::terminate())
        .inspect_err(|e| tracing::warn!("cannot listen for SIGTERM: {e}"))
        .ok();

    async move {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match terminate {
                Some(mut sig) => {
                    sig.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => {}
            _ = terminate => {}
        }
    }
}

/// Seed the detector on the calling thread, then poll on a dedicated one.
fn spawn_detector(
    settings: &Settings,
    sender: EventSender,
    stop: &StopHandle,
) -> Result<JoinHandle<()>> {
    let poller = Detector::new(
        &settings.storage_dir,
        settings.poll_interval,
        settings.include_hidden,
    )
    .start()?;
    let stop = stop.clone();
    let handle = std::thread::Builder::new()
        .name("archdex-detector".into())
        .spawn(move || poller.run(&sender, Some(&stop)))?;
    Ok(handle)
}

async fn join_detector(handle: JoinHandle<()>) -> Result<()> {
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .map_err(|e| Error::Config(format!("detector join failed: {e}")))?
        .map_err(|_| Error::Config("detector thread panicked".into()))
}

/// Run the change detector in the foreground and print each event as a
/// JSON line until Ctrl-C or SIGTERM.
pub fn run_watch(settings: Settings) -> Result<()> {
    build_runtime()?.block_on(async move {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        let (tx, mut rx) = event_channel(settings.channel_capacity);
        let stop = StopHandle::new();
        let detector = spawn_detector(&settings, tx, &stop)?;

        let mut stdout = tokio::io::stdout();
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match event.to_json_line() {
                        Ok(line) => {
                            stdout.write_all(line.as_bytes()).await?;
                            stdout.write_all(b"\n").await?;
                            stdout.flush().await?;
                        }
                        Err(e) => tracing::warn!(
                            folder = %event.folder_name,
                            "dropping unencodable event: {e}"
                        ),
                    }
                }
                _ = &mut shutdown, if !interrupted => {
                    tracing::info!("shutdown requested, stopping");
                    interrupted = true;
                    stop.stop();
                }
            }
        }

        join_detector(detector).await
    })
}

/// Build the index, keep it current from the detector, and answer queries
/// read from stdin until EOF, Ctrl-C or SIGTERM.
pub fn run_serve(settings: Settings) -> Result<()> {
    let runtime = build_runtime()?;
    let result = runtime.block_on(serve(settings));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    result
}

async fn serve(settings: Settings) -> Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // The detector is seeded before the scan, so a folder created or
    // removed in between still reaches the index as an event.
    let (tx, rx) = event_channel(settings.channel_capacity);
    let stop = StopHandle::new();
    let detector = spawn_detector(&settings, tx, &stop)?;

    let index = match FolderIndex::build(
        &settings.storage_dir,
        settings.include_hidden,
    ) {
        Ok(index) => SharedIndex::new(index),
        Err(e) => {
            stop.stop();
            join_detector(detector).await?;
            return Err(e);
        }
    };
    let consumer = tokio::spawn(consume_events(rx, index.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let response = respond(&index, &line);
                stdout.write_all(response.to_string().as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping");
                break;
            }
        }
    }

    stop.stop();
    let detector_result = join_detector(detector).await;
    if let Err(e) = consumer.await {
        tracing::warn!("event consumer failed: {e}");
    }
    detector_result
}
