//! npu-uvc-host - Host Side Entry Point
//!
//! Replays recorded JPEG pictures through the host pipeline
//! (ExtractFlow → ComposeFlow) and logs what would be shown. The config file
//! is taken from `NPU_UVC_CONFIG`; without it the defaults are used.

use anyhow::Context;
use npu_uvc_link::{
    config::{AppConfig, CONFIG_ENV_VAR},
    decode::ModelRegistry,
    pipeline::{
        nodes::{ComposeFlow, ExtractFlow, JpegPassthrough, RecordingRenderSink},
        Graph,
    },
    MediaBuffer, Rect,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long to wait for the graph to drain after the last picture.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let config = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => AppConfig::default(),
    };

    let _log_guard = init_logging(&config)?;
    tracing::info!("Starting npu-uvc-host ({})", config.device.model);

    let frames = collect_pictures(config.host.input_dir.as_deref())?;
    if frames.is_empty() {
        tracing::warn!("No pictures to replay; set host.input_dir to a directory of .jpg files");
        return Ok(());
    }

    let graph = Graph::new();
    let registry = Arc::new(ModelRegistry::with_builtin());
    let bounds = Rect::new(
        0,
        0,
        config.host.display_width as i32,
        config.host.display_height as i32,
    );
    let sink = RecordingRenderSink::new(bounds);
    let composed = sink.frames();

    let extract = graph.install(
        "extract",
        ExtractFlow::new(registry, JpegPassthrough).slot_map(config.queues.picture_depth),
    )?;
    let compose = graph.install(
        "compose",
        ComposeFlow::new(sink, config.host.rotation)
            .reuse_window_ms(config.host.reuse_window_ms)
            .slot_map(config.queues.picture_depth, config.queues.result_depth),
    )?;
    graph.connect(extract, 0, compose, 0)?;
    graph.connect(extract, 1, compose, 1)?;

    let interval = Duration::from_millis(config.host.frame_interval_ms);
    for (index, path) in frames.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
        let timestamp_us = index as u64 * interval.as_micros() as u64;
        graph.send(extract, 0, MediaBuffer::jpeg(bytes).with_timestamp(timestamp_us))?;
        std::thread::sleep(interval);
    }

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while graph.queue_len(extract, 0)? > 0 || graph.queue_len(compose, 0)? > 0 {
        if Instant::now() >= deadline {
            tracing::warn!("Pipeline did not drain within {:?}", DRAIN_TIMEOUT);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    tracing::info!("Shutting down...");
    graph.shutdown();

    let composed = composed.lock().unwrap_or_else(PoisonError::into_inner);
    let annotated = composed.iter().filter(|f| !f.boxes.is_empty()).count();
    tracing::info!(
        "Replayed {} pictures: {} shown, {} with overlay (extract {:?}, compose {:?})",
        frames.len(),
        composed.len(),
        annotated,
        graph.stats(extract)?,
        graph.stats(compose)?
    );
    Ok(())
}

/// Console logging plus an optional daily rolling file.
fn init_logging(config: &AppConfig) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = match config.log_filter() {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter {:?}", directive))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,npu_uvc_link=debug")),
    };

    let (file_layer, guard) = match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "npu-uvc-host.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// JPEG files of `dir`, sorted by name.
fn collect_pictures(dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let Some(dir) = dir else {
        return Ok(Vec::new());
    };
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        })
        .collect();
    files.sort();
    Ok(files)
}
