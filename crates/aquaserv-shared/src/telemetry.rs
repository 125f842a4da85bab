//! Tracing setup shared by the CLI and the integration tests. Everything is
//! emitted as bunyan formatted JSON

use anyhow::Context;
use std::{
    fs::{create_dir_all, File},
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::subscriber::{set_default, set_global_default, DefaultGuard};
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

const TRACE_FOLDER: &str = "traces";

/// Connection level chatter from the http stack is only wanted when asked for
/// through `RUST_LOG`
const HTTP_STACK_DIRECTIVES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Compose multiple layers into a `tracing`'s subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set. See
/// <https://docs.rs/tracing-subscriber/0.3.19/tracing_subscriber/filter/struct.EnvFilter.html#directives>
pub fn get_subscriber<Sink, S>(
    name: impl Into<String>,
    default_level: S,
    sink: Sink,
) -> impl Subscriber + Sync + Send
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    S: AsRef<str>,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},{HTTP_STACK_DIRECTIVES}",
            default_level.as_ref()
        ))
    });
    let formatting_layer = BunyanFormattingLayer::new(name.into(), sink);
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Register a subscriber as global default to process span data.
///
/// It should only be called once!
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> anyhow::Result<()> {
    LogTracer::init().context("Failed to set logger")?;
    set_global_default(subscriber).context("Failed to set subscriber")?;
    Ok(())
}

/// Sends all traces of the process to a new file in the traces folder and
/// returns the path of that file
pub fn start_file_tracing(app_name: &str, default_level: &str) -> anyhow::Result<PathBuf> {
    let (file, path) = create_trace_file(app_name)?;
    init_subscriber(get_subscriber(app_name, default_level, file))?;
    Ok(path)
}

fn gen_log_filename(app_name: &str) -> String {
    format!(
        "{}_{app_name}.log",
        chrono::Local::now().format("%Y-%m-%dT%H-%M-%S")
    )
}

/// Returns a handle to the file created and the file path
pub fn create_trace_file(app_name: &str) -> anyhow::Result<(File, PathBuf)> {
    let log_folder = PathBuf::from(TRACE_FOLDER);
    create_dir_all(&log_folder).context("Failed to create logging folder")?;

    let filename = gen_log_filename(app_name);
    let file_path = log_folder.join(&filename);
    let file = File::create(&file_path)
        .with_context(|| format!("Failed to create log file: {filename:?}"))?;
    Ok((file, file_path))
}

/// Keeps formatted traces in memory so they can be checked, for example that no
/// credentials end up in the logs. Clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    /// Everything written so far
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().expect("log buffer mutex poisoned");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Routes traces from the current thread into a new buffer until the guard
    /// is dropped. The global subscriber is left alone
    pub fn capture_thread(default_level: &str) -> (Self, DefaultGuard) {
        let buffer = Self::default();
        let guard = set_default(get_subscriber("capture", default_level, buffer.clone()));
        (buffer, guard)
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes
            .lock()
            .expect("log buffer mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
