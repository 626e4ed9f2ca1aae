//! Tracing setup: console layer plus an optional rolling JSON file.

use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::cli::FILE_GUARD;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn rotation_of(name: Option<&str>) -> rolling::Rotation {
    match name {
        Some("daily") => rolling::Rotation::DAILY,
        Some("hourly") => rolling::Rotation::HOURLY,
        _ => rolling::Rotation::NEVER,
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(json: bool, level: &str, logging: &bodyscale_config::Logging) {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file: Option<BoxedLayer> = logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "bodyscale.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = rolling::RollingFileAppender::new(
            rotation_of(logging.rotation.as_deref()),
            dir,
            name,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = logging.level.as_deref().unwrap_or("info");
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::try_new(file_level).unwrap_or_else(|_| EnvFilter::new("info")))
            .boxed()
    });

    let mut layers = vec![console];
    layers.extend(file);
    let _ = Registry::default().with(layers).try_init();
}
