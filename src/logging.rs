use anyhow::Context;
use std::{
    fmt::{self, Write as _},
    fs::OpenOptions,
    path::Path,
    sync::Mutex,
};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext, FormatEvent, FormatFields,
        format::Writer,
        time::{ChronoLocal, FormatTime},
    },
    registry::LookupSpan,
};

const LOG_FILE_TIME_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Log file lines: `[LEVEL] dd.mm.yy HH:MM:SS - message`.
pub struct LogFileFormat {
    timer: ChronoLocal,
}

impl Default for LogFileFormat {
    fn default() -> Self {
        Self {
            timer: ChronoLocal::new(LOG_FILE_TIME_FORMAT.to_string()),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LogFileFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", event.metadata().level())?;
        self.timer.format_time(&mut writer)?;
        writer.write_str(" - ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Stdout by default, or appended to `log_file` without colours.
/// `RUST_LOG` wins over the default `info` level.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            builder
                .with_ansi(false)
                .event_format(LogFileFormat::default())
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }
    Ok(())
}
