//! ``src/logging.rs``
//!
//! Tracing setup: a daily rolling file under `log_dir` plus a stderr layer,
//! both written through the compact [`SeqFileMod`] formatter.

use std::{
    fs,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Context;
use tracing::Metadata;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self, FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    prelude::*,
};

use crate::config::LogConfig;

pub struct Logger;

impl Logger {
    /// Call **once** near the start of `main`. Keep the returned guard alive
    /// for the life of the process or buffered file output is lost.
    ///
    /// `RUST_LOG` wins over the configured level; `verbose` forces `debug`.
    pub fn init(cfg: &LogConfig, verbose: bool) -> anyhow::Result<WorkerGuard> {
        fs::create_dir_all(&cfg.log_dir).with_context(|| {
            format!("Failed to create log directory {}", cfg.log_dir.display())
        })?;

        // <log_dir>/msfm.YYYY-MM-DD
        let file: RollingFileAppender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(cfg.file_prefix.as_str())
            .build(&cfg.log_dir)
            .context("Failed to create file appender")?;

        let (writer, guard): (NonBlocking, WorkerGuard) = tracing_appender::non_blocking(file);

        let level: &str = if verbose { "debug" } else { cfg.level.as_str() };

        let file_layer = fmt::layer()
            .event_format(SeqFileMod)
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(Self::filter(level, verbose)?);

        let stderr_layer = fmt::layer()
            .event_format(SeqFileMod)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_filter(Self::filter(level, verbose)?);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
            .context("Logger already initialized")?;

        Ok(guard)
    }

    fn filter(level: &str, verbose: bool) -> anyhow::Result<EnvFilter> {
        if !verbose && let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        EnvFilter::try_new(level).with_context(|| format!("Invalid log level {level:?}"))
    }
}

static SEQ: AtomicUsize = AtomicUsize::new(1);

/// Custom formatter: `SEQ LEVEL [file:line mod::path] message`
struct SeqFileMod;

impl<S, N> FormatEvent<S, N> for SeqFileMod
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut w: Writer<'_>,
        ev: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let seq: usize = SEQ.fetch_add(1, Ordering::Relaxed);

        let meta: &'static Metadata<'static> = ev.metadata();
        write!(
            w,
            "{seq:06} {:5} [{}:{} {}] ",
            meta.level(),
            meta.file().unwrap_or("??"),
            meta.line().unwrap_or(0),
            meta.module_path().unwrap_or("???"),
        )?;

        // span context, outermost first, so engine ops carry their paths
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(w, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<fmt::FormattedFields<N>>()
                    && !fields.is_empty()
                {
                    write!(w, "{{{fields}}}")?;
                }

                write!(w, ":")?;
            }

            write!(w, " ")?;
        }

        ctx.field_format().format_fields(w.by_ref(), ev)?;
        writeln!(w)
    }
}
