use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Writes every log line to stderr and to a second sink.
struct Tee<W> {
    sink: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.sink.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.sink.flush()
    }
}

/// Install the global logger. `RUST_LOG` picks the level, `info` by default.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis().format_module_path(false);

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(Tee { sink: file })));
    }

    builder.try_init().context("logger already initialised")
}
