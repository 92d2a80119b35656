use anyhow::anyhow;
use log::{Level, Log, Metadata, Record};
use std::env;
use std::fmt::Display;
use std::io::Write;
use std::sync::{Arc, Mutex};
use syslog::{Facility, Formatter3164, LogFormat, Logger, LoggerBackend, Severity};

/// Routes the `log` macros to syslog, facility AUTHPRIV, alongside sshd's own
/// messages. `peer` is the remote end of the ssh connection if known.
pub fn init_logging(peer: Option<&str>) -> anyhow::Result<()> {
    let logger = syslog::unix(PrefixFormatter::new(Facility::LOG_AUTHPRIV, peer))
        .map_err(|e| anyhow!("Failed to set up log: {e}"))?;
    log::set_boxed_logger(Box::new(SyslogLogger::new(logger)))?;
    log::set_max_level(log::LevelFilter::Info);
    Ok(())
}

/// Extracts `address port` of the client from the value of `SSH_CONNECTION`,
/// which is `client-address client-port server-address server-port`.
pub fn peer_from_ssh_connection(value: &str) -> Option<String> {
    let mut parts = value.split_whitespace();
    let address = parts.next()?;
    let port = parts.next()?;
    Some(format!("{address} port {port}"))
}

#[derive(Clone)]
struct PrefixFormatter {
    inner: Formatter3164,
    prefix: String,
}

impl<T: Display> LogFormat<T> for PrefixFormatter {
    fn format<W: Write>(&self, w: &mut W, severity: Severity, message: T) -> syslog::Result<()> {
        self.inner
            .format(w, severity, format!("{}{}", self.prefix, message))
    }
}

impl PrefixFormatter {
    fn new(facility: Facility, peer: Option<&str>) -> Self {
        let inner = Formatter3164 {
            facility,
            hostname: None,
            process: process_name().unwrap_or("gitolite-wrapper".into()),
            pid: std::process::id(),
        };
        let prefix = match peer {
            Some(peer) => format!("[{peer}] "),
            None => String::new(),
        };
        PrefixFormatter { inner, prefix }
    }
}

fn process_name() -> anyhow::Result<String> {
    Ok(env::current_exe()?
        .file_name()
        .ok_or(anyhow!("no filename"))?
        .to_string_lossy()
        .into())
}

// Same as syslog::BasicLogger, but holding a Logger with our PrefixFormatter.
struct SyslogLogger {
    logger: Arc<Mutex<Logger<LoggerBackend, PrefixFormatter>>>,
}

impl SyslogLogger {
    fn new(logger: Logger<LoggerBackend, PrefixFormatter>) -> Self {
        SyslogLogger {
            logger: Arc::new(Mutex::new(logger)),
        }
    }
}

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("{}", record.args());
        let Ok(mut logger) = self.logger.lock() else {
            return;
        };
        // There is nowhere left to report a failure to log to.
        let _ = match record.level() {
            Level::Error => logger.err(message),
            Level::Warn => logger.warning(message),
            Level::Info => logger.info(message),
            Level::Debug | Level::Trace => logger.debug(message),
        };
    }

    fn flush(&self) {
        if let Ok(mut logger) = self.logger.lock() {
            let _ = logger.backend.flush();
        }
    }
}
