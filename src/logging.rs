use tracing_subscriber::fmt::MakeWriter;

/// Writer that mirrors every log line onto a broadcast channel so the
/// `/api/logs` SSE tail sees what the terminal sees.
#[derive(Clone)]
pub(crate) struct TailMakeWriter {
    pub sender: tokio::sync::broadcast::Sender<String>,
}

impl<'a> MakeWriter<'a> for TailMakeWriter {
    type Writer = TailWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TailWriter {
            sender: self.sender.clone(),
        }
    }
}

pub(crate) struct TailWriter {
    sender: tokio::sync::broadcast::Sender<String>,
}

impl std::io::Write for TailWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        std::io::stdout().write(buf)?;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

pub fn init(log_tx: tokio::sync::broadcast::Sender<String>) {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(TailMakeWriter { sender: log_tx })
        .init();
}
