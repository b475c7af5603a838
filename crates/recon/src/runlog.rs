/// Line log written to `evidence/logs/engine.log`.
///
/// Lines carry no wall-clock data so the file hashes identically across
/// identical runs. Every line is also emitted as a `tracing` info event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "tally_recon::run", "{message}");
        self.lines.push(message);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `\n`-terminated lines, UTF-8.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }
}
