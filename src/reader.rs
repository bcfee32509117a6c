use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Preparing,
    Reading,
    Processing,
    Classifying,
    Optimizing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgress {
    pub stage: ProcessingStage,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub percent_complete: u8,
    pub estimated_time_remaining_ms: u64,
    pub lines_processed: usize,
}

/// Reads a large log in fixed-size byte slices so memory stays bounded.
/// A line split across two slices is carried over and delivered whole.
pub struct ChunkReader<R> {
    inner: R,
    total_bytes: u64,
    chunk_size: usize,
    lines_processed: usize,
    started: Instant,
}

impl ChunkReader<File> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(ChunkReader::new(file, len))
    }
}

impl<R: Read> ChunkReader<R> {
    /// `total_bytes` only drives progress reporting; reading stops at EOF either way.
    pub fn new(inner: R, total_bytes: u64) -> Self {
        ChunkReader {
            inner,
            total_bytes,
            chunk_size: DEFAULT_CHUNK_SIZE,
            lines_processed: 0,
            started: Instant::now(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_chunks(&self) -> usize {
        self.total_bytes.div_ceil(self.chunk_size as u64) as usize
    }

    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    pub fn progress(&self, stage: ProcessingStage, current_chunk: usize, bytes_processed: u64) -> ChunkProgress {
        let percent_complete = if self.total_bytes == 0 {
            100
        } else {
            ((bytes_processed as f64 / self.total_bytes as f64) * 100.0)
                .round()
                .min(100.0) as u8
        };
        ChunkProgress {
            stage,
            current_chunk,
            total_chunks: self.total_chunks().max(current_chunk),
            bytes_processed,
            total_bytes: self.total_bytes,
            percent_complete,
            estimated_time_remaining_ms: self.eta_ms(bytes_processed),
            lines_processed: self.lines_processed,
        }
    }

    fn eta_ms(&self, bytes_processed: u64) -> u64 {
        let elapsed = self.started.elapsed().as_millis() as f64;
        if bytes_processed == 0 || elapsed == 0.0 {
            return 0;
        }
        let remaining = self.total_bytes.saturating_sub(bytes_processed) as f64;
        (remaining / (bytes_processed as f64 / elapsed)).round() as u64
    }

    fn fill_chunk(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        buf.resize(self.chunk_size, 0);
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(filled)
    }

    /// Hands every batch of complete lines to `on_lines` along with its chunk index,
    /// then reports progress for that chunk.
    pub fn for_each_chunk<C, P>(
        &mut self,
        stage: ProcessingStage,
        mut on_lines: C,
        mut on_progress: P,
    ) -> io::Result<()>
    where
        C: FnMut(Vec<String>, usize),
        P: FnMut(&ChunkProgress),
    {
        self.started = Instant::now();
        on_progress(&self.progress(ProcessingStage::Preparing, 0, 0));

        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut leftover: Vec<u8> = Vec::new();
        let mut bytes_processed = 0u64;
        let mut index = 0usize;

        loop {
            let n = self.fill_chunk(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes_processed += n as u64;
            leftover.extend_from_slice(&chunk);

            let lines = match leftover.iter().rposition(|b| *b == b'\n') {
                Some(pos) => {
                    let rest = leftover.split_off(pos + 1);
                    let complete = std::mem::replace(&mut leftover, rest);
                    split_lines(&complete[..pos])
                }
                None => Vec::new(),
            };
            self.lines_processed += lines.len();
            on_lines(lines, index);
            index += 1;
            on_progress(&self.progress(stage, index, bytes_processed));
        }

        let tail = decode_line(&leftover);
        if !tail.trim().is_empty() {
            self.lines_processed += 1;
            on_lines(vec![tail], index.saturating_sub(1));
        }

        on_progress(&self.progress(ProcessingStage::Complete, index, bytes_processed));
        tracing::debug!(chunks = index, lines = self.lines_processed, "finished chunked read");
        Ok(())
    }

    /// Every line of the input in order. Blank lines are kept except a blank tail.
    pub fn read_in_chunks<P>(&mut self, on_progress: P) -> io::Result<Vec<String>>
    where
        P: FnMut(&ChunkProgress),
    {
        let mut all = Vec::new();
        self.for_each_chunk(ProcessingStage::Reading, |lines, _| all.extend(lines), on_progress)?;
        Ok(all)
    }

    /// Runs `processor` on each non-blank line with a running index, keeping the `Some` results.
    pub fn process_lines<T, F, P>(&mut self, mut processor: F, on_progress: P) -> io::Result<Vec<T>>
    where
        F: FnMut(&str, usize) -> Option<T>,
        P: FnMut(&ChunkProgress),
    {
        let mut results = Vec::new();
        let mut line_index = 0usize;
        self.for_each_chunk(
            ProcessingStage::Processing,
            |lines, _| {
                for line in lines.iter().filter(|l| !l.trim().is_empty()) {
                    if let Some(r) = processor(line, line_index) {
                        results.push(r);
                    }
                    line_index += 1;
                }
            },
            on_progress,
        )?;
        Ok(results)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    s.strip_suffix('\r').unwrap_or(&s).to_string()
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    bytes.split(|b| *b == b'\n').map(decode_line).collect()
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let i = ((bytes as f64).ln() / 1024f64.ln()).floor().min(3.0) as i32;
    let value = bytes as f64 / 1024f64.powi(i);
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[i as usize])
}

pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }
    if ms < 60_000 {
        return format!("{}s", (ms as f64 / 1000.0).round());
    }
    let minutes = ms / 60_000;
    let seconds = ((ms % 60_000) as f64 / 1000.0).round();
    format!("{minutes}m {seconds}s")
}
