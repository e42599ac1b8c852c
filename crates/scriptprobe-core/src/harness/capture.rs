use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const READ_CHUNK_BYTES: usize = 8 * 1024;
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Background reader draining one child stream into a shared buffer.
///
/// The buffer is filled chunk by chunk so that a reader which never reaches
/// EOF can still be abandoned with everything read so far.
pub(crate) struct StreamCapture {
    label: &'static str,
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

pub(crate) struct CapturedStream {
    pub(crate) text: String,
    pub(crate) complete: bool,
}

impl StreamCapture {
    pub(crate) fn spawn<R>(label: &'static str, reader: Option<R>) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = match reader {
            Some(reader) => {
                let sink = Arc::clone(&buffer);
                let handle = thread::Builder::new()
                    .name(format!("scriptprobe-{label}"))
                    .spawn(move || drain(reader, &sink))?;
                Some(handle)
            }
            None => None,
        };

        Ok(Self {
            label,
            buffer,
            handle,
        })
    }

    /// Joins the reader, waiting no later than `deadline` (unbounded when
    /// `None`), and returns the captured text. A reader still blocked at the
    /// deadline is detached.
    pub(crate) fn finish(mut self, deadline: Option<Instant>) -> CapturedStream {
        let mut complete = true;

        if let Some(handle) = self.handle.take() {
            while !handle.is_finished() && deadline.is_none_or(|deadline| Instant::now() < deadline) {
                thread::sleep(JOIN_POLL_INTERVAL);
            }

            if handle.is_finished() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(source)) => {
                        complete = false;
                        tracing::warn!(stream = self.label, error = %source, "stream read failed");
                    }
                    Err(_) => {
                        complete = false;
                        tracing::warn!(stream = self.label, "stream reader panicked");
                    }
                }
            } else {
                complete = false;
                tracing::warn!(
                    stream = self.label,
                    "stream still open after the drain deadline; keeping partial output"
                );
            }
        }

        let bytes = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        CapturedStream {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            complete,
        }
    }
}

fn drain<R: Read>(mut reader: R, sink: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(read) => sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..read]),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
