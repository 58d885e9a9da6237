//! Dedicated recognition thread.
//!
//! The engine is owned by one worker thread and fed through an mpsc channel,
//! so concurrent callers are serialized. Each request carries its own reply
//! channel; callers wait on it with a timeout.

use anyhow::Result;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::engine::{OcrEngine, PageSegMode};
use super::types::RawOcrOutput;

/// One recognition job for the worker thread.
pub struct OcrRequest {
    pub image: DynamicImage,
    pub mode: PageSegMode,
    /// Crop name for logging
    pub label: &'static str,
    pub reply: Sender<Result<RawOcrOutput>>,
}

/// Handle to the recognition thread.
///
/// Dropping the handle closes the channel and joins the thread, unless a
/// request timed out; a thread that may still be stuck is detached.
pub struct OcrWorker {
    sender: Option<Sender<OcrRequest>>,
    handle: Option<JoinHandle<()>>,
    timeout: Duration,
    stalled: AtomicBool,
}

impl OcrWorker {
    /// Moves `engine` onto a new thread.
    pub fn spawn<E: OcrEngine + 'static>(engine: E, timeout: Duration) -> Self {
        let (sender, receiver) = channel();
        let handle = thread::spawn(move || run_ocr_worker(receiver, engine));
        Self {
            sender: Some(sender),
            handle: Some(handle),
            timeout,
            stalled: AtomicBool::new(false),
        }
    }

    /// Recognizes one image. Never fails: errors and timeouts come back as
    /// [`RawOcrOutput::failed`] and are logged.
    ///
    /// A timed-out job is not cancelled; the thread finishes it and its result
    /// is discarded.
    pub fn recognize(&self, image: DynamicImage, mode: PageSegMode, label: &'static str) -> RawOcrOutput {
        let Some(sender) = &self.sender else {
            warn!("OCR {}: worker already shut down", label);
            return RawOcrOutput::failed();
        };

        let (reply, response) = channel();
        let request = OcrRequest {
            image,
            mode,
            label,
            reply,
        };
        if sender.send(request).is_err() {
            warn!("OCR {}: worker thread is gone", label);
            return RawOcrOutput::failed();
        }

        match response.recv_timeout(self.timeout) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("OCR {} failed: {:#}", label, e);
                RawOcrOutput::failed()
            }
            Err(RecvTimeoutError::Timeout) => {
                self.stalled.store(true, Ordering::SeqCst);
                warn!("OCR {} timed out after {} ms", label, self.timeout.as_millis());
                RawOcrOutput::failed()
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("OCR {}: worker dropped the request", label);
                RawOcrOutput::failed()
            }
        }
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        drop(self.sender.take());
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.stalled.load(Ordering::SeqCst) && !handle.is_finished() {
            warn!("OCR worker still busy with a timed-out request, detaching");
            return;
        }
        if handle.join().is_err() {
            warn!("OCR worker thread panicked");
        }
    }
}

/// Runs the worker loop until every sender is dropped.
pub fn run_ocr_worker<E: OcrEngine>(receiver: Receiver<OcrRequest>, mut engine: E) {
    info!("OCR worker started");

    loop {
        match receiver.recv() {
            Ok(request) => {
                debug!("OCR worker: processing {} crop", request.label);
                let result = engine.recognize(&request.image, request.mode);
                // The caller may have timed out already
                let _ = request.reply.send(result);
            }
            Err(_) => {
                info!("OCR worker: channel closed, exiting");
                break;
            }
        }
    }
}
