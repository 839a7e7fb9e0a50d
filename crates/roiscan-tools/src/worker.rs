//! Background detection on a dedicated thread.
//!
//! [`DetectionWorker`] moves tool runs off the caller's thread. Each
//! [`submit`](DetectionWorker::submit) sends a read-only image snapshot
//! plus the tool selection and gets a generation number back. Results
//! come back through [`try_recv`](DetectionWorker::try_recv) /
//! [`recv`](DetectionWorker::recv) tagged with that generation, and
//! anything older than the latest submission is dropped on the way out.
//!
//! The thread also coalesces its queue: when several requests are
//! waiting it runs only the newest.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use image::DynamicImage;

use crate::dispatch::{DispatchError, ToolContext, run_tool};
use crate::tool::{ToolKind, ToolParams};
use crate::types::{DetectionError, DetectionResult, Rect};

struct Request {
    generation: u64,
    image: Arc<DynamicImage>,
    roi: Rect,
    tool: ToolKind,
    params: ToolParams,
}

/// A finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    /// Generation returned by the matching [`DetectionWorker::submit`].
    pub generation: u64,
    /// What the tool produced.
    pub result: Result<DetectionResult, DetectionError>,
}

/// Handle to the detection thread. Dropping it stops and joins the
/// thread.
pub struct DetectionWorker {
    requests: Option<Sender<Request>>,
    responses: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
    latest: u64,
}

impl DetectionWorker {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn() -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("roiscan-detect".to_string())
            .spawn(move || worker_loop(&request_rx, &response_tx))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
            latest: 0,
        })
    }

    /// Queue a run of the selected tool on `image` with the raw `roi`.
    ///
    /// Returns the generation that will tag the response. Every call
    /// makes all earlier generations stale.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NoToolSelected`] if `ctx` has no tool.
    /// - [`DispatchError::WorkerStopped`] if the worker thread is gone.
    pub fn submit(
        &mut self,
        image: impl Into<Arc<DynamicImage>>,
        roi: Rect,
        ctx: &ToolContext,
    ) -> Result<u64, DispatchError> {
        let Some(tool) = ctx.current_tool else {
            log::warn!("no tool selected");
            return Err(DispatchError::NoToolSelected);
        };
        let generation = self.latest + 1;
        let request = Request {
            generation,
            image: image.into(),
            roi,
            tool,
            params: ctx.params.clone(),
        };
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok());
        if !sent {
            log::warn!("detection worker has stopped");
            return Err(DispatchError::WorkerStopped);
        }
        self.latest = generation;
        Ok(generation)
    }

    /// Generation of the most recent submission (0 before any).
    #[must_use]
    pub const fn latest_generation(&self) -> u64 {
        self.latest
    }

    /// The current result, if it has arrived. Never blocks.
    pub fn try_recv(&self) -> Option<WorkerResponse> {
        loop {
            match self.responses.try_recv() {
                Ok(response) if response.generation < self.latest => {
                    log::debug!("dropping stale result {}", response.generation);
                }
                Ok(response) => return Some(response),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Block until the result for the latest submission arrives.
    ///
    /// Returns `None` if nothing was submitted or the worker thread has
    /// exited.
    pub fn recv(&self) -> Option<WorkerResponse> {
        if self.latest == 0 {
            return None;
        }
        loop {
            let response = self.responses.recv().ok()?;
            if response.generation >= self.latest {
                return Some(response);
            }
            log::debug!("dropping stale result {}", response.generation);
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("detection worker panicked");
        }
    }
}

fn worker_loop(requests: &Receiver<Request>, responses: &Sender<WorkerResponse>) {
    while let Ok(mut request) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            log::debug!("skipping superseded request {}", request.generation);
            request = newer;
        }
        let result = run_tool(&request.image, request.roi, request.tool, &request.params);
        let response = WorkerResponse {
            generation: request.generation,
            result,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
}
