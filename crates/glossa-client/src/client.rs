use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use glossa_engine::{Engine, EngineError, Expr, RequestTransport, Submission, Value};
use glossa_model::{Conversion, WorkbenchRequest, WorkbenchResponse};

use crate::frame::{self, FrameError};

/// Shared handle onto the queue of encoded frames waiting for the socket.
///
/// The engine's flush pushes here; the host drains with [`OutboundHandle::drain`]
/// and writes each frame to its connection.
#[derive(Debug, Default, Clone)]
pub struct OutboundHandle {
    frames: Arc<Mutex<VecDeque<String>>>,
}

impl OutboundHandle {
    pub fn push(&self, frame: String) {
        self.frames
            .lock()
            .expect("outbound queue mutex poisoned")
            .push_back(frame);
    }

    /// Take every queued frame, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.frames
            .lock()
            .expect("outbound queue mutex poisoned")
            .drain(..)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.frames
            .lock()
            .expect("outbound queue mutex poisoned")
            .is_empty()
    }
}

/// Engine transport that encodes each per-program batch as a `RunProgram`
/// frame onto the outbound queue.
struct OutboundTransport {
    handle: OutboundHandle,
}

impl RequestTransport for OutboundTransport {
    fn send(&mut self, program_name: &str, items: &[Conversion]) {
        let request = WorkbenchRequest::RunProgram {
            program_name: program_name.to_string(),
            to_convert: items.to_vec(),
        };
        match frame::encode_request(&request) {
            Ok(frame) => self.handle.push(frame),
            // A dropped batch strands its jobs; never fail silently.
            Err(err) => log::error!("dropping conversion batch for \"{program_name}\": {err}"),
        }
    }
}

/// The workbench-side client: an [`Engine`] wired to the frame queue, plus
/// the non-formula entry points the workbench UI needs (program loading and
/// direct test-area conversions).
pub struct Client {
    engine: Engine,
    outbound: OutboundHandle,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        let outbound = OutboundHandle::default();
        let engine = Engine::new(Box::new(OutboundTransport {
            handle: outbound.clone(),
        }));
        Self { engine, outbound }
    }

    /// Handle for draining encoded frames to the socket.
    pub fn outbound(&self) -> OutboundHandle {
        self.outbound.clone()
    }

    /// See [`Engine::submit_formula`].
    pub fn submit_formula(
        &mut self,
        raw_text: &str,
        completion: impl FnOnce(Value) + Send + 'static,
    ) -> Result<Submission, EngineError> {
        self.engine.submit_formula(raw_text, completion)
    }

    /// Request a single conversion outside the formula path (the program
    /// manager's test area). Shares the engine's id space, batching, cache,
    /// and in-flight dedupe with spreadsheet formulas.
    pub fn request_conversion(
        &mut self,
        program: &str,
        word: &str,
        completion: impl FnOnce(Value) + Send + 'static,
    ) -> Submission {
        let ast = Expr::Call {
            name: "run".into(),
            args: vec![
                Expr::Text(program.to_string()),
                Expr::Text(word.to_string()),
            ],
        };
        self.engine.submit(ast, completion)
    }

    /// Queue a `LoadProgram` frame and drop the program's cached
    /// conversions, since the reloaded program may convert differently.
    pub fn load_program(&mut self, name: &str, contents: &str) -> Result<(), FrameError> {
        let frame = frame::encode_request(&WorkbenchRequest::LoadProgram {
            name: name.to_string(),
            contents: contents.to_string(),
        })?;
        self.engine.invalidate_program(name);
        self.outbound.push(frame);
        Ok(())
    }

    /// Queue a `TryCompile` frame for editor diagnostics.
    pub fn try_compile(&mut self, program: &str) -> Result<(), FrameError> {
        let frame = frame::encode_request(&WorkbenchRequest::TryCompile {
            program: program.to_string(),
        })?;
        self.outbound.push(frame);
        Ok(())
    }

    /// Decode one inbound frame. Conversion result batches are consumed by
    /// the engine; any other response is returned for the host to present.
    pub fn handle_frame(&mut self, frame: &str) -> Result<Option<WorkbenchResponse>, FrameError> {
        match frame::decode_response(frame)? {
            WorkbenchResponse::RunResult { to_convert } => {
                self.engine.on_response_batch(to_convert);
                Ok(None)
            }
            other => Ok(Some(other)),
        }
    }

    /// See [`Engine::flush`].
    pub fn flush(&mut self) {
        self.engine.flush();
    }

    /// See [`Engine::abandon_stalled`].
    pub fn abandon_stalled(&mut self, max_age: u64) -> usize {
        self.engine.abandon_stalled(max_age)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
