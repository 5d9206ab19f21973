use ahash::AHashMap;
use thiserror::Error;

use glossa_model::{Conversion, ConversionError, ConversionOutcome, Value};

use crate::ast::{Expr, ParseError};
use crate::functions::FunctionContext;
use crate::parser;
use crate::precompute::precompute;

/// Placeholder hosts render while a formula is blocked on external results.
pub const AWAITING_RESULT: &str = "AWAITING RESULT";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Outbound seam to the conversion service. Fire and forget: the engine
/// assumes eventual, possibly reordered delivery of a matching response
/// batch via [`Engine::on_response_batch`].
pub trait RequestTransport: Send {
    fn send(&mut self, program_name: &str, items: &[Conversion]);
}

/// What became of a submitted formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The input did not begin with the `=` sigil; it is returned unchanged
    /// and the completion callback never runs.
    Plain(String),
    /// The completion callback has already run with the final value.
    Completed,
    /// Blocked on external conversions; the callback fires from a later
    /// response sweep.
    Pending,
}

/// A blocked top-level evaluation: the precomputed AST plus its completion
/// callback, fired exactly once when the AST becomes available.
struct Job {
    ast: Expr,
    completion: Box<dyn FnOnce(Value) + Send>,
}

#[derive(Debug, Clone)]
struct InFlight {
    program: String,
    word: String,
    /// Flush tick at which the request was issued; drives the give-up path.
    issued_tick: u64,
}

/// The conversion-facing shared state: result cache, per-program pending
/// batches, and the in-flight correlation registry. These three structures
/// are updated together when a request is issued and together when a
/// response lands, so they live behind one struct.
#[derive(Default)]
struct ConversionState {
    /// program name -> input word -> outcome. Nested keying is deliberate:
    /// the same word tested against several programs caches independently.
    cache: AHashMap<String, AHashMap<String, ConversionOutcome>>,
    pending: AHashMap<String, Vec<Conversion>>,
    in_flight: AHashMap<u32, InFlight>,
    next_id: u32,
    tick: u64,
}

impl FunctionContext for ConversionState {
    fn cached_conversion(&self, program: &str, word: &str) -> Option<&ConversionOutcome> {
        self.cache.get(program)?.get(word)
    }

    fn request_conversion(&mut self, program: &str, word: &str) {
        // Every queued item also has an in-flight entry, so this scan covers
        // both unsent and already-sent requests.
        if self
            .in_flight
            .values()
            .any(|f| f.program == program && f.word == word)
        {
            return;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.pending
            .entry(program.to_string())
            .or_default()
            .push(Conversion::request(id, word));
        self.in_flight.insert(
            id,
            InFlight {
                program: program.to_string(),
                word: word.to_string(),
                issued_tick: self.tick,
            },
        );
    }
}

/// The evaluation engine: owns the conversion cache, the job queue, the
/// in-flight registry, and the pending batches, so independent engines (one
/// per document, one per test) never share state.
///
/// Single logical thread of control: the host drives `submit_formula`,
/// `flush` (on a fixed cadence), and `on_response_batch` from one event
/// loop; suspended formulas complete from response sweeps, never by
/// blocking the caller.
pub struct Engine {
    state: ConversionState,
    queue: Vec<Job>,
    transport: Box<dyn RequestTransport>,
}

impl Engine {
    pub fn new(transport: Box<dyn RequestTransport>) -> Self {
        Self {
            state: ConversionState::default(),
            queue: Vec::new(),
            transport,
        }
    }

    /// Evaluate one cell's raw text.
    ///
    /// Text without the `=` sigil passes through unparsed. Parse errors are
    /// returned synchronously and queue nothing, so one malformed cell never
    /// affects another. Otherwise the parsed AST is handed to [`Engine::submit`].
    pub fn submit_formula(
        &mut self,
        raw_text: &str,
        completion: impl FnOnce(Value) + Send + 'static,
    ) -> Result<Submission, EngineError> {
        let Some(body) = raw_text.strip_prefix('=') else {
            return Ok(Submission::Plain(raw_text.to_string()));
        };
        let ast = parser::parse_formula_body(body).map_err(|e| e.add_offset(1))?;
        Ok(self.submit(ast, completion))
    }

    /// Evaluate an already-parsed AST.
    ///
    /// If the AST is available the callback runs immediately and nothing is
    /// queued. Otherwise `make_available` kicks off requests for the blocked
    /// leaves, the AST is precomputed and queued, and the callback fires
    /// from a later sweep.
    pub fn submit(
        &mut self,
        ast: Expr,
        completion: impl FnOnce(Value) + Send + 'static,
    ) -> Submission {
        if ast.available(&self.state) {
            completion(ast.evaluate(&self.state));
            return Submission::Completed;
        }
        ast.make_available(&mut self.state);
        let ast = precompute(ast, &self.state);
        self.queue.push(Job {
            ast,
            completion: Box::new(completion),
        });
        Submission::Pending
    }

    /// Send every non-empty pending batch, one request per program name, and
    /// clear them. A flush with nothing pending only advances the give-up
    /// clock.
    pub fn flush(&mut self) {
        self.state.tick += 1;
        for (program, items) in std::mem::take(&mut self.state.pending) {
            log::debug!("flushing {} conversion(s) for \"{program}\"", items.len());
            self.transport.send(&program, &items);
        }
    }

    /// Handle a batch of conversion results.
    ///
    /// Each result is correlated by id, cached under the recorded
    /// (program, word), and its in-flight entry retired; ids with no
    /// in-flight entry are logged and skipped. The job queue is then swept
    /// once, in insertion order.
    pub fn on_response_batch(&mut self, entries: Vec<Conversion>) {
        for entry in entries {
            let Some(in_flight) = self.state.in_flight.remove(&entry.id) else {
                log::warn!("dropping response for unrequested conversion id {}", entry.id);
                continue;
            };
            self.state
                .cache
                .entry(in_flight.program)
                .or_default()
                .insert(in_flight.word, entry.data);
        }
        self.sweep();
    }

    /// Give-up path for requests the service never answered.
    ///
    /// Retires every in-flight entry issued more than `max_age` flush ticks
    /// ago, recording a [`ConversionError::TimedOut`] outcome for its pair so
    /// dependent jobs complete with a structured error. Unsent pending items
    /// for abandoned ids are dropped; a late response for an abandoned id is
    /// treated as unrequested. Returns the number of abandoned requests.
    pub fn abandon_stalled(&mut self, max_age: u64) -> usize {
        let tick = self.state.tick;
        let stale: Vec<u32> = self
            .state
            .in_flight
            .iter()
            .filter(|(_, f)| tick.saturating_sub(f.issued_tick) > max_age)
            .map(|(id, _)| *id)
            .collect();
        if stale.is_empty() {
            return 0;
        }
        for id in &stale {
            if let Some(f) = self.state.in_flight.remove(id) {
                log::warn!(
                    "abandoning conversion id {id} (\"{}\" under \"{}\")",
                    f.word,
                    f.program
                );
                self.state
                    .cache
                    .entry(f.program)
                    .or_default()
                    .insert(f.word, Err(ConversionError::TimedOut));
            }
        }
        for items in self.state.pending.values_mut() {
            items.retain(|c| !stale.contains(&c.id));
        }
        self.state.pending.retain(|_, items| !items.is_empty());
        self.sweep();
        stale.len()
    }

    /// Drop every cached conversion for `program`, e.g. after the program is
    /// recompiled and reloaded. Queued jobs re-resolve against the fresh
    /// cache on their next `make_available`/sweep cycle.
    pub fn invalidate_program(&mut self, program: &str) {
        self.state.cache.remove(program);
    }

    /// Cached outcome for a pair, if any. Mainly for hosts that resolve
    /// conversions outside the formula path.
    pub fn cached_result(&self, program: &str, word: &str) -> Option<&ConversionOutcome> {
        self.state.cached_conversion(program, word)
    }

    pub fn queued_job_count(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.in_flight.len()
    }

    /// Complete, in insertion order, every queued job whose AST has become
    /// available. Each job is removed before its callback runs and is never
    /// revisited.
    fn sweep(&mut self) {
        let mut idx = 0;
        while idx < self.queue.len() {
            if self.queue[idx].ast.available(&self.state) {
                let job = self.queue.remove(idx);
                let value = job.ast.evaluate(&self.state);
                (job.completion)(value);
            } else {
                idx += 1;
            }
        }
    }
}
