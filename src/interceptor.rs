//! The driver-facing interception boundary.
//!
//! An interception hook (bytecode weaving, a proxy, a wrapper type; this
//! crate does not care which) calls into [`StatementInterceptor`] at two
//! points per guarded method family: method enter for parameter-binding
//! and execute methods, and method exit for execute methods. The
//! interceptor runs the pipeline: depth guard, parameter capture, request
//! assembly, and tracer hand-off. Nothing in here can surface an error to
//! the intercepted call.

use std::error::Error;

use crate::depth::{CallClass, CallDepth};
use crate::params::{ParamStore, ParamValue};
use crate::request::{DbInfo, DbRequest};

/// The trace collaborator the pipeline hands requests to.
///
/// `start` is only invoked for top-level calls that assembled a request
/// and passed the `should_start` gate; `end` receives the context `start`
/// returned, together with the intercepted call's own error if it failed.
/// With the `tracing` crate, span parenthood is ambient, so no parent
/// context travels through this interface.
pub trait Tracer {
    type Context;

    /// Gate called after assembly and before `start`. Defaults to `true`.
    fn should_start(&self, request: &DbRequest) -> bool {
        let _ = request;
        true
    }

    fn start(&self, request: &DbRequest) -> Self::Context;

    fn end(
        &self,
        context: Self::Context,
        request: &DbRequest,
        error: Option<&(dyn Error + 'static)>,
    );
}

/// Token returned by [`StatementInterceptor::execute_enter`].
///
/// Inactive for nested re-entrant calls and for calls that were skipped
/// (unresolvable context, negative gate). Active or not, it must flow back
/// into [`StatementInterceptor::execute_exit`] exactly once so the depth
/// counter stays balanced.
#[must_use = "pass this to execute_exit, even when inactive, to keep the call depth balanced"]
#[derive(Debug)]
pub struct ActiveCall<C> {
    started: Option<(DbRequest, C)>,
}

impl<C> ActiveCall<C> {
    fn inactive() -> Self {
        Self { started: None }
    }

    /// Whether this call actually started a trace.
    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }
}

/// Drives one guarded method family ("statement execution") through the
/// interception pipeline.
#[derive(Debug)]
pub struct StatementInterceptor<T: Tracer> {
    tracer: T,
}

impl<T: Tracer> StatementInterceptor<T> {
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// Hook for parameter-binding method enters. Successive binds for the
    /// same index overwrite; values accumulate until the outermost execute
    /// call of this execution context completes.
    pub fn bind_param(&self, index: usize, value: ParamValue) {
        ParamStore::bind(index, value);
    }

    /// Hook for execute-method enters.
    ///
    /// Only the top-level call of the statement class assembles a request
    /// and starts a trace; driver internals re-entering instrumented code
    /// get an inactive token. Unresolvable connection context or a
    /// negative `should_start` gate also yield an inactive token; the
    /// call itself proceeds untouched either way.
    pub fn execute_enter(
        &self,
        db_info: Option<DbInfo>,
        statement: Option<String>,
    ) -> ActiveCall<T::Context> {
        let depth = CallDepth::for_class(CallClass::Statement);
        if depth.get_and_increment() > 0 {
            return ActiveCall::inactive();
        }

        let Some(request) = DbRequest::assemble(db_info, statement) else {
            return ActiveCall::inactive();
        };
        if !self.tracer.should_start(&request) {
            return ActiveCall::inactive();
        }

        let context = self.tracer.start(&request);
        ActiveCall {
            started: Some((request, context)),
        }
    }

    /// Hook for execute-method exits, on success and failure paths alike.
    ///
    /// Ends the trace for an active top-level call and unconditionally
    /// clears the parameter store once the outermost call completes, so no
    /// bind state leaks into the next logical call on this execution
    /// context.
    pub fn execute_exit(&self, call: ActiveCall<T::Context>, error: Option<&(dyn Error + 'static)>) {
        let depth = CallDepth::for_class(CallClass::Statement);
        if depth.decrement_and_get() > 0 {
            return;
        }

        if let Some((request, context)) = call.started {
            self.tracer.end(context, &request, error);
        }
        ParamStore::clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fmt;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[derive(Default)]
    struct RecordingTracer {
        gate: bool,
        started: RefCell<Vec<DbRequest>>,
        ended: RefCell<Vec<(DbRequest, Option<String>)>>,
    }

    impl RecordingTracer {
        fn open() -> Self {
            Self {
                gate: true,
                ..Self::default()
            }
        }
    }

    impl Tracer for RecordingTracer {
        type Context = usize;

        fn should_start(&self, _request: &DbRequest) -> bool {
            self.gate
        }

        fn start(&self, request: &DbRequest) -> usize {
            self.started.borrow_mut().push(request.clone());
            self.started.borrow().len()
        }

        fn end(
            &self,
            _context: usize,
            request: &DbRequest,
            error: Option<&(dyn Error + 'static)>,
        ) {
            self.ended
                .borrow_mut()
                .push((request.clone(), error.map(|e| e.to_string())));
        }
    }

    fn interceptor() -> StatementInterceptor<RecordingTracer> {
        ParamStore::clear();
        StatementInterceptor::new(RecordingTracer::open())
    }

    #[test]
    fn nested_calls_trace_exactly_once() {
        let interceptor = interceptor();

        let outer = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT 1".into()));
        assert!(outer.is_active());

        // Driver internals re-enter while the outer call is in flight.
        let inner = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT meta".into()));
        assert!(!inner.is_active());
        interceptor.execute_exit(inner, None);

        interceptor.execute_exit(outer, None);

        assert_eq!(interceptor.tracer().started.borrow().len(), 1);
        assert_eq!(interceptor.tracer().ended.borrow().len(), 1);
    }

    #[test]
    fn bound_params_reach_the_request_and_clear_on_exit() {
        let interceptor = interceptor();
        interceptor.bind_param(1, ParamValue::from("abc"));
        interceptor.bind_param(3, ParamValue::Int(42));

        let call = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT 1".into()));
        interceptor.execute_exit(call, None);

        let started = interceptor.tracer().started.borrow();
        assert_eq!(
            started[0].params().render().as_deref(),
            Some("['abc', , 42]")
        );
        assert!(ParamStore::snapshot().is_empty());
    }

    #[test]
    fn failure_still_ends_the_trace_and_clears_the_store() {
        let interceptor = interceptor();
        interceptor.bind_param(1, ParamValue::Bool(true));

        let call = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT 1".into()));
        interceptor.execute_exit(call, Some(&Boom));

        let ended = interceptor.tracer().ended.borrow();
        assert_eq!(ended[0].1.as_deref(), Some("boom"));
        assert!(ParamStore::snapshot().is_empty());
    }

    #[test]
    fn unresolvable_context_skips_tracing_but_stays_balanced() {
        let interceptor = interceptor();

        let call = interceptor.execute_enter(None, Some("SELECT 1".into()));
        assert!(!call.is_active());
        interceptor.execute_exit(call, None);

        // The next call is treated as top-level again.
        let call = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT 2".into()));
        assert!(call.is_active());
        interceptor.execute_exit(call, None);

        assert_eq!(interceptor.tracer().started.borrow().len(), 1);
    }

    #[test]
    fn negative_gate_skips_start_but_still_cleans_up() {
        ParamStore::clear();
        let interceptor = StatementInterceptor::new(RecordingTracer::default());
        interceptor.bind_param(1, ParamValue::Int(5));

        let call = interceptor.execute_enter(Some(DbInfo::new()), Some("SELECT 1".into()));
        assert!(!call.is_active());
        interceptor.execute_exit(call, None);

        assert!(interceptor.tracer().started.borrow().is_empty());
        assert!(interceptor.tracer().ended.borrow().is_empty());
        assert!(ParamStore::snapshot().is_empty());
    }
}
