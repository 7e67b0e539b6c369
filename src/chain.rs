//! Clutter-free chaining of callback-based service calls.

use std::sync::Arc;

use crate::callback::Callback;

/// Shared failure handler of a chain or chain step.
pub type FailureHandler = Arc<dyn Fn(anyhow::Error) + Send + Sync>;

/// Shared termination handler of a chain or chain step.
pub type TerminationHandler = Arc<dyn Fn() + Send + Sync>;

/// Per-step choice of failure handler.
#[derive(Clone)]
pub enum OnFailure {
    /// Keep the failure handler the chain was started with.
    Default,
    /// Swallow failures at this step.
    Ignore,
    /// Use this handler instead of the chain default.
    Handler(FailureHandler),
}

impl OnFailure {
    pub fn handler(handler: impl Fn(anyhow::Error) + Send + Sync + 'static) -> Self {
        Self::Handler(Arc::new(handler))
    }

    fn resolve(self, default: &Option<FailureHandler>) -> Option<FailureHandler> {
        match self {
            Self::Default => default.clone(),
            Self::Ignore => None,
            Self::Handler(handler) => Some(handler),
        }
    }
}

/// Per-step choice of termination handler.
#[derive(Clone)]
pub enum OnTermination {
    /// Keep the termination handler the chain was started with.
    Default,
    /// Swallow the termination notice at this step.
    Ignore,
    /// Use this handler instead of the chain default.
    Handler(TerminationHandler),
}

impl OnTermination {
    pub fn handler(handler: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Handler(Arc::new(handler))
    }

    fn resolve(self, default: &Option<TerminationHandler>) -> Option<TerminationHandler> {
        match self {
            Self::Default => default.clone(),
            Self::Ignore => None,
            Self::Handler(handler) => Some(handler),
        }
    }
}

#[derive(Clone)]
struct ChainDefaults {
    on_failure: Option<FailureHandler>,
    on_terminated: Option<TerminationHandler>,
}

/// Builder composing callback-based steps into a linear pipeline.
///
/// A step is a function receiving the previous step's output and a
/// [`Callback`] for its own; it typically hands both to an asynchronous
/// service and returns immediately. Steps run strictly one after another,
/// and a failure or termination at any step aborts the rest of the chain and
/// fires that step's effective handler exactly once.
///
/// ```
/// use taskmill::{AsyncChain, Callback};
///
/// AsyncChain::with_defaults(|error| eprintln!("failed: {error}"), || {})
///     .supply(|callback: Callback<u32>| {
///         callback.success(6);
///         Ok(())
///     })
///     .call(|input, callback| {
///         callback.success(input * 7);
///         Ok(())
///     })
///     .execute(|product| assert_eq!(product, 42));
/// ```
///
/// One deliberate oddity, inherited from the service callers this API grew
/// up with: an error *returned* by a step's setup function (as opposed to a
/// failure delivered through its callback) is routed to the handler of the
/// step *before* it. Code relying on handler attribution should deliver
/// failures through the callback.
pub struct AsyncChain<I: Send + 'static> {
    run: Box<dyn FnOnce(Callback<I>) + Send>,
    on_failure: Option<FailureHandler>,
    on_terminated: Option<TerminationHandler>,
    defaults: ChainDefaults,
}

impl AsyncChain<()> {
    /// Starts an empty chain with the given default non-success handlers.
    pub fn with_defaults(
        on_failure: impl Fn(anyhow::Error) + Send + Sync + 'static,
        on_terminated: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let defaults = ChainDefaults {
            on_failure: Some(Arc::new(on_failure)),
            on_terminated: Some(Arc::new(on_terminated)),
        };
        AsyncChain {
            run: Box::new(|callback: Callback<()>| callback.success(())),
            on_failure: defaults.on_failure.clone(),
            on_terminated: defaults.on_terminated.clone(),
            defaults,
        }
    }
}

impl<I: Send + 'static> AsyncChain<I> {
    /// Appends a step keeping the chain's default non-success handlers.
    pub fn call<O, F>(self, step: F) -> AsyncChain<O>
    where
        O: Send + 'static,
        F: FnOnce(I, Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        self.call_with(step, OnFailure::Default, OnTermination::Default)
    }

    /// Appends a step with its own choice of non-success handlers.
    pub fn call_with<O, F>(
        self,
        step: F,
        on_failure: OnFailure,
        on_terminated: OnTermination,
    ) -> AsyncChain<O>
    where
        O: Send + 'static,
        F: FnOnce(I, Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        let AsyncChain {
            run: prev_run,
            on_failure: prev_failure,
            on_terminated: prev_terminated,
            defaults,
        } = self;
        let step_failure = on_failure.resolve(&defaults.on_failure);
        let step_terminated = on_terminated.resolve(&defaults.on_terminated);

        let run = Box::new(move |callback: Callback<O>| {
            let setup_failure = prev_failure.clone();
            let relay = Callback::new()
                .on_success(move |input: I| {
                    // An error thrown by the step's synchronous setup becomes
                    // a failure attributed to the preceding segment.
                    if let Err(error) = step(input, callback) {
                        if let Some(handler) = setup_failure {
                            handler(error);
                        }
                    }
                })
                .on_failure(move |error| {
                    if let Some(handler) = prev_failure {
                        handler(error);
                    }
                })
                .on_terminated(move || {
                    if let Some(handler) = prev_terminated {
                        handler();
                    }
                });
            prev_run(relay);
        });

        AsyncChain {
            run,
            on_failure: step_failure,
            on_terminated: step_terminated,
            defaults,
        }
    }

    /// Appends a step that ignores the previous result, keeping the chain's
    /// default non-success handlers.
    pub fn supply<O, F>(self, step: F) -> AsyncChain<O>
    where
        O: Send + 'static,
        F: FnOnce(Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        self.supply_with(step, OnFailure::Default, OnTermination::Default)
    }

    /// Appends a step that ignores the previous result, with its own choice
    /// of non-success handlers.
    pub fn supply_with<O, F>(
        self,
        step: F,
        on_failure: OnFailure,
        on_terminated: OnTermination,
    ) -> AsyncChain<O>
    where
        O: Send + 'static,
        F: FnOnce(Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        self.call_with(
            move |_input, callback| step(callback),
            on_failure,
            on_terminated,
        )
    }

    /// Appends a side-effect step whose result is discarded: the chain keeps
    /// carrying this chain's value.
    pub fn call_and_discard<O, F>(self, step: F) -> AsyncChain<I>
    where
        I: Clone,
        O: Send + 'static,
        F: FnOnce(I, Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        self.call_and_discard_with(step, OnFailure::Default, OnTermination::Default)
    }

    /// [`call_and_discard`](AsyncChain::call_and_discard) with per-step
    /// non-success handlers.
    pub fn call_and_discard_with<O, F>(
        self,
        step: F,
        on_failure: OnFailure,
        on_terminated: OnTermination,
    ) -> AsyncChain<I>
    where
        I: Clone,
        O: Send + 'static,
        F: FnOnce(I, Callback<O>) -> anyhow::Result<()> + Send + 'static,
    {
        self.call_with(
            move |input: I, callback: Callback<I>| {
                let passthrough = input.clone();
                let Callback {
                    on_success,
                    on_failure,
                    on_terminated,
                } = callback;
                // Success of the inner step re-delivers the original input;
                // the other signals pass through untouched.
                let inner = Callback::<O> {
                    on_success: on_success.map(|deliver| {
                        Box::new(move |_: O| deliver(passthrough)) as Box<dyn FnOnce(O) + Send>
                    }),
                    on_failure,
                    on_terminated,
                };
                step(input, inner)
            },
            on_failure,
            on_terminated,
        )
    }

    /// Runs the chain, delivering the final value to `on_success`.
    ///
    /// An empty chain succeeds immediately with `()`. Non-success outcomes
    /// fire the effective handler of the step that produced them (subject to
    /// the setup-error attribution described on [`AsyncChain`]).
    pub fn execute(self, on_success: impl FnOnce(I) + Send + 'static) {
        let AsyncChain {
            run,
            on_failure,
            on_terminated,
            ..
        } = self;
        let mut callback = Callback::new().on_success(on_success);
        if let Some(handler) = on_failure {
            callback = callback.on_failure(move |error| handler(error));
        }
        if let Some(handler) = on_terminated {
            callback = callback.on_terminated(move || handler());
        }
        run(callback);
    }
}
