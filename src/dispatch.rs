//! Invocation dispatch.
//!
//! Routes an inbound invocation to local handler code. Two tiers:
//!
//! - **Typed operations**, registered by target name on a [`Dispatcher`].
//!   Each is an async function taking the shared handler plus statically
//!   typed parameters; raw JSON arguments are decoded into those types
//!   before the call.
//! - **Catch-all**, [`Handler::handle`], which receives the target name
//!   and the untouched raw arguments.
//!
//! A typed operation runs only when the target matches, the argument
//! count equals the operation's arity, and every argument decodes.
//! Anything else falls through to the catch-all, so a handler can start
//! with a single `handle` and grow typed operations one target at a time.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(bot)
//!     .on("receiveMessage", |bot: Arc<Bot>, text: String| async move {
//!         bot.show(&text);
//!     })
//!     .on("requestStep", |bot: Arc<Bot>| async move { bot.step().await });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::FALLBACK_TARGET;
use crate::error::{HubError, Result};

/// Local handler for invocations arriving from the hub.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Catch-all entry point for targets with no matching typed operation.
    async fn handle(&self, target: &str, arguments: Vec<Value>) -> anyhow::Result<()>;

    /// Called once when the connection becomes ready to receive.
    fn on_start(&self) {}
}

/// Result of running a typed operation.
#[derive(Debug)]
pub enum Outcome {
    /// Completed; nothing to report.
    Done,
    /// Failed; propagated to the receive loop.
    Failed(anyhow::Error),
    /// Returned a value the dispatcher has no use for.
    Unrecognized(String),
}

/// Conversion from an operation's return value into an [`Outcome`].
pub trait IntoOutcome {
    /// Classify this return value.
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Done
    }
}

impl<E: Into<anyhow::Error>> IntoOutcome for std::result::Result<(), E> {
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(()) => Outcome::Done,
            Err(e) => Outcome::Failed(e.into()),
        }
    }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Outcome {
        match self {
            Value::Null => Outcome::Done,
            other => Outcome::Unrecognized(other.to_string()),
        }
    }
}

/// An argument that did not decode into its declared parameter type.
#[derive(Debug)]
pub struct ArgumentError {
    /// Zero-based argument position.
    pub index: usize,
    /// Decoder message.
    pub reason: String,
}

impl std::fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "argument {}: {}", self.index, self.reason)
    }
}

impl std::error::Error for ArgumentError {}

fn decode_argument<T: DeserializeOwned>(
    arguments: &[Value],
    index: usize,
) -> Result<T, ArgumentError> {
    let raw = arguments.get(index).ok_or_else(|| ArgumentError {
        index,
        reason: "missing".to_string(),
    })?;
    T::deserialize(raw).map_err(|e| ArgumentError {
        index,
        reason: e.to_string(),
    })
}

/// A typed operation callable with `Args` decoded from raw JSON.
///
/// Implemented for async closures and functions of the form
/// `Fn(Arc<H>, A1, .., An) -> impl Future` for `n` up to 6, where every
/// `Ai: DeserializeOwned`. The `Args` parameter only disambiguates the
/// arities; callers never name it.
pub trait Operation<H, Args>: Send + Sync + 'static {
    /// Number of arguments the operation expects.
    fn arity(&self) -> usize;

    /// Decode all arguments and, if every one succeeds, start the call.
    fn prepare(
        &self,
        handler: Arc<H>,
        arguments: &[Value],
    ) -> Result<BoxFuture<'static, Outcome>, ArgumentError>;
}

macro_rules! impl_operation {
    ($($index:tt $ty:ident $var:ident),*) => {
        impl<H, F, Fut, R, $($ty,)*> Operation<H, ($($ty,)*)> for F
        where
            H: Send + Sync + 'static,
            F: Fn(Arc<H>, $($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoOutcome,
            $($ty: DeserializeOwned + Send + 'static,)*
        {
            fn arity(&self) -> usize {
                <[&str]>::len(&[$(stringify!($ty)),*])
            }

            #[allow(unused_variables, reason = "zero-arity operations ignore their arguments")]
            fn prepare(
                &self,
                handler: Arc<H>,
                arguments: &[Value],
            ) -> Result<BoxFuture<'static, Outcome>, ArgumentError> {
                $(let $var: $ty = decode_argument(arguments, $index)?;)*
                let call = (self)(handler, $($var),*);
                Ok(Box::pin(async move { call.await.into_outcome() }))
            }
        }
    };
}

impl_operation!();
impl_operation!(0 A1 a1);
impl_operation!(0 A1 a1, 1 A2 a2);
impl_operation!(0 A1 a1, 1 A2 a2, 2 A3 a3);
impl_operation!(0 A1 a1, 1 A2 a2, 2 A3 a3, 3 A4 a4);
impl_operation!(0 A1 a1, 1 A2 a2, 2 A3 a3, 3 A4 a4, 4 A5 a5);
impl_operation!(0 A1 a1, 1 A2 a2, 2 A3 a3, 3 A4 a4, 4 A5 a5, 5 A6 a6);

/// Object-safe view of an [`Operation`] with its `Args` erased.
trait ErasedOperation<H>: Send + Sync {
    fn arity(&self) -> usize;
    fn prepare(
        &self,
        handler: Arc<H>,
        arguments: &[Value],
    ) -> Result<BoxFuture<'static, Outcome>, ArgumentError>;
}

struct Erased<Op, Args> {
    op: Op,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Op, Args> ErasedOperation<H> for Erased<Op, Args>
where
    Op: Operation<H, Args>,
    Args: 'static,
{
    fn arity(&self) -> usize {
        self.op.arity()
    }

    fn prepare(
        &self,
        handler: Arc<H>,
        arguments: &[Value],
    ) -> Result<BoxFuture<'static, Outcome>, ArgumentError> {
        self.op.prepare(handler, arguments)
    }
}

/// Table of typed operations in front of a catch-all [`Handler`].
///
/// Built once at setup time; dispatch is a map lookup.
pub struct Dispatcher<H> {
    handler: Arc<H>,
    operations: HashMap<String, Box<dyn ErasedOperation<H>>>,
}

impl<H: Handler> Dispatcher<H> {
    /// Create a dispatcher with no typed operations.
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Create a dispatcher around an already shared handler.
    pub fn from_arc(handler: Arc<H>) -> Self {
        Self {
            handler,
            operations: HashMap::new(),
        }
    }

    /// Register a typed operation for `target`, replacing any previous one.
    ///
    /// The reserved fallback name is never routed to a typed operation, so
    /// registering it is ignored.
    #[must_use]
    pub fn on<Args, Op>(mut self, target: impl Into<String>, op: Op) -> Self
    where
        Op: Operation<H, Args>,
        Args: 'static,
    {
        let target = target.into();
        if target == FALLBACK_TARGET {
            log::warn!("Ignoring typed operation for reserved target '{}'", target);
            return self;
        }
        let erased = Erased {
            op,
            _args: PhantomData,
        };
        self.operations.insert(target, Box::new(erased));
        self
    }

    /// The shared handler.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Whether a typed operation is registered for `target`.
    pub fn has_operation(&self, target: &str) -> bool {
        self.operations.contains_key(target)
    }

    /// Route one invocation.
    ///
    /// Errors from the typed operation or the catch-all are returned as
    /// [`HubError::Handler`].
    pub async fn dispatch(&self, target: &str, arguments: Vec<Value>) -> Result<()> {
        if let Some(call) = self.typed_call(target, &arguments) {
            log::debug!("Dispatching '{}' to typed operation", target);
            return match call.await {
                Outcome::Done => Ok(()),
                Outcome::Failed(e) => Err(HubError::handler(target, &e)),
                Outcome::Unrecognized(value) => {
                    log::warn!("Operation '{}' returned unrecognized value: {}", target, value);
                    Ok(())
                }
            };
        }

        log::debug!("Dispatching '{}' to catch-all handler", target);
        self.handler
            .handle(target, arguments)
            .await
            .map_err(|e| HubError::handler(target, &e))
    }

    fn typed_call(&self, target: &str, arguments: &[Value]) -> Option<BoxFuture<'static, Outcome>> {
        if target == FALLBACK_TARGET {
            return None;
        }
        let op = self.operations.get(target)?;
        if op.arity() != arguments.len() {
            log::debug!(
                "'{}' expects {} arguments, got {}",
                target,
                op.arity(),
                arguments.len()
            );
            return None;
        }
        match op.prepare(Arc::clone(&self.handler), arguments) {
            Ok(call) => Some(call),
            Err(e) => {
                log::debug!("'{}' {}; using catch-all", target, e);
                None
            }
        }
    }
}

impl<H> std::fmt::Debug for Dispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        targets.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("operations", &targets)
            .finish_non_exhaustive()
    }
}
