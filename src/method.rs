//! Bound remote methods.
//!
//! A [`Method`] pairs one [`MethodDescriptor`] with a [`RequestManager`].
//! Two call shapes share the same send path:
//!
//! - [`Method::call`] returns a [`Call`] future
//! - [`Method::call_with`] takes a continuation that receives the outcome
//!
//! In both shapes a wrong argument count is reported synchronously, before
//! anything reaches the manager. Every other failure (input formatting,
//! transport, output formatting) is delivered through the shape the caller
//! picked.
//!
//! # Example
//!
//! ```ignore
//! let sign = Method::new(Arc::new(MethodDescriptor::new("sign", "account_sign", 2)), manager);
//!
//! let sig = sign.call(vec![json!("0xAddr"), json!("msgHash")])?.await?;
//!
//! sign.call_with(vec![json!("0xAddr"), json!("msgHash")], |outcome| {
//!     println!("{:?}", outcome);
//! })?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::MethodDescriptor;
use crate::error::{Error, Result};
use crate::manager::{RequestManager, ResponseFuture};

/// A descriptor bound to a request manager.
#[derive(Clone)]
pub struct Method {
    descriptor: Arc<MethodDescriptor>,
    manager: RequestManager,
}

impl Method {
    pub fn new(descriptor: Arc<MethodDescriptor>, manager: RequestManager) -> Self {
        Self {
            descriptor,
            manager,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    #[inline]
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Start a call and return its pending outcome.
    ///
    /// # Errors
    ///
    /// `ArityMismatch` when `args.len()` differs from the descriptor's arity.
    /// Nothing is sent in that case.
    pub fn call(&self, args: Vec<Value>) -> Result<Call> {
        self.check_arity(args.len())?;

        let state = match self
            .format_inputs(args)
            .and_then(|params| self.manager.send(self.descriptor.wire_name(), params))
        {
            Ok(response) => CallState::Waiting(response),
            Err(e) => CallState::Failed(Some(e)),
        };

        Ok(Call {
            descriptor: self.descriptor.clone(),
            state,
        })
    }

    /// Start a call and deliver its outcome to `callback` exactly once.
    ///
    /// The callback runs on a spawned task, never inside this function.
    ///
    /// # Errors
    ///
    /// `ArityMismatch`, returned synchronously; `callback` is not invoked.
    pub fn call_with<F>(&self, args: Vec<Value>, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let call = self.call(args)?;
        tokio::spawn(async move {
            callback(call.await);
        });
        Ok(())
    }

    fn check_arity(&self, got: usize) -> Result<()> {
        let expected = self.descriptor.arity();
        if got != expected {
            return Err(Error::ArityMismatch {
                method: self.descriptor.name().to_string(),
                expected,
                got,
            });
        }
        Ok(())
    }

    fn format_inputs(&self, args: Vec<Value>) -> Result<Vec<Value>> {
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| match self.descriptor.input_formatter(i) {
                Some(format) => format(arg).map_err(|reason| {
                    Error::format(self.descriptor.name(), format!("argument {}: {}", i, reason))
                }),
                None => Ok(arg),
            })
            .collect()
    }
}

enum CallState {
    Waiting(ResponseFuture),
    Failed(Option<Error>),
}

/// Pending outcome of one [`Method::call`].
///
/// Resolves to the result with the output formatter applied, or to the
/// first error hit along the way.
pub struct Call {
    descriptor: Arc<MethodDescriptor>,
    state: CallState,
}

impl Call {
    /// Correlation id, if the request made it onto the wire.
    pub fn id(&self) -> Option<u64> {
        match &self.state {
            CallState::Waiting(response) => Some(response.id()),
            CallState::Failed(_) => None,
        }
    }

    /// Await the call and deserialize the value.
    ///
    /// A value that does not fit `T` is reported as `Format`.
    pub async fn typed<T: DeserializeOwned>(self) -> Result<T> {
        let method = self.descriptor.name().to_string();
        let value = self.await?;
        serde_json::from_value(value).map_err(|e| Error::format(&method, e.to_string()))
    }

    fn finish(&self, value: Value) -> Result<Value> {
        match self.descriptor.output_formatter() {
            Some(format) => format(value).map_err(|reason| {
                Error::format(self.descriptor.name(), format!("result: {}", reason))
            }),
            None => Ok(value),
        }
    }
}

impl Future for Call {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match &mut self.state {
            CallState::Waiting(response) => match Pin::new(response).poll(cx) {
                Poll::Ready(outcome) => outcome,
                Poll::Pending => return Poll::Pending,
            },
            CallState::Failed(err) => {
                return Poll::Ready(Err(err.take().unwrap_or_else(|| {
                    Error::Protocol("call polled after completion".to_string())
                })));
            }
        };

        Poll::Ready(outcome.and_then(|value| self.finish(value)))
    }
}
