//! Method descriptors.
//!
//! A [`MethodDescriptor`] is the static record for one remote operation:
//! the name callers use, the wire method, the exact argument count and
//! optional value formatters. Descriptors are immutable once built and are
//! shared behind an `Arc` by every [`Method`](crate::Method) bound from them.
//!
//! # Example
//!
//! ```
//! use account_rpc::descriptor::{formatter, MethodDescriptor};
//! use serde_json::Value;
//!
//! let sign = MethodDescriptor::new("sign", "account_sign", 2)
//!     .with_input_formatters(vec![Some(formatter(|v| Ok(v))), None])
//!     .unwrap()
//!     .with_output_formatter(formatter(|v: Value| Ok(v)));
//!
//! assert_eq!(sign.arity(), 2);
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::DescriptorError;

/// Value transform applied to an argument or a result.
///
/// Returning `Err(reason)` fails the call with [`Error::Format`](crate::Error::Format).
pub type Formatter = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Wrap a closure as a [`Formatter`].
pub fn formatter<F>(f: F) -> Formatter
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Static description of one remote operation.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    wire_name: String,
    arity: usize,
    input_formatters: Option<Vec<Option<Formatter>>>,
    output_formatter: Option<Formatter>,
}

impl MethodDescriptor {
    /// Descriptor with pass-through formatting.
    pub fn new(name: impl Into<String>, wire_name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            wire_name: wire_name.into(),
            arity,
            input_formatters: None,
            output_formatter: None,
        }
    }

    /// Attach one input formatter slot per argument.
    ///
    /// # Errors
    ///
    /// `FormatterCount` if the slot count differs from the arity.
    pub fn with_input_formatters(
        mut self,
        formatters: Vec<Option<Formatter>>,
    ) -> Result<Self, DescriptorError> {
        if formatters.len() != self.arity {
            return Err(DescriptorError::FormatterCount {
                name: self.name,
                arity: self.arity,
                formatters: formatters.len(),
            });
        }
        self.input_formatters = Some(formatters);
        Ok(self)
    }

    /// Attach a result formatter.
    pub fn with_output_formatter(mut self, formatter: Formatter) -> Self {
        self.output_formatter = Some(formatter);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Formatter for argument slot `index`, if one is set.
    pub fn input_formatter(&self, index: usize) -> Option<&Formatter> {
        self.input_formatters
            .as_ref()
            .and_then(|slots| slots.get(index))
            .and_then(Option::as_ref)
    }

    pub fn output_formatter(&self) -> Option<&Formatter> {
        self.output_formatter.as_ref()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = self
            .input_formatters
            .as_ref()
            .map(|slots| slots.iter().filter(|s| s.is_some()).count());
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name)
            .field("arity", &self.arity)
            .field("input_formatters", &inputs)
            .field("output_formatter", &self.output_formatter.is_some())
            .finish()
    }
}
