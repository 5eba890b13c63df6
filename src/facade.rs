//! Facade binding - a name-keyed set of [`Method`]s over one manager.
//!
//! Binding is a single synchronous pass over a descriptor list. The facade
//! is never mutated afterwards; binding the same list again onto a fresh
//! facade gives equivalent behavior.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::descriptor::MethodDescriptor;
use crate::error::{DescriptorError, Error, Result};
use crate::manager::RequestManager;
use crate::method::{Call, Method};

/// Methods bound from a descriptor list, all sharing one [`RequestManager`].
#[derive(Clone)]
pub struct Facade {
    manager: RequestManager,
    methods: HashMap<String, Method>,
    /// Names in descriptor order.
    order: Vec<String>,
}

impl Facade {
    /// Bind every descriptor onto `manager`.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if two descriptors share a name.
    pub fn bind<I>(
        descriptors: I,
        manager: RequestManager,
    ) -> std::result::Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = MethodDescriptor>,
    {
        let mut methods = HashMap::new();
        let mut order = Vec::new();

        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            if methods.contains_key(&name) {
                return Err(DescriptorError::DuplicateName(name));
            }
            tracing::debug!(name = %name, wire = descriptor.wire_name(), "binding method");
            methods.insert(name.clone(), Method::new(Arc::new(descriptor), manager.clone()));
            order.push(name);
        }

        Ok(Self {
            manager,
            methods,
            order,
        })
    }

    /// Look up a bound method by name.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Call a bound method by name.
    ///
    /// # Errors
    ///
    /// `Protocol` for an unknown name, otherwise as [`Method::call`].
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Call> {
        self.methods
            .get(name)
            .ok_or_else(|| Error::Protocol(format!("unknown method: {}", name)))?
            .call(args)
    }

    /// Bound names in descriptor order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// The shared manager.
    pub fn manager(&self) -> &RequestManager {
        &self.manager
    }
}
