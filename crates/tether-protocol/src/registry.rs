//! Name-to-handler registry shared by the service and the client.
//!
//! The service registers the operations a client may request; the client
//! registers the relay operations (`emit-stdout`, `emit-stderr`,
//! `terminate`) the service may send back. Both resolve a name, check the
//! argument count against the declared [`Signature`], and invoke the handler
//! with access to shared state and the two output streams.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use crate::error::OperationError;

/// What the caller should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with normal processing.
    Continue,
    /// Stop with the given exit code.
    Terminate(i32),
}

/// Declared parameters of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    parameters: Vec<String>,
    variadic: Option<String>,
}

impl Signature {
    /// Signature with the given fixed positional parameters.
    #[must_use]
    pub fn new<I, P>(parameters: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            variadic: None,
        }
    }

    /// Signature taking no arguments.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            parameters: Vec::new(),
            variadic: None,
        }
    }

    /// Adds a trailing parameter that absorbs any further arguments.
    #[must_use]
    pub fn with_variadic(mut self, name: impl Into<String>) -> Self {
        self.variadic = Some(name.into());
        self
    }

    /// Returns `true` when `count` positional arguments satisfy the signature.
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        if self.variadic.is_some() {
            count >= self.parameters.len()
        } else {
            count == self.parameters.len()
        }
    }

    fn expected(&self) -> String {
        let fixed = self.parameters.len();
        let noun = if fixed == 1 { "argument" } else { "arguments" };
        match (fixed, self.variadic.is_some()) {
            (0, false) => String::from("no arguments"),
            (count, false) => format!("{count} {noun}"),
            (count, true) => format!("at least {count} {noun}"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variadic = self.variadic.iter().map(|name| format!("*{name}"));
        let rendered: Vec<String> = self.parameters.iter().cloned().chain(variadic).collect();
        write!(formatter, "({})", rendered.join(", "))
    }
}

/// Everything a handler receives for one call.
pub struct Invocation<'a, S, A> {
    /// Name the handler was resolved under.
    pub operation: &'a str,
    /// State shared across calls.
    pub state: &'a mut S,
    /// Standard output for the duration of the call.
    pub stdout: &'a mut dyn Write,
    /// Standard error for the duration of the call.
    pub stderr: &'a mut dyn Write,
    /// Positional arguments.
    pub arguments: &'a [A],
}

impl<'a, S, A> Invocation<'a, S, A> {
    /// Returns the positional argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidArgument`] when no argument exists at
    /// that position.
    pub fn argument(&self, index: usize) -> Result<&'a A, OperationError> {
        let arguments = self.arguments;
        arguments.get(index).ok_or_else(|| {
            OperationError::invalid_argument(self.operation, format!("missing argument {index}"))
        })
    }
}

/// Boxed handler stored in a [`Registry`].
pub type Handler<S, A> =
    Box<dyn Fn(Invocation<'_, S, A>) -> Result<Flow, OperationError> + Send + Sync>;

struct Entry<S, A> {
    signature: Signature,
    handler: Handler<S, A>,
}

/// Maps operation names to handlers.
///
/// Names are kept sorted so the catalogue shown for unknown operations is
/// stable. Registering an existing name replaces its handler.
pub struct Registry<S, A> {
    entries: BTreeMap<String, Entry<S, A>>,
    reserved: BTreeSet<String>,
}

impl<S, A> Default for Registry<S, A> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            reserved: BTreeSet::new(),
        }
    }
}

impl<S, A> fmt::Debug for Registry<S, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Registry")
            .field("operations", &self.entries.keys().collect::<Vec<_>>())
            .field("reserved", &self.reserved)
            .finish()
    }
}

impl<S, A> Registry<S, A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as unavailable for registration.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Returns `true` when `name` is reserved.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Registers `handler` under `name`, replacing any existing handler.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Reserved`] when `name` has been reserved.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        handler: F,
    ) -> Result<(), OperationError>
    where
        F: Fn(Invocation<'_, S, A>) -> Result<Flow, OperationError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.reserved.contains(&name) {
            return Err(OperationError::Reserved { name });
        }
        self.entries.insert(
            name,
            Entry {
                signature,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Returns `true` when a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered operation names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the signature registered for `name`.
    #[must_use]
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.entries.get(name).map(|entry| &entry.signature)
    }

    /// One line per operation in the form `  • name(parameters)`.
    #[must_use]
    pub fn catalogue(&self) -> String {
        self.entries
            .iter()
            .map(|(name, entry)| format!("  • {name}{}\n", entry.signature))
            .collect()
    }

    /// Resolves `invocation.operation` and runs its handler.
    ///
    /// A panicking handler is reported as [`OperationError::Panicked`] rather
    /// than unwinding into the caller.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] for unregistered names,
    /// [`OperationError::Arity`] when the argument count does not match, and
    /// any error the handler returns.
    pub fn dispatch(&self, invocation: Invocation<'_, S, A>) -> Result<Flow, OperationError> {
        let name = invocation.operation;
        let Some(entry) = self.entries.get(name) else {
            return Err(OperationError::UnknownOperation {
                name: name.to_owned(),
                catalogue: self.catalogue(),
            });
        };

        let given = invocation.arguments.len();
        if !entry.signature.accepts(given) {
            return Err(OperationError::Arity {
                name: name.to_owned(),
                signature: entry.signature.to_string(),
                expected: entry.signature.expected(),
                given,
            });
        }

        panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(invocation))).unwrap_or_else(
            |payload| {
                Err(OperationError::Panicked {
                    name: name.to_owned(),
                    message: panic_message(payload.as_ref()),
                })
            },
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
