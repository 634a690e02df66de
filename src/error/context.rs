//! Context chaining for errors raised deep inside a translation or a driver call

use super::Error;
use std::fmt;

/// Adds a context message to the error side of a `Result`
pub trait ErrorContext<T> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;

    /// Lazily evaluated variant of [`ErrorContext::context`]
    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Flattened view of a context chain, outermost message first
pub struct ErrorChain<'a> {
    error: &'a Error,
    chain: Vec<String>,
}

impl<'a> ErrorChain<'a> {
    pub fn new(error: &'a Error) -> Self {
        let mut chain = Vec::new();
        let mut current = error;
        loop {
            match current {
                Error::WithContext { message, source } => {
                    chain.push(message.clone());
                    current = source;
                }
                other => {
                    chain.push(other.to_string());
                    break;
                }
            }
        }
        Self { error, chain }
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// The innermost error, with every context layer removed
    pub fn root_cause(&self) -> &Error {
        let mut current = self.error;
        while let Error::WithContext { source, .. } = current {
            current = source;
        }
        current
    }
}

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain.join(" -> "))
    }
}

/// Turns a missing value into an [`Error::Internal`]
pub trait OptionExt<T> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.ok_or_else(|| Error::internal(context))
    }
}
