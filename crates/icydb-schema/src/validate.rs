use std::fmt;

///
/// ErrorTree
///
/// Accumulates validation failures across a node tree instead of failing
/// fast on the first one, so a catalog import reports every problem in a
/// schema file at once.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorTree {
    messages: Vec<String>,
}

impl ErrorTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn merge(&mut self, other: Self) {
        self.messages.extend(other.messages);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Convert to `Result`, `Ok(())` when nothing was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join("; "))
    }
}

impl std::error::Error for ErrorTree {}

///
/// ValidateNode
///
/// Implemented by every schema node that can fail validation. The default
/// implementation accepts — leaf nodes with no invariants of their own
/// don't need to override it.
///

pub trait ValidateNode {
    fn validate(&self) -> Result<(), ErrorTree> {
        Ok(())
    }
}
