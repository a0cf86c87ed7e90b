/// Outcome of interpreting model output. Malformed output is expected
/// traffic, not an error: callers retry or fall back.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    Malformed(String),
}

impl<T> Decoded<T> {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Decoded::Malformed(reason.into())
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Parsed(value) => Some(value),
            Decoded::Malformed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }
}
