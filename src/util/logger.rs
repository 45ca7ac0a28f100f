use std::fmt::{Debug, Display, Formatter};

use super::Log;

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl<T> Log<T> {
    /// Order of the log level, used to decide whether a given trace site's
    /// level clears this logger's configured threshold.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<T> Log<T> {
    /// Prints `message()` when this logger's level is at or above `level`.
    /// The message is built lazily so untraced levels pay nothing beyond the
    /// `order()` comparison; the whole call compiles away in release builds.
    #[cfg(debug_assertions)]
    pub fn trace_at<F: FnOnce() -> String>(&self, level: Log<()>, message: F) {
        if self.order() >= level.order() {
            println!("{}", message());
        }
    }

    #[cfg(not(debug_assertions))]
    pub fn trace_at<F: FnOnce() -> String>(&self, _level: Log<()>, _message: F) {}
}

impl<T> Log<T> {
    /// A lexer-style trace: which position was queried and what the
    /// longest-match/precedence-pruned result was, mirroring `lang_pt`'s
    /// `LexemeSuccess`/`LexemeError` trace lines.
    pub fn trace_lex<D: Debug>(&self, position: usize, tokens: &[D], code: &super::Code) {
        if tokens.is_empty() {
            self.trace_at(Log::Result(()), || {
                format!("[Lexer; no match]: at {}", code.obtain_position(position))
            });
        } else {
            self.trace_at(Log::Success(()), || {
                format!(
                    "[Lexer; {} candidate(s)]: at {}: {:?}",
                    tokens.len(),
                    code.obtain_position(position),
                    tokens
                )
            });
        }
    }

    /// An EPN-driver trace: a non-terminal descent popped with a set of end
    /// positions (or none, meaning it failed from this start).
    pub fn trace_pop(&self, non_terminal: &str, start: usize, ends: &[usize], code: &super::Code) {
        if ends.is_empty() {
            self.trace_at(Log::Result(()), || {
                format!(
                    "[EPN; failed]: {} at {}",
                    non_terminal,
                    code.obtain_position(start)
                )
            });
        } else {
            self.trace_at(Log::Success(()), || {
                format!(
                    "[EPN; popped]: {} from {} to {:?}",
                    non_terminal,
                    code.obtain_position(start),
                    ends
                )
            });
        }
    }
}
