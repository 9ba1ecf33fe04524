//! The file reader/writer interface.

use super::registry::Named;
use crate::model::Problem;
use crate::results::Error;
use crate::results::GourdResult;

/// Reads problems from and writes problems to one file format.
pub trait Reader: Named {
    /// The file extension the reader is responsible for, without the dot.
    fn extension(&self) -> &str;

    /// Parses a problem from file contents.
    fn read(&self, content: &str) -> GourdResult<Problem> {
        let _ = content;
        Err(Error::ReadError(format!(
            "reader '{}' cannot parse problems",
            self.name()
        )))
    }

    /// Renders a problem into file contents.
    fn write(&self, problem: &Problem) -> GourdResult<String> {
        let _ = problem;
        Err(Error::WriteError(format!(
            "reader '{}' cannot write problems",
            self.name()
        )))
    }
}
