//! The CIP format reader plugin.

use crate::io::cip;
use crate::model::Problem;
use crate::plugins::Named;
use crate::plugins::Reader;
use crate::results::GourdResult;

pub const NAME: &str = "cipreader";

#[derive(Debug, Default)]
pub struct CipReader;

impl Named for CipReader {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "reads and writes problems in CIP format"
    }
}

impl Reader for CipReader {
    fn extension(&self) -> &str {
        "cip"
    }

    fn read(&self, content: &str) -> GourdResult<Problem> {
        cip::read(content)
    }

    fn write(&self, problem: &Problem) -> GourdResult<String> {
        Ok(cip::write(problem))
    }
}
