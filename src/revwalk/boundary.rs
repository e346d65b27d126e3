//! Boundary emission.
//!
//! After all interesting commits are produced, each uninteresting parent
//! of an emitted commit is produced once, tagged as a boundary commit.
//! The scratch mark keeps a parent shared by many emitted commits from
//! queueing twice.

use std::collections::VecDeque;

use super::commit::{flags, CommitIx, WalkState};
use super::errors::RevWalkError;
use super::generator::Generator;

/// Appends boundary parents after the interesting stream ends.
pub(crate) struct BoundaryGenerator {
    source: Option<Box<dyn Generator>>,
    boundary: VecDeque<CommitIx>,
    output_type: u32,
}

impl BoundaryGenerator {
    pub(crate) fn new(source: Box<dyn Generator>) -> Self {
        Self {
            output_type: source.output_type(),
            source: Some(source),
            boundary: VecDeque::new(),
        }
    }
}

impl Generator for BoundaryGenerator {
    fn output_type(&self) -> u32 {
        self.output_type
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        if let Some(source) = &mut self.source {
            match source.next(state)? {
                Some(c) => {
                    let parents = state.pool.get(c).parents.clone();
                    for p in parents {
                        let pf = state.pool.flags(p);
                        if pf & flags::UNINTERESTING != 0 && pf & flags::TEMP_MARK == 0 {
                            state.pool.add_flags(p, flags::TEMP_MARK);
                            self.boundary.push_back(p);
                        }
                    }
                    return Ok(Some(c));
                }
                None => self.source = None,
            }
        }

        let Some(b) = self.boundary.pop_front() else {
            return Ok(None);
        };
        state.parse_headers(b)?;
        state.pool.clear_flags(b, flags::TEMP_MARK);
        state.pool.add_flags(b, flags::BOUNDARY);
        Ok(Some(b))
    }
}
