//! Aggregation of group exit codes under the halt and master policies.

/// Why the pool adopted a single group's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchReason {
    HaltOnFailure,
    Master,
}

/// Effect of observing one group's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Added to the running sum
    Accumulated,
    /// Adopted as the final result; the other groups must be terminated
    Latched(LatchReason),
    /// A result was already decided; the code is ignored
    Ignored,
}

/// Running result of a pool: the unsigned sum of every exit code, unless a
/// halt or master decision latched a single code first.
///
/// Once latched, the decision is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    halt_on_failure: bool,
    master_index: Option<usize>,
    sum: u32,
    decided: Option<i32>,
}

impl Verdict {
    pub fn new(halt_on_failure: bool, master_index: Option<usize>) -> Self {
        Self {
            halt_on_failure,
            master_index,
            sum: 0,
            decided: None,
        }
    }

    pub fn observe(&mut self, index: usize, code: i32) -> Decision {
        if self.decided.is_some() {
            return Decision::Ignored;
        }

        let reason = if self.halt_on_failure && code != 0 {
            Some(LatchReason::HaltOnFailure)
        } else if self.master_index == Some(index) {
            Some(LatchReason::Master)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                self.decided = Some(code);
                Decision::Latched(reason)
            }
            None => {
                self.sum = self.sum.wrapping_add(code as u32);
                Decision::Accumulated
            }
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided.is_some()
    }

    pub fn exit_code(&self) -> u32 {
        match self.decided {
            Some(code) => code as u32,
            None => self.sum,
        }
    }
}
