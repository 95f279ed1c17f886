//! Minimal pass/fail reporting harness.
//!
//! Cases are parameterless closures. A failing case is recorded and its
//! [`FailurePolicy`] decides whether the remaining cases still run.

use crate::error::Result;

/// What to do with the rest of the run after a case fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next case.
    #[default]
    Continue,
    /// Record the failure and skip every remaining case.
    Abort,
}

/// Result of one case.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub results: Vec<CaseResult>,
    pub skipped: usize,
}

impl Summary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// True when at least one case ran and none failed or were skipped.
    pub fn success(&self) -> bool {
        !self.results.is_empty() && self.failed() == 0 && self.skipped == 0
    }
}

type CaseFn<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

struct Case<'a> {
    name: String,
    policy: FailurePolicy,
    body: CaseFn<'a>,
}

#[derive(Default)]
pub struct Harness<'a> {
    cases: Vec<Case<'a>>,
}

impl<'a> Harness<'a> {
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Register a named case.
    pub fn case(
        &mut self,
        name: impl Into<String>,
        policy: FailurePolicy,
        body: impl FnOnce() -> Result<()> + 'a,
    ) -> &mut Self {
        self.cases.push(Case {
            name: name.into(),
            policy,
            body: Box::new(body),
        });
        self
    }

    /// Run every case in registration order.
    pub fn run(self) -> Summary {
        let total = self.cases.len();
        let mut summary = Summary::default();
        let mut cases = self.cases.into_iter();

        log::info!(">>> running {total} test case(s)");
        for case in cases.by_ref() {
            log::info!(">>> running case '{}'", case.name);
            let result = match (case.body)() {
                Ok(()) => {
                    log::info!(">>> '{}': passed", case.name);
                    CaseResult {
                        name: case.name,
                        passed: true,
                        details: String::new(),
                    }
                }
                Err(e) => {
                    log::error!(">>> '{}': failed: {e}", case.name);
                    CaseResult {
                        name: case.name,
                        passed: false,
                        details: e.to_string(),
                    }
                }
            };
            let abort = !result.passed && case.policy == FailurePolicy::Abort;
            summary.results.push(result);
            if abort {
                break;
            }
        }
        summary.skipped = cases.count();

        log::info!(
            ">>> {} passed, {} failed, {} skipped",
            summary.passed(),
            summary.failed(),
            summary.skipped
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrngError;

    #[test]
    fn test_continue_runs_everything() {
        let mut h = Harness::new();
        h.case("ok", FailurePolicy::Continue, || Ok(()));
        h.case("bad", FailurePolicy::Continue, || Err(TrngError::ResetNonReturn));
        h.case("ok again", FailurePolicy::Continue, || Ok(()));
        let summary = h.run();
        assert_eq!(summary.passed(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.skipped, 0);
        assert!(!summary.success());
        assert!(summary.results[1].details.contains("reset"));
    }

    #[test]
    fn test_abort_skips_the_rest() {
        let mut ran_last = false;
        {
            let mut h = Harness::new();
            h.case("bad", FailurePolicy::Abort, || Err(TrngError::ResetNonReturn));
            h.case("never", FailurePolicy::Continue, || {
                ran_last = true;
                Ok(())
            });
            let summary = h.run();
            assert_eq!(summary.results.len(), 1);
            assert_eq!(summary.skipped, 1);
        }
        assert!(!ran_last);
    }

    #[test]
    fn test_empty_run_is_not_a_success() {
        assert!(!Harness::new().run().success());
    }
}
