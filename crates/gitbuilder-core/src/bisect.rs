//! Fault localizer: pick the next commit to build between a known-good and
//! a known-bad commit.
//!
//! Candidates come from the [`BisectionOracle`] restricted to first-parent
//! history, best midpoint first. The first candidate that is still untested
//! (and is neither endpoint) is returned, so each build halves the interval
//! until the bad commit's first parent is the good commit. At that point
//! there are no candidates left and the bad commit is the regression.

use std::sync::Arc;

use tracing::{debug, info};
use verdict_state::{Verdict, VerdictLedger};

use crate::domain::Result;
use crate::vcs::BisectionOracle;

/// Bisection over a (good, bad) interval.
#[derive(Clone)]
pub struct FaultLocalizer {
    oracle: Arc<dyn BisectionOracle>,
    ledger: Arc<dyn VerdictLedger>,
}

impl FaultLocalizer {
    pub fn new(oracle: Arc<dyn BisectionOracle>, ledger: Arc<dyn VerdictLedger>) -> Self {
        Self { oracle, ledger }
    }

    /// Next commit to build strictly between `good` and `bad`, or `None`
    /// when either endpoint is missing or the interval is exhausted.
    ///
    /// Only ledger read errors are returned; oracle failures are logged
    /// and treated as "no candidate".
    pub async fn bisect(&self, good: Option<&str>, bad: &str) -> Result<Option<String>> {
        let good = match good {
            Some(g) if !g.is_empty() && !bad.is_empty() => g,
            _ => {
                debug!(bad = %bad, "no known-good boundary, nothing to bisect");
                return Ok(None);
            }
        };

        let candidates = self.candidates(good, bad).await;
        for candidate in candidates {
            if candidate == good || candidate == bad {
                continue;
            }
            if self.ledger.verdict(&candidate).await? == Verdict::Untested {
                debug!(good = %good, bad = %bad, candidate = %candidate, "bisection candidate");
                return Ok(Some(candidate));
            }
        }

        debug!(good = %good, bad = %bad, "bisection interval exhausted");
        Ok(None)
    }

    async fn candidates(&self, good: &str, bad: &str) -> Vec<String> {
        match self.oracle.bisect_all(good, bad).await {
            Ok(all) => return all,
            Err(e) => info!(good = %good, bad = %bad, error = %e, "bisect-all failed"),
        }
        match self.oracle.bisect_one(good, bad).await {
            Ok(one) => one.into_iter().collect(),
            Err(e) => {
                info!(good = %good, bad = %bad, error = %e, "bisect failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeRepo;
    use verdict_state::fakes::MemoryVerdictLedger;

    // Newest first: h9 is the tip, h0 the root.
    const LINE: [&str; 10] = [
        "9999", "8888", "7777", "6666", "5555", "4444", "3333", "2222", "1111", "0000",
    ];

    fn localizer(repo: FakeRepo, ledger: MemoryVerdictLedger) -> FaultLocalizer {
        FaultLocalizer::new(Arc::new(repo), Arc::new(ledger))
    }

    #[tokio::test]
    async fn missing_endpoint_yields_none() {
        let loc = localizer(
            FakeRepo::new().with_branch("origin/main", &LINE),
            MemoryVerdictLedger::new(),
        );
        assert_eq!(loc.bisect(None, "9999").await.unwrap(), None);
        assert_eq!(loc.bisect(Some(""), "9999").await.unwrap(), None);
        assert_eq!(loc.bisect(Some("0000"), "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn returns_interior_midpoint() {
        let loc = localizer(
            FakeRepo::new().with_branch("origin/main", &LINE),
            MemoryVerdictLedger::new(),
        );
        let got = loc.bisect(Some("0000"), "9999").await.unwrap().unwrap();
        assert_ne!(got, "0000");
        assert_ne!(got, "9999");
        // eight interior commits, the midpoint splits them 4/4 or 3/4
        assert!(["5555", "4444"].contains(&got.as_str()), "got {got}");
    }

    #[tokio::test]
    async fn adjacent_endpoints_have_no_candidate() {
        let loc = localizer(
            FakeRepo::new().with_branch("origin/main", &LINE),
            MemoryVerdictLedger::new(),
        );
        assert_eq!(loc.bisect(Some("4444"), "5555").await.unwrap(), None);
    }

    #[tokio::test]
    async fn skips_candidates_that_already_have_verdicts() {
        let ledger = MemoryVerdictLedger::with_verdicts([
            ("5555", Verdict::Ignore),
            ("4444", Verdict::Ignore),
        ]);
        let loc = localizer(FakeRepo::new().with_branch("origin/main", &LINE), ledger);
        let got = loc.bisect(Some("0000"), "9999").await.unwrap().unwrap();
        assert!(!["5555", "4444"].contains(&got.as_str()));
    }

    #[tokio::test]
    async fn falls_back_to_single_midpoint() {
        let repo = FakeRepo::new()
            .with_branch("origin/main", &LINE)
            .without_bisect_all();
        let loc = localizer(repo, MemoryVerdictLedger::new());
        let got = loc.bisect(Some("0000"), "9999").await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn oracle_failure_is_not_fatal() {
        let repo = FakeRepo::new()
            .with_branch("origin/main", &LINE)
            .without_bisect_all()
            .without_bisect_one();
        let loc = localizer(repo, MemoryVerdictLedger::new());
        assert_eq!(loc.bisect(Some("0000"), "9999").await.unwrap(), None);
    }
}
