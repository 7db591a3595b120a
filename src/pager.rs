use crate::record::Record;

/// A fetch the caller should perform against the backend. Carries the skip
/// offset to request and the generation the result must present when it
/// comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: usize,
    pub generation: u64,
    pub reset: bool,
}

/// Outcome of asking the pager to start a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    Start(PageRequest),
    /// A fetch is already outstanding; the request was ignored.
    Busy,
    /// The stream previously returned a short page; load-more is a no-op.
    Exhausted,
}

/// Accumulates pages from a skip-paginated endpoint.
///
/// Rows are append-only on load-more and replaced wholesale on refresh. The
/// skip cursor advances by the page size after every successful non-reset
/// fetch and lands on the page size after a reset. A single in-flight flag
/// serializes fetches; a reset is allowed to supersede an outstanding fetch,
/// in which case the generation counter makes the superseded response stale
/// so pages can never apply out of order.
#[derive(Debug)]
pub struct Pager {
    rows: Vec<Record>,
    skip: usize,
    page_size: usize,
    generation: u64,
    in_flight: bool,
    exhausted: bool,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be positive");
        Self {
            rows: Vec::new(),
            skip: 0,
            page_size,
            generation: 0,
            in_flight: false,
            exhausted: false,
        }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Ask to start a fetch. Non-reset requests are refused while a fetch is
    /// outstanding or after exhaustion. A reset supersedes anything pending:
    /// it bumps the generation so the superseded response is discarded on
    /// arrival.
    pub fn begin(&mut self, reset: bool) -> FetchDecision {
        if reset {
            self.generation += 1;
            self.in_flight = true;
            return FetchDecision::Start(PageRequest {
                skip: 0,
                generation: self.generation,
                reset: true,
            });
        }
        if self.in_flight {
            return FetchDecision::Busy;
        }
        if self.exhausted {
            return FetchDecision::Exhausted;
        }
        self.in_flight = true;
        FetchDecision::Start(PageRequest {
            skip: self.skip,
            generation: self.generation,
            reset: false,
        })
    }

    /// Apply a successful page. Returns false when the response is stale
    /// (superseded by a reset) and was discarded without touching state.
    pub fn complete(&mut self, request: PageRequest, page: Vec<Record>) -> bool {
        if request.generation != self.generation {
            return false;
        }
        self.in_flight = false;
        let short = page.len() < self.page_size;
        if request.reset {
            self.rows = page;
            self.skip = self.page_size;
        } else {
            self.rows.extend(page);
            self.skip += self.page_size;
        }
        self.exhausted = short;
        true
    }

    /// Record a failed fetch. Rows and cursor are left exactly as they were;
    /// only the in-flight flag clears (unless the failure is stale).
    pub fn fail(&mut self, request: PageRequest) {
        if request.generation == self.generation {
            self.in_flight = false;
        }
    }

    /// Drop all accumulated state, e.g. on sign-out.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.skip = 0;
        self.generation += 1;
        self.in_flight = false;
        self.exhausted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| match json!({"id": i}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect()
    }

    fn start(pager: &mut Pager, reset: bool) -> PageRequest {
        match pager.begin(reset) {
            FetchDecision::Start(req) => req,
            other => panic!("expected fetch to start, got {:?}", other),
        }
    }

    #[test]
    fn test_cursor_accounting_over_successive_pages() {
        let mut pager = Pager::new(50);
        for k in 1..=3 {
            let req = start(&mut pager, false);
            assert_eq!(req.skip, (k - 1) * 50);
            assert!(pager.complete(req, page(50)));
            assert_eq!(pager.skip(), k * 50);
            assert_eq!(pager.len(), k * 50);
        }
    }

    #[test]
    fn test_reset_replaces_rows_and_cursor() {
        let mut pager = Pager::new(50);
        let req = start(&mut pager, false);
        assert!(pager.complete(req, page(50)));
        let req = start(&mut pager, false);
        assert!(pager.complete(req, page(50)));
        assert_eq!(pager.len(), 100);

        let req = start(&mut pager, true);
        assert_eq!(req.skip, 0);
        assert!(pager.complete(req, page(50)));
        assert_eq!(pager.len(), 50);
        assert_eq!(pager.skip(), 50);
    }

    #[test]
    fn test_short_page_marks_exhausted() {
        let mut pager = Pager::new(50);
        let req = start(&mut pager, false);
        assert!(pager.complete(req, page(30)));
        assert_eq!(pager.len(), 30);
        assert_eq!(pager.skip(), 50);
        assert!(pager.exhausted());
        assert_eq!(pager.begin(false), FetchDecision::Exhausted);
        // A refresh clears exhaustion.
        let req = start(&mut pager, true);
        assert!(pager.complete(req, page(50)));
        assert!(!pager.exhausted());
    }

    #[test]
    fn test_in_flight_suppresses_load_more() {
        let mut pager = Pager::new(50);
        let _req = start(&mut pager, false);
        assert_eq!(pager.begin(false), FetchDecision::Busy);
    }

    #[test]
    fn test_failure_leaves_state_untouched() {
        let mut pager = Pager::new(50);
        let req = start(&mut pager, false);
        assert!(pager.complete(req, page(50)));

        let req = start(&mut pager, false);
        pager.fail(req);
        assert_eq!(pager.len(), 50);
        assert_eq!(pager.skip(), 50);
        assert!(!pager.in_flight());
        // The next load-more retries the same offset.
        let retry = start(&mut pager, false);
        assert_eq!(retry.skip, 50);
    }

    #[test]
    fn test_reset_supersedes_outstanding_fetch() {
        let mut pager = Pager::new(50);
        let stale = start(&mut pager, false);
        let fresh = start(&mut pager, true);
        assert!(fresh.generation > stale.generation);

        // The superseded response arrives late and must be dropped.
        assert!(!pager.complete(stale, page(50)));
        assert!(pager.is_empty());

        assert!(pager.complete(fresh, page(50)));
        assert_eq!(pager.len(), 50);
        assert_eq!(pager.skip(), 50);
    }

    #[test]
    fn test_stale_failure_does_not_clear_in_flight() {
        let mut pager = Pager::new(50);
        let stale = start(&mut pager, false);
        let _fresh = start(&mut pager, true);
        pager.fail(stale);
        assert!(pager.in_flight());
    }
}
