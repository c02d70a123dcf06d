//! Pagination failure policy
//!
//! A [`Paginator`] owns the cursor of one (entity, congress) stream and
//! decides, for every fetch result, whether to advance, retry the same
//! offset, stop, or abort the run:
//!
//! - 404 at any offset is end-of-data.
//! - Other failures retry the same offset; the offset never advances on
//!   failure. More than `max_consecutive` failures in a row stop the stream.
//! - Success resets the consecutive counter.
//! - Every failure is also charged to the run-wide [`ErrorBudget`], which
//!   never resets. Exceeding it aborts the run.

use crate::error::SyncError;
use crate::upstream::{Page, PageRequest};

/// The run-wide failure budget was exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Run aborted: {total} page fetch failures exceed the budget of {max}")]
pub struct BudgetExceeded {
    /// Failures charged so far
    pub total: u32,
    /// Configured budget
    pub max: u32,
}

/// Monotonic failure counter spanning one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudget {
    total_errors: u32,
    max_total: u32,
}

impl ErrorBudget {
    /// A fresh budget allowing `max_total` failures
    pub fn new(max_total: u32) -> Self {
        Self {
            total_errors: 0,
            max_total,
        }
    }

    /// Charge one failure
    pub fn record(&mut self) -> Result<(), BudgetExceeded> {
        self.total_errors = self.total_errors.saturating_add(1);
        if self.total_errors > self.max_total {
            Err(BudgetExceeded {
                total: self.total_errors,
                max: self.max_total,
            })
        } else {
            Ok(())
        }
    }

    /// Failures charged so far
    pub fn total(&self) -> u32 {
        self.total_errors
    }

    /// True once the budget has been exceeded
    pub fn is_exhausted(&self) -> bool {
        self.total_errors > self.max_total
    }
}

/// What the caller should do after a fetch
#[derive(Debug)]
pub enum PageStep<T> {
    /// Process these items; the cursor has advanced or the stream is done
    Page(Page<T>),
    /// Fetch the same offset again
    RetrySameOffset {
        /// The failure
        error: SyncError,
        /// Failures in a row at this offset
        consecutive: u32,
    },
    /// The stream ended normally
    EndOfData,
    /// Too many failures in a row; the stream stopped without advancing
    Stalled {
        /// The last failure
        error: SyncError,
        /// Offset that could not be fetched
        offset: u32,
    },
}

/// Cursor plus consecutive-failure state for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    cursor: PageRequest,
    consecutive_errors: u32,
    max_consecutive: u32,
    finished: bool,
}

impl Paginator {
    /// Start at offset 0
    pub fn new(limit: u32, max_consecutive: u32) -> Self {
        Self {
            cursor: PageRequest::first(limit),
            consecutive_errors: 0,
            max_consecutive,
            finished: false,
        }
    }

    /// Page to fetch next
    pub fn request(&self) -> PageRequest {
        self.cursor
    }

    /// True once the stream ended, stalled or was aborted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Failures in a row at the current offset
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Apply a fetch result for [`Paginator::request`]
    pub fn step<T>(
        &mut self,
        result: Result<Page<T>, SyncError>,
        budget: &mut ErrorBudget,
    ) -> Result<PageStep<T>, BudgetExceeded> {
        match result {
            Ok(page) => {
                self.consecutive_errors = 0;
                match page.next_offset {
                    Some(offset) if offset > self.cursor.offset => self.cursor.offset = offset,
                    _ => self.finished = true,
                }
                Ok(PageStep::Page(page))
            }
            Err(err) if err.is_not_found() => {
                self.finished = true;
                Ok(PageStep::EndOfData)
            }
            Err(error) => {
                self.consecutive_errors += 1;
                if let Err(exceeded) = budget.record() {
                    self.finished = true;
                    return Err(exceeded);
                }
                if self.consecutive_errors > self.max_consecutive {
                    self.finished = true;
                    return Ok(PageStep::Stalled {
                        error,
                        offset: self.cursor.offset,
                    });
                }
                Ok(PageStep::RetrySameOffset {
                    error,
                    consecutive: self.consecutive_errors,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: Vec<u32>, next_offset: Option<u32>) -> Result<Page<u32>, SyncError> {
        Ok(Page {
            items,
            next_offset,
            total_count: None,
            rejected: Vec::new(),
        })
    }

    fn server_error() -> Result<Page<u32>, SyncError> {
        Err(SyncError::Upstream {
            status: 500,
            endpoint: "/bill/118".to_string(),
            retry_after: None,
        })
    }

    fn not_found() -> Result<Page<u32>, SyncError> {
        Err(SyncError::NotFound {
            endpoint: "/bill/118".to_string(),
        })
    }

    // Test 1: pages advance by the reported next offset
    #[test]
    fn test_advances_on_success() {
        let mut paginator = Paginator::new(2, 3);
        let mut budget = ErrorBudget::new(100);

        assert_eq!(paginator.request().offset, 0);
        assert!(matches!(
            paginator.step(page(vec![1, 2], Some(2)), &mut budget),
            Ok(PageStep::Page(_))
        ));
        assert_eq!(paginator.request().offset, 2);
        assert!(!paginator.is_finished());

        paginator.step(page(vec![3], None), &mut budget).unwrap();
        assert!(paginator.is_finished());
    }

    // Test 2: 404 at offset N > 0 ends the stream without charging the budget
    #[test]
    fn test_not_found_mid_stream_is_end_of_data() {
        let mut paginator = Paginator::new(2, 3);
        let mut budget = ErrorBudget::new(100);

        paginator.step(page(vec![1, 2], Some(2)), &mut budget).unwrap();
        assert!(matches!(
            paginator.step(not_found(), &mut budget),
            Ok(PageStep::EndOfData)
        ));
        assert!(paginator.is_finished());
        assert_eq!(budget.total(), 0);
    }

    // Test 3: 404 at offset 0 ends the stream with zero items
    #[test]
    fn test_not_found_first_page() {
        let mut paginator = Paginator::new(250, 3);
        let mut budget = ErrorBudget::new(100);

        assert!(matches!(
            paginator.step(not_found(), &mut budget),
            Ok(PageStep::EndOfData)
        ));
        assert_eq!(budget.total(), 0);
    }

    // Test 4: failures at offset 40 retry 40; the 4th stalls without advancing
    #[test]
    fn test_same_offset_retry_then_stall() {
        let mut paginator = Paginator::new(20, 3);
        let mut budget = ErrorBudget::new(100);

        paginator.step(page(vec![0; 20], Some(20)), &mut budget).unwrap();
        paginator.step(page(vec![0; 20], Some(40)), &mut budget).unwrap();
        assert_eq!(paginator.request().offset, 40);

        for attempt in 1..=3 {
            match paginator.step(server_error(), &mut budget).unwrap() {
                PageStep::RetrySameOffset { consecutive, .. } => assert_eq!(consecutive, attempt),
                other => panic!("Expected retry, got {:?}", other),
            }
            assert_eq!(paginator.request().offset, 40);
        }

        match paginator.step(server_error(), &mut budget).unwrap() {
            PageStep::Stalled { offset, .. } => assert_eq!(offset, 40),
            other => panic!("Expected stall, got {:?}", other),
        }
        assert!(paginator.is_finished());
        assert_eq!(paginator.request().offset, 40);
        assert_eq!(budget.total(), 4);
    }

    // Test 5: success resets the consecutive counter
    #[test]
    fn test_success_resets_consecutive() {
        let mut paginator = Paginator::new(10, 3);
        let mut budget = ErrorBudget::new(100);

        paginator.step(server_error(), &mut budget).unwrap();
        paginator.step(server_error(), &mut budget).unwrap();
        assert_eq!(paginator.consecutive_errors(), 2);

        paginator.step(page(vec![1], Some(10)), &mut budget).unwrap();
        assert_eq!(paginator.consecutive_errors(), 0);

        for _ in 0..3 {
            assert!(matches!(
                paginator.step(server_error(), &mut budget).unwrap(),
                PageStep::RetrySameOffset { .. }
            ));
        }
        // Total failures keep accumulating across resets
        assert_eq!(budget.total(), 5);
    }

    // Test 6: the run-wide budget aborts even under the per-offset threshold
    #[test]
    fn test_budget_exceeded_aborts() {
        let mut budget = ErrorBudget::new(4);
        let mut first = Paginator::new(10, 3);
        let mut second = Paginator::new(10, 3);

        for _ in 0..2 {
            first.step(server_error(), &mut budget).unwrap();
        }
        first.step(page(vec![1], None), &mut budget).unwrap();
        for _ in 0..2 {
            second.step(server_error(), &mut budget).unwrap();
        }

        let exceeded = second.step(server_error(), &mut budget).unwrap_err();
        assert_eq!(exceeded, BudgetExceeded { total: 5, max: 4 });
        assert!(second.is_finished());
        assert!(budget.is_exhausted());
    }

    // Test 7: a next offset that does not move forward ends the stream
    #[test]
    fn test_non_advancing_next_offset_finishes() {
        let mut paginator = Paginator::new(10, 3);
        let mut budget = ErrorBudget::new(100);

        paginator.step(page(vec![1], Some(10)), &mut budget).unwrap();
        paginator.step(page(vec![2], Some(10)), &mut budget).unwrap();
        assert!(paginator.is_finished());
    }
}
