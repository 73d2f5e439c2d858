//! Fan-out/fan-in page processing.
//!
//! One tokio task per page, each an OCR call under the remote-api policy.
//! Every task is awaited before aggregation; a failed page never stops the
//! others. Results are joined in page-index order regardless of completion
//! order.

use super::PhaseContext;
use crate::core::{PageFailure, PageResult, PageTask, TextBlock};
use crate::errors::ServiceError;
use crate::gateway::OcrService;
use crate::retry::{CallSpec, OperationClass, RetryExecutor};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Aggregate of every page task's outcome.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageAggregate {
    /// Blocks from succeeded pages, in page order.
    pub blocks: Vec<TextBlock>,
    /// Pages that failed, in page order.
    pub failed_pages: Vec<PageFailure>,
    /// Number of page tasks issued.
    pub page_count: usize,
}

impl PageAggregate {
    /// Partitions page results, which must be in page-index order.
    #[must_use]
    pub fn from_results(results: Vec<PageResult>) -> Self {
        let page_count = results.len();
        let mut aggregate = Self {
            page_count,
            ..Self::default()
        };
        for result in results {
            match result {
                Ok(blocks) => aggregate.blocks.extend(blocks),
                Err(failure) => aggregate.failed_pages.push(failure),
            }
        }
        aggregate
    }

    /// Indices of failed pages.
    #[must_use]
    pub fn failed_page_indices(&self) -> Vec<usize> {
        self.failed_pages.iter().map(|f| f.page).collect()
    }
}

/// Issues and joins the per-page OCR tasks of one document.
pub struct PageProcessor {
    job_id: String,
    executor: RetryExecutor,
    ocr: Arc<dyn OcrService>,
    spec: CallSpec,
    limit: Option<Arc<Semaphore>>,
}

impl PageProcessor {
    /// Creates a processor from a phase context.
    #[must_use]
    pub fn new(ctx: &PhaseContext) -> Self {
        Self {
            job_id: ctx.job_id.clone(),
            executor: ctx.executor.clone(),
            ocr: ctx.services.ocr.clone(),
            spec: CallSpec::new(
                "ocr_page",
                OperationClass::RemoteApi,
                ctx.config.timeouts.ocr_page(),
            ),
            limit: ctx
                .config
                .max_concurrent_pages
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Runs one task per page in `[0, page_count)` and aggregates them.
    pub async fn process_pages(&self, document: &str, page_count: usize) -> PageAggregate {
        debug!(job_id = %self.job_id, page_count, "Fanning out page tasks");

        let handles: Vec<_> = (0..page_count)
            .map(|page| {
                let task = PageTask {
                    job_id: self.job_id.clone(),
                    page,
                };
                tokio::spawn(run_page(
                    task,
                    document.to_string(),
                    self.executor.clone(),
                    self.ocr.clone(),
                    self.spec.clone(),
                    self.limit.clone(),
                ))
            })
            .collect();

        let results: Vec<PageResult> = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(page, joined)| {
                joined.unwrap_or_else(|e| {
                    Err(PageFailure {
                        page,
                        error: ServiceError::permanent(format!("page task aborted: {e}")),
                    })
                })
            })
            .collect();

        let aggregate = PageAggregate::from_results(results);
        for failure in &aggregate.failed_pages {
            warn!(
                job_id = %self.job_id,
                page = failure.page,
                error = %failure.error,
                "Page OCR failed"
            );
            self.executor.events().try_emit(
                "ocr.page_failed",
                Some(json!({
                    "job_id": self.job_id,
                    "page": failure.page,
                    "error": failure.error,
                })),
            );
        }
        aggregate
    }
}

async fn run_page(
    task: PageTask,
    document: String,
    executor: RetryExecutor,
    ocr: Arc<dyn OcrService>,
    spec: CallSpec,
    limit: Option<Arc<Semaphore>>,
) -> PageResult {
    let page = task.page;
    let _permit = match limit {
        Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|_| PageFailure {
            page,
            error: ServiceError::cancelled("page limiter closed"),
        })?),
        None => None,
    };

    executor
        .invoke(&spec, |_hb| ocr.ocr_page(&document, page))
        .await
        .map(|blocks| {
            blocks
                .into_iter()
                .map(|mut block| {
                    block.page = page;
                    block
                })
                .collect()
        })
        .map_err(|error| PageFailure { page, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use pretty_assertions::assert_eq;

    fn block(page: usize) -> TextBlock {
        TextBlock::new(format!("p{page}"), page, BoundingBox::default(), 0.9)
    }

    #[test]
    fn test_aggregate_partitions_in_order() {
        let results = vec![
            Ok(vec![block(0)]),
            Err(PageFailure {
                page: 1,
                error: ServiceError::permanent("unreadable"),
            }),
            Ok(vec![block(2), block(2)]),
            Ok(vec![]),
        ];
        let aggregate = PageAggregate::from_results(results);
        assert_eq!(aggregate.page_count, 4);
        assert_eq!(aggregate.failed_page_indices(), vec![1]);
        let pages: Vec<usize> = aggregate.blocks.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![0, 2, 2]);
    }

    #[test]
    fn test_empty_aggregate() {
        let aggregate = PageAggregate::from_results(Vec::new());
        assert_eq!(aggregate.page_count, 0);
        assert!(aggregate.blocks.is_empty());
        assert!(aggregate.failed_pages.is_empty());
    }
}
