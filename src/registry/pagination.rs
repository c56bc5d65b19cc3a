use std::future::Future;

use tracing::debug;

use super::error::{LookupError, Stage, SyncError};
use super::scope::OperationScope;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation cursor, `None` when there are no more pages
    pub next_cursor: Option<String>,
}

#[cfg(test)]
impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Follow a cursor-paginated listing to the end, keeping items accepted by `keep`.
///
/// The first call gets no cursor; every following call gets the cursor returned by the
/// call before it. Items are returned in arrival order. A failing page fails the whole
/// enumeration: nothing accumulated so far is returned.
pub async fn enumerate<T, F, Fut, P>(
    stage: Stage,
    scope: &OperationScope,
    mut list_page: F,
    mut keep: P,
) -> Result<Vec<T>, SyncError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, LookupError>>,
    P: FnMut(&T) -> bool,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = scope
            .run(stage, async {
                list_page(cursor.take())
                    .await
                    .map_err(|e| SyncError::lookup(stage, e))
            })
            .await?;
        pages += 1;

        items.extend(page.items.into_iter().filter(|item| keep(item)));

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(%stage, pages, items = items.len(), "Enumeration complete");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn pages(data: Vec<Vec<u32>>) -> Vec<Page<u32>> {
        let count = data.len();
        data.into_iter()
            .enumerate()
            .map(|(i, items)| Page {
                items,
                next_cursor: (i + 1 < count).then(|| format!("cursor-{}", i + 1)),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concatenates_all_pages_in_order() {
        let data = pages(vec![vec![1, 2], vec![3], vec![], vec![4, 5]]);
        let seen = Mutex::new(Vec::new());

        let items = enumerate(
            Stage::ListingImages,
            &OperationScope::unbounded(),
            |cursor| {
                seen.lock().unwrap().push(cursor.clone());
                let index = cursor
                    .map(|c| c.trim_start_matches("cursor-").parse::<usize>().unwrap())
                    .unwrap_or(0);
                let page = data[index].clone();
                async move { Ok(page) }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        // Each call uses the cursor returned by the previous one
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                None,
                Some("cursor-1".to_string()),
                Some("cursor-2".to_string()),
                Some("cursor-3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_applies_to_every_page() {
        let data = pages(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let items = enumerate(
            Stage::ListingImages,
            &OperationScope::unbounded(),
            |cursor| {
                let page = data[if cursor.is_some() { 1 } else { 0 }].clone();
                async move { Ok(page) }
            },
            |n| n % 2 == 0,
        )
        .await
        .unwrap();
        assert_eq!(items, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_mid_pagination_failure_fails_whole_enumeration() {
        let data = pages(vec![vec![1, 2], vec![3], vec![4]]);
        let result = enumerate(
            Stage::ListingRepositories,
            &OperationScope::unbounded(),
            |cursor| {
                let outcome = match cursor.as_deref() {
                    Some("cursor-2") => Err(LookupError::unavailable("throttled")),
                    Some(_) => Ok(data[1].clone()),
                    None => Ok(data[0].clone()),
                };
                async move { outcome }
            },
            |_| true,
        )
        .await;

        match result {
            Err(SyncError::RegistryLookup { stage, source }) => {
                assert_eq!(stage, Stage::ListingRepositories);
                assert_eq!(source.message, "throttled");
            }
            other => panic!("expected lookup error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_scope_stops_before_first_page() {
        let scope = OperationScope::unbounded();
        scope.cancel();
        let result = enumerate(
            Stage::ListingImages,
            &scope,
            |_| async { Ok(Page::last(vec![1u32])) },
            |_| true,
        )
        .await;
        assert!(matches!(result, Err(SyncError::Cancelled { .. })));
    }
}
