// src/connector/paging.rs - Continuation-driven enumeration as a lazy stream

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::future::Future;

use crate::error::{HarnessError, Result};
use crate::transport::Page;

enum Cursor<C> {
    Start,
    Next(C),
    Done,
}

/// Turn a page fetcher into a flat stream of items. `fetch` receives `None`
/// for the first page and the previous continuation afterwards; the stream
/// ends after the first page without a continuation. A fetch error ends the
/// stream after being yielded.
pub(crate) fn paginate<'a, T, C, F, Fut>(fetch: F) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    C: Clone + PartialEq + Send + 'a,
    F: FnMut(Option<C>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T, C>>> + Send + 'a,
{
    stream::try_unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = fetch(token.clone()).await?;
        let next = match page.continuation {
            None => Cursor::Done,
            Some(next) if token.as_ref() == Some(&next) => {
                return Err(HarnessError::Read(
                    "backend returned the same continuation twice".to_string(),
                ))
            }
            Some(next) => Cursor::Next(next),
        };

        Ok(Some((page.items, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
