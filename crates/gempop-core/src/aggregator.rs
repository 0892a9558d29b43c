//! Folds a fragment stream into one growing reply.

use futures_util::{Stream, StreamExt};

use crate::error::GatewayError;

/// What a consumer should show for the reply being streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Full text accumulated so far
    Text(String),
    /// The stream faulted; partial text is discarded
    Failed,
}

/// Append every fragment to a fresh buffer and publish the whole buffer after
/// each one. On a fault, publishes [`StreamUpdate::Failed`] and stops.
///
/// Returns the complete reply, or the fault that ended the stream.
pub async fn aggregate<S, F>(mut fragments: S, mut publish: F) -> Result<String, GatewayError>
where
    S: Stream<Item = Result<String, GatewayError>> + Unpin,
    F: FnMut(StreamUpdate),
{
    let mut buffer = String::new();

    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(text) => {
                buffer.push_str(&text);
                publish(StreamUpdate::Text(buffer.clone()));
            }
            Err(e) => {
                publish(StreamUpdate::Failed);
                return Err(e);
            }
        }
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn fragments(items: Vec<Result<&str, GatewayError>>) -> impl Stream<Item = Result<String, GatewayError>> + Unpin {
        stream::iter(
            items
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_publishes_running_concatenation() {
        let mut published = Vec::new();
        let result = aggregate(
            fragments(vec![Ok("Hi"), Ok(" there"), Ok("!")]),
            |update| published.push(update),
        )
        .await;

        assert_eq!(result.unwrap(), "Hi there!");
        assert_eq!(
            published,
            vec![
                StreamUpdate::Text("Hi".into()),
                StreamUpdate::Text("Hi there".into()),
                StreamUpdate::Text("Hi there!".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fault_after_some_fragments() {
        let mut published = Vec::new();
        let result = aggregate(
            fragments(vec![
                Ok("partial "),
                Ok("answer"),
                Err(GatewayError::Stream("reset".into())),
                Ok("never seen"),
            ]),
            |update| published.push(update),
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Stream(_))));
        assert_eq!(published.len(), 3);
        assert_eq!(published.last(), Some(&StreamUpdate::Failed));
    }

    #[tokio::test]
    async fn test_fault_before_first_fragment() {
        let mut published = Vec::new();
        let result = aggregate(
            fragments(vec![Err(GatewayError::Network("down".into()))]),
            |update| published.push(update),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(published, vec![StreamUpdate::Failed]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut published = Vec::new();
        let result = aggregate(fragments(vec![]), |update| published.push(update)).await;
        assert_eq!(result.unwrap(), "");
        assert!(published.is_empty());
    }

    #[tokio::test]
    async fn test_each_call_starts_fresh() {
        let first = aggregate(fragments(vec![Ok("one")]), |_| {}).await.unwrap();
        let second = aggregate(fragments(vec![Ok("two")]), |_| {}).await.unwrap();
        assert_eq!(first, "one");
        assert_eq!(second, "two");
    }
}
