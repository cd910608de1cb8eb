//! Queue / Topic publishers.
//!
//! Each publisher is a size-bounded [`BatchScope`] whose sink issues one
//! provider batch call per flush. The target (queue url / topic arn) is
//! fixed at construction. Dropping a publisher flushes what is left;
//! call `finish` to observe that last flush's result.

use std::sync::Arc;

use super::attributes::{MAX_MESSAGE_ATTRIBUTES, MessageAttributes};
use super::handler::{BatchHandler, BatchScope, BatchSink};
use super::PublishError;
use crate::domain::ConfigurationError;
use crate::ports::{MAX_BATCH_ENTRIES, QueueClient, QueueEntry, TopicClient, TopicEntry};

fn check_batch_size(batch_size: usize) -> Result<usize, ConfigurationError> {
    if batch_size == 0 || batch_size > MAX_BATCH_ENTRIES {
        return Err(ConfigurationError::BatchSize {
            actual: batch_size,
            max: MAX_BATCH_ENTRIES,
        });
    }
    Ok(batch_size)
}

/// Sink for [`QueuePublisher`]: one `send_message_batch` per flush.
pub struct QueueSink {
    client: Arc<dyn QueueClient>,
    queue_url: String,
}

impl BatchSink<String> for QueueSink {
    type Output = usize;
    type Error = PublishError;

    fn send(&mut self, batch: Vec<String>) -> Result<usize, PublishError> {
        let count = batch.len();
        let entries = batch
            .into_iter()
            .enumerate()
            .map(|(i, body)| QueueEntry {
                id: i.to_string(),
                body,
            })
            .collect();
        self.client.send_message_batch(&self.queue_url, entries)?;
        tracing::debug!(queue_url = %self.queue_url, count, "sent message batch");
        Ok(count)
    }
}

pub struct QueuePublisher {
    scope: BatchScope<String, QueueSink>,
}

impl QueuePublisher {
    pub fn new(
        client: Arc<dyn QueueClient>,
        queue_url: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, PublishError> {
        let batch_size = check_batch_size(batch_size)?;
        let sink = QueueSink {
            client,
            queue_url: queue_url.into(),
        };
        Ok(Self {
            scope: BatchScope::new(BatchHandler::with_batch_size(sink, batch_size)),
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.scope.sink().queue_url
    }

    pub fn add(&mut self, body: impl Into<String>) -> Result<(), PublishError> {
        self.scope.add(body.into())?;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.scope.len()
    }

    pub fn finish(self) -> Result<(), PublishError> {
        self.scope.finish()?;
        Ok(())
    }
}

/// Sink for [`TopicPublisher`]: one `publish_batch` per flush.
pub struct TopicSink {
    client: Arc<dyn TopicClient>,
    topic_arn: String,
}

impl BatchSink<(String, MessageAttributes)> for TopicSink {
    type Output = usize;
    type Error = PublishError;

    fn send(&mut self, batch: Vec<(String, MessageAttributes)>) -> Result<usize, PublishError> {
        let count = batch.len();
        let entries = batch
            .into_iter()
            .enumerate()
            .map(|(i, (body, attributes))| TopicEntry {
                id: i.to_string(),
                body,
                attributes,
            })
            .collect();
        self.client.publish_batch(&self.topic_arn, entries)?;
        tracing::debug!(topic_arn = %self.topic_arn, count, "published batch");
        Ok(count)
    }
}

pub struct TopicPublisher {
    scope: BatchScope<(String, MessageAttributes), TopicSink>,
}

impl TopicPublisher {
    pub fn new(
        client: Arc<dyn TopicClient>,
        topic_arn: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, PublishError> {
        let batch_size = check_batch_size(batch_size)?;
        let sink = TopicSink {
            client,
            topic_arn: topic_arn.into(),
        };
        Ok(Self {
            scope: BatchScope::new(BatchHandler::with_batch_size(sink, batch_size)),
        })
    }

    pub fn topic_arn(&self) -> &str {
        &self.scope.sink().topic_arn
    }

    /// Buffer one message. More than [`MAX_MESSAGE_ATTRIBUTES`] attributes
    /// is rejected before anything is buffered or sent.
    pub fn add(
        &mut self,
        body: impl Into<String>,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), PublishError> {
        let attributes = attributes.unwrap_or_default();
        if attributes.len() > MAX_MESSAGE_ATTRIBUTES {
            return Err(PublishError::AttributeLimitExceeded {
                count: attributes.len(),
                max: MAX_MESSAGE_ATTRIBUTES,
            });
        }
        self.scope.add((body.into(), attributes))?;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.scope.len()
    }

    pub fn finish(self) -> Result<(), PublishError> {
        self.scope.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryQueueClient, InMemoryTopicClient};
    use crate::publish::MessageAttribute;
    use std::collections::BTreeSet;

    fn attrs(n: usize) -> MessageAttributes {
        (0..n)
            .map(|i| (format!("status{i}"), MessageAttribute::string("succeeded")))
            .collect()
    }

    #[test]
    fn queue_publisher_batches_in_order() {
        let client = Arc::new(InMemoryQueueClient::new());
        let items: Vec<String> = (0..10).map(|i| i.to_string()).collect();

        let mut publisher = QueuePublisher::new(client.clone(), "https://queue/test", 3).unwrap();
        for item in &items {
            publisher.add(item.as_str()).unwrap();
        }
        assert_eq!(publisher.pending(), 1);
        publisher.finish().unwrap();

        assert_eq!(client.batch_sizes("https://queue/test"), vec![3, 3, 3, 1]);
        assert_eq!(client.messages("https://queue/test"), items);
    }

    #[test]
    fn dropped_queue_publisher_flushes() {
        let client = Arc::new(InMemoryQueueClient::new());
        {
            let mut publisher = QueuePublisher::new(client.clone(), "q", 10).unwrap();
            publisher.add("only").unwrap();
        }
        assert_eq!(client.messages("q"), vec!["only".to_string()]);
    }

    #[test]
    fn batch_size_must_fit_provider_limit() {
        let client = Arc::new(InMemoryQueueClient::new());
        for bad in [0, 11] {
            assert!(matches!(
                QueuePublisher::new(client.clone(), "q", bad),
                Err(PublishError::Configuration(ConfigurationError::BatchSize { .. }))
            ));
        }
    }

    #[test]
    fn topic_publisher_delivers_all_items() {
        let client = Arc::new(InMemoryTopicClient::new());
        let items: BTreeSet<String> = (0..10).map(|i| i.to_string()).collect();

        let mut publisher = TopicPublisher::new(client.clone(), "arn:topic", 3).unwrap();
        for item in &items {
            publisher.add(item.as_str(), Some(attrs(1))).unwrap();
        }
        publisher.finish().unwrap();

        let received: BTreeSet<String> = client
            .messages("arn:topic")
            .into_iter()
            .map(|entry| entry.body)
            .collect();
        assert_eq!(received, items);
        assert_eq!(client.batch_sizes("arn:topic"), vec![3, 3, 3, 1]);
    }

    #[test]
    fn too_many_attributes_fail_before_sending() {
        let client = Arc::new(InMemoryTopicClient::new());
        let mut publisher = TopicPublisher::new(client.clone(), "arn:topic", 1).unwrap();

        let err = publisher.add("too many attrs", Some(attrs(11))).unwrap_err();
        assert_eq!(
            err,
            PublishError::AttributeLimitExceeded { count: 11, max: 10 }
        );
        assert_eq!(publisher.pending(), 0);
        assert!(client.messages("arn:topic").is_empty());

        publisher.add("ten is fine", Some(attrs(10))).unwrap();
        assert_eq!(client.messages("arn:topic").len(), 1);
    }

    #[test]
    fn send_failures_surface_from_add() {
        let client = Arc::new(InMemoryTopicClient::new());
        client.fail_with("throttled");
        let mut publisher = TopicPublisher::new(client.clone(), "arn:topic", 1).unwrap();

        let err = publisher.add("x", None).unwrap_err();
        assert!(matches!(err, PublishError::Send { .. }));
    }
}
