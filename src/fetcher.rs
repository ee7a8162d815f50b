use serde::Deserialize;
use serde_json::Value;

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchRequestId(usize);

impl fmt::Display for FetchRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A lookup request that has been issued but not answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub id: FetchRequestId,
    pub url: String,
    /// Id attribute of the select the options are for.
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchFailure {
    Network(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status(status) => write!(f, "unexpected status {status}"),
            Self::Decode(msg) => write!(f, "malformed body: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SettleOutcome {
    Applied(usize),
    Stale,
    Failed(FetchFailure),
    Unknown,
}

#[derive(Debug, Clone)]
struct QueuedFetch {
    request: PendingFetch,
    target: NodeId,
    generation: u64,
}

/// Outstanding requests plus the newest generation issued per target select.
#[derive(Debug, Default)]
pub(crate) struct FetchQueue {
    next_id: usize,
    pending: Vec<QueuedFetch>,
    generations: HashMap<NodeId, u64>,
}

impl FetchQueue {
    fn issue(&mut self, url: String, target: NodeId, target_id: String) -> PendingFetch {
        self.next_id += 1;
        let generation = self.generations.entry(target).or_default();
        *generation += 1;
        let request = PendingFetch {
            id: FetchRequestId(self.next_id),
            url,
            target_id,
        };
        self.pending.push(QueuedFetch {
            request: request.clone(),
            target,
            generation: *generation,
        });
        request
    }

    fn invalidate(&mut self, target: NodeId) {
        *self.generations.entry(target).or_default() += 1;
    }

    fn take(&mut self, id: FetchRequestId) -> Option<QueuedFetch> {
        let position = self.pending.iter().position(|queued| queued.request.id == id)?;
        Some(self.pending.remove(position))
    }

    fn is_current(&self, queued: &QueuedFetch) -> bool {
        self.generations.get(&queued.target) == Some(&queued.generation)
    }

    fn pending(&self) -> Vec<PendingFetch> {
        self.pending
            .iter()
            .map(|queued| queued.request.clone())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct OptionRecord {
    pk: Value,
    fields: OptionFields,
}

#[derive(Debug, Deserialize)]
struct OptionFields {
    name: String,
}

#[derive(Debug, Default)]
pub(crate) struct RemoteOptionFetcher {
    queue: FetchQueue,
}

impl RemoteOptionFetcher {
    pub(crate) fn request(&mut self, url: String, target: NodeId, target_id: String) -> PendingFetch {
        self.queue.issue(url, target, target_id)
    }

    /// Makes every outstanding answer for `target` stale.
    pub(crate) fn cancel(&mut self, target: NodeId) {
        self.queue.invalidate(target);
    }

    pub(crate) fn pending(&self) -> Vec<PendingFetch> {
        self.queue.pending()
    }

    pub(crate) fn pending_url(&self, id: FetchRequestId) -> Option<String> {
        self.queue
            .pending
            .iter()
            .find(|queued| queued.request.id == id)
            .map(|queued| queued.request.url.clone())
    }

    /// Applies the answer to request `id`. Failures leave the target select
    /// as it was and are reported, never raised.
    pub(crate) fn settle(
        &mut self,
        dom: &mut Dom,
        id: FetchRequestId,
        outcome: std::result::Result<FetchResponse, String>,
    ) -> Result<SettleOutcome> {
        let Some(queued) = self.queue.take(id) else {
            return Ok(SettleOutcome::Unknown);
        };
        if !self.queue.is_current(&queued) || !dom.is_connected(queued.target) {
            return Ok(SettleOutcome::Stale);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(msg) => return Ok(SettleOutcome::Failed(FetchFailure::Network(msg))),
        };
        if !response.is_success() {
            return Ok(SettleOutcome::Failed(FetchFailure::Status(response.status)));
        }
        let options = match decode_option_records(&response.body) {
            Ok(options) => options,
            Err(failure) => return Ok(SettleOutcome::Failed(failure)),
        };

        for (value, label) in &options {
            dom.append_option(queued.target, value, label)?;
        }
        Ok(SettleOutcome::Applied(options.len()))
    }
}

/// Decodes `[{"pk": .., "fields": {"name": ..}}, ..]` into `(value, label)`
/// pairs. The lookup view serialises the queryset to a JSON string and then
/// JSON-encodes that string again, so a string body is decoded twice.
pub(crate) fn decode_option_records(
    body: &str,
) -> std::result::Result<Vec<(String, String)>, FetchFailure> {
    let decode_err = |err: serde_json::Error| FetchFailure::Decode(err.to_string());

    let outer: Value = serde_json::from_str(body).map_err(decode_err)?;
    let records = match outer {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).map_err(decode_err)?,
        other => other,
    };
    let records: Vec<OptionRecord> = serde_json::from_value(records).map_err(decode_err)?;

    Ok(records
        .into_iter()
        .map(|record| {
            let value = match record.pk {
                Value::String(pk) => pk,
                other => other.to_string(),
            };
            (value, record.fields.name.trim().to_string())
        })
        .collect())
}
