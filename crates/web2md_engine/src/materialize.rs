//! Bounded-concurrency media materialization.
//!
//! A download session is created per [`MediaMaterializer::materialize`] call. It
//! owns the FIFO queue of pending references, the dedup cache keyed by source
//! URL, and the filenames already issued. A fixed pool of worker tasks pulls from
//! the queue until it is empty, so at most `max_concurrent` fetches are in flight.
//! The session lock is never held across an await. Workers are detached tasks:
//! dropping the materialize future stops the wait, not the downloads, which keep
//! settling into the shared session.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

use crate::fetch::{Fetcher, NullProgressSink, ProgressSink};
use crate::filename::derive_media_filename;
use crate::{
    EngineEvent, FailureKind, FetchError, FetchOutput, MediaKind, MediaProgress, MediaReference,
    MediaResult,
};

pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug, Clone)]
pub struct MaterializeSettings {
    pub max_concurrent: usize,
    /// Upper bound on one fetch, on top of the transport's own timeouts.
    pub item_timeout: Duration,
}

impl Default for MaterializeSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            item_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_bytes: u64,
    /// Successful results per kind.
    pub by_kind: BTreeMap<MediaKind, usize>,
}

impl MediaStatistics {
    pub fn from_results(results: &[MediaResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            if result.is_success() {
                stats.successful += 1;
                stats.total_bytes += result.byte_size.unwrap_or(0);
                *stats.by_kind.entry(result.kind).or_insert(0) += 1;
            } else {
                stats.failed += 1;
            }
        }
        stats
    }
}

pub struct MediaMaterializer {
    fetcher: Arc<dyn Fetcher>,
    settings: MaterializeSettings,
}

impl MediaMaterializer {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: MaterializeSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &MaterializeSettings {
        &self.settings
    }

    /// Fetch every distinct URL once, returning one result per distinct URL in
    /// first-seen order.
    pub async fn materialize(&self, refs: Vec<MediaReference>) -> Vec<MediaResult> {
        self.materialize_with_progress(refs, Arc::new(NullProgressSink))
            .await
    }

    /// Like [`Self::materialize`], reporting `(completed, total)` to `sink` after
    /// each reference settles, in completion order.
    pub async fn materialize_with_progress(
        &self,
        refs: Vec<MediaReference>,
        sink: Arc<dyn ProgressSink>,
    ) -> Vec<MediaResult> {
        if refs.is_empty() {
            return Vec::new();
        }

        let worker_count = self.settings.max_concurrent.max(1).min(refs.len());
        engine_info!(
            "Materializing {} media references with {} workers",
            refs.len(),
            worker_count
        );

        let session = Arc::new(DownloadSession::new(refs));
        let workers: Vec<_> = (0..worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    session.clone(),
                    self.fetcher.clone(),
                    sink.clone(),
                    self.settings.item_timeout,
                ))
            })
            .collect();
        for handle in workers {
            if let Err(err) = handle.await {
                engine_error!("Media worker stopped abnormally: {}", err);
            }
        }

        let results = session.into_results();
        let stats = MediaStatistics::from_results(&results);
        engine_info!(
            "Materialized {} media files: {} ok, {} failed, {} bytes",
            stats.total,
            stats.successful,
            stats.failed,
            stats.total_bytes
        );
        results
    }
}

async fn run_worker(
    worker: usize,
    session: Arc<DownloadSession>,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ProgressSink>,
    item_timeout: Duration,
) {
    while let Some(job) = session.next_job() {
        let progress = match job {
            Job::Cached(progress) => progress,
            Job::Fetch { slot, reference } => {
                engine_debug!("worker {} fetching {}", worker, reference.url);
                let fetch = fetcher.fetch(&reference.url, sink.as_ref());
                let outcome = match tokio::time::timeout(item_timeout, fetch).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::new(
                        FailureKind::Timeout,
                        format!("no response within {item_timeout:?}"),
                    )),
                };
                if let Err(err) = &outcome {
                    engine_warn!("Failed to download {}: {}", reference.url, err);
                }
                session.settle(slot, reference, outcome)
            }
        };
        sink.emit(EngineEvent::Progress(progress));
    }
}

enum Job {
    /// The URL was already claimed earlier in this session.
    Cached(MediaProgress),
    Fetch {
        slot: usize,
        reference: MediaReference,
    },
}

enum Slot {
    InFlight(MediaReference),
    Settled(MediaResult),
}

struct SessionState {
    pending: VecDeque<MediaReference>,
    cache: HashMap<String, usize>,
    slots: Vec<Slot>,
    issued_names: HashSet<String>,
    completed: usize,
}

/// Shared state of one materialization run.
struct DownloadSession {
    total: usize,
    state: Mutex<SessionState>,
}

impl DownloadSession {
    fn new(refs: Vec<MediaReference>) -> Self {
        Self {
            total: refs.len(),
            state: Mutex::new(SessionState {
                pending: refs.into(),
                cache: HashMap::new(),
                slots: Vec::new(),
                issued_names: HashSet::new(),
                completed: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_job(&self) -> Option<Job> {
        let mut state = self.lock();
        let reference = state.pending.pop_front()?;
        if state.cache.contains_key(&reference.url) {
            state.completed += 1;
            return Some(Job::Cached(MediaProgress {
                completed: state.completed,
                total: self.total,
            }));
        }
        let slot = state.slots.len();
        state.cache.insert(reference.url.clone(), slot);
        state.slots.push(Slot::InFlight(reference.clone()));
        Some(Job::Fetch { slot, reference })
    }

    fn settle(
        &self,
        slot: usize,
        reference: MediaReference,
        outcome: Result<FetchOutput, FetchError>,
    ) -> MediaProgress {
        let mut state = self.lock();
        let result = match outcome {
            Ok(output) => {
                let mime_type = output.metadata.content_type.clone();
                let derived = derive_media_filename(&reference.url, mime_type.as_deref());
                let filename = unique_name(&mut state.issued_names, derived);
                MediaResult {
                    source_url: reference.url,
                    kind: reference.kind,
                    alt_text: reference.alt_text,
                    local_filename: Some(filename),
                    byte_size: Some(output.metadata.byte_len),
                    mime_type,
                    failure: None,
                    payload: Some(output.bytes),
                }
            }
            Err(err) => failed_result(reference, err),
        };
        state.slots[slot] = Slot::Settled(result);
        state.completed += 1;
        MediaProgress {
            completed: state.completed,
            total: self.total,
        }
    }

    fn into_results(&self) -> Vec<MediaResult> {
        let mut state = self.lock();
        std::mem::take(&mut state.slots)
            .into_iter()
            .map(|slot| match slot {
                Slot::Settled(result) => result,
                Slot::InFlight(reference) => failed_result(
                    reference,
                    FetchError::new(FailureKind::FetchFailed { status: None }, "download abandoned"),
                ),
            })
            .collect()
    }
}

fn failed_result(reference: MediaReference, err: FetchError) -> MediaResult {
    MediaResult {
        source_url: reference.url,
        kind: reference.kind,
        alt_text: reference.alt_text,
        local_filename: None,
        byte_size: None,
        mime_type: None,
        failure: Some(err),
        payload: None,
    }
}

/// Suffix `-2`, `-3`, … before the extension until the name is unused in this run.
fn unique_name(issued: &mut HashSet<String>, candidate: String) -> String {
    if issued.insert(candidate.clone()) {
        return candidate;
    }
    let (stem, ext) = match candidate.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (candidate.clone(), String::new()),
    };
    let mut counter = 2usize;
    loop {
        let name = format!("{stem}-{counter}{ext}");
        if issued.insert(name.clone()) {
            return name;
        }
        counter += 1;
    }
}
