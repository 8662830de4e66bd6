use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Error;
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::Config;
use crate::pipeline::copier::ObjectCopier;
use crate::pipeline::key_mapper::KeyMapper;
use crate::pipeline::lister::ObjectLister;
use crate::pipeline::reporter::ProgressReporter;
use crate::pipeline::stage::Stage;
use crate::pipeline::terminator::Terminator;
use crate::storage::{Storage, StoragePair};
use crate::types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
use crate::types::{
    CopyRequest, FailedObject, JobCounters, ObjectEntry, SyncResult, SyncStatistics,
};

const CHANNEL_CAPACITY: usize = 20000;

mod copier;
mod key_mapper;
mod lister;
mod reporter;
mod stage;
mod storage_factory;
mod terminator;

pub use key_mapper::map_key;

pub struct Pipeline {
    config: Config,
    source: Storage,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_receiver: Receiver<SyncStatistics>,
    has_error: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    counters: Arc<JobCounters>,
    failures: Arc<Mutex<Vec<FailedObject>>>,
    ready: bool,
}

impl Pipeline {
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let StoragePair { source, target } = storage_factory::create_storage_pair(
            config.clone(),
            cancellation_token.clone(),
            stats_sender,
        )
        .await;

        Self::assemble(config, source, target, cancellation_token, stats_receiver)
    }

    #[cfg(test)]
    fn new_with_storage(
        config: Config,
        source: Storage,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
        stats_receiver: Receiver<SyncStatistics>,
    ) -> Self {
        Self::assemble(config, source, target, cancellation_token, stats_receiver)
    }

    fn assemble(
        config: Config,
        source: Storage,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
        stats_receiver: Receiver<SyncStatistics>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            cancellation_token,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::<Error>::new())),
            counters: Arc::new(JobCounters::default()),
            failures: Arc::new(Mutex::new(Vec::new())),
            ready: true,
        }
    }

    pub async fn run(&mut self) -> SyncResult {
        if !self.ready {
            panic!("it can be executed only once.")
        }
        self.ready = false;

        let reporter_stop_token = create_pipeline_cancellation_token();
        let reporter_handle = self.spawn_reporter(reporter_stop_token.clone());

        self.terminate(self.copy_objects(self.map_keys(self.list_source())))
            .await
            .unwrap();

        reporter_stop_token.cancel();
        let _ = reporter_handle.await;

        self.shutdown().await;

        let result = self.build_result();
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            "copy has been completed."
        );

        result
    }

    async fn shutdown(&self) {
        self.close_stats_sender();
    }

    fn build_result(&self) -> SyncResult {
        let (_, succeeded, failed) = self.counters.snapshot();

        SyncResult {
            succeeded,
            failed,
            failures: self.failures.lock().unwrap().clone(),
        }
    }

    fn list_source(&self) -> Receiver<ObjectEntry> {
        let (stage, next_stage_receiver) = self.create_spsc_stage(None);
        let object_lister = ObjectLister::new(stage);
        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();
        let max_keys = self.config.max_keys;

        tokio::spawn(async move {
            let result = object_lister.list_source(max_keys).await;
            match result {
                Ok(()) => {}
                Err(e) => {
                    log_error(has_error, error_list, e, "list source objects failed.");
                    // without the keys there is nothing left to do
                    cancellation_token.cancel();
                }
            }
        });

        next_stage_receiver
    }

    fn map_keys(&self, source_objects: Receiver<ObjectEntry>) -> Receiver<CopyRequest> {
        let (stage, next_stage_receiver) = self.create_spsc_stage(Some(source_objects));
        let key_mapper = KeyMapper::new(stage, self.counters.clone(), self.failures.clone());
        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();

        tokio::spawn(async move {
            let result = key_mapper.map().await;
            match result {
                Ok(()) => {}
                Err(e) => {
                    log_error(has_error, error_list, e, "key mapping failed.");
                }
            }
        });

        next_stage_receiver
    }

    fn copy_objects(&self, copy_requests: Receiver<CopyRequest>) -> Receiver<CopyRequest> {
        let (sender, next_stage_receiver) = async_channel::bounded::<CopyRequest>(CHANNEL_CAPACITY);

        for worker_index in 0..(self.config.worker_size) {
            let stage = self.create_mpmc_stage(sender.clone(), copy_requests.clone());

            let object_copier = ObjectCopier::new(
                stage,
                worker_index,
                self.counters.clone(),
                self.failures.clone(),
            );
            let has_error = self.has_error.clone();
            let error_list = self.errors.clone();

            tokio::spawn(async move {
                let result = object_copier.copy().await;
                match result {
                    Ok(()) => {}
                    Err(e) => {
                        log_error(has_error, error_list, e, "copy objects failed.");
                    }
                }
            });
        }

        next_stage_receiver
    }

    fn spawn_reporter(&self, stop_token: PipelineCancellationToken) -> JoinHandle<()> {
        let reporter = ProgressReporter::new(
            self.counters.clone(),
            self.config.report_interval_seconds,
            stop_token,
        );

        tokio::spawn(async move {
            reporter.report().await;
        })
    }

    fn terminate(&self, copied_objects: Receiver<CopyRequest>) -> JoinHandle<()> {
        let terminator = Terminator::new(copied_objects);

        tokio::spawn(async move {
            terminator.terminate().await;
        })
    }

    fn create_spsc_stage<I, O: Send + Sync + 'static>(
        &self,
        previous_stage_receiver: Option<Receiver<I>>,
    ) -> (Stage<I, O>, Receiver<O>) {
        let (sender, next_stage_receiver) = async_channel::bounded::<O>(CHANNEL_CAPACITY);
        let stage = Stage::new(
            self.config.clone(),
            Some(dyn_clone::clone_box(&*self.source)),
            Some(dyn_clone::clone_box(&*self.target)),
            previous_stage_receiver,
            Some(sender),
            self.cancellation_token.clone(),
        );

        (stage, next_stage_receiver)
    }

    fn create_mpmc_stage<I, O: Send + Sync + 'static>(
        &self,
        sender: Sender<O>,
        receiver: Receiver<I>,
    ) -> Stage<I, O> {
        Stage::new(
            self.config.clone(),
            Some(dyn_clone::clone_box(&*self.source)),
            Some(dyn_clone::clone_box(&*self.target)),
            Some(receiver),
            Some(sender),
            self.cancellation_token.clone(),
        )
    }

    pub fn get_stats_receiver(&self) -> Receiver<SyncStatistics> {
        self.stats_receiver.clone()
    }

    pub fn get_counters(&self) -> Arc<JobCounters> {
        self.counters.clone()
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn get_errors_and_consume(&self) -> Option<Vec<Error>> {
        if !self.has_error() {
            return None;
        }

        let error_list = self.errors.clone();
        let mut error_list = error_list.lock().unwrap();

        let mut errors_to_return = Vec::<Error>::new();
        for _ in 0..error_list.len() {
            errors_to_return.push(error_list.pop_front().unwrap());
        }

        Some(errors_to_return)
    }

    pub fn close_stats_sender(&self) {
        self.source.get_stats_sender().close();
        self.target.get_stats_sender().close();
    }
}

fn log_error(
    has_error: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    e: Error,
    message: &str,
) {
    has_error.store(true, Ordering::SeqCst);

    let error = e.to_string();
    let source = e.source();

    error!(error = error, source = source, message);

    let mut error_list = errors.lock().unwrap();
    error_list.push_back(e);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing_subscriber::EnvFilter;

    use crate::config::args::parse_from_args;
    use crate::storage::mock::{FailureMode, MockStorage};
    use crate::types::ObjectEntry;
    use crate::types::token::create_pipeline_cancellation_token;

    use super::*;

    fn build_config(extra_args: &[&str]) -> Config {
        let mut args = vec!["s3mirror"];
        args.extend_from_slice(extra_args);
        args.push("s3://source-bucket/dir1/");
        args.push("s3://target-bucket/dir2/");

        Config::try_from(parse_from_args(args).unwrap()).unwrap()
    }

    fn source_entries(keys: &[&str]) -> Vec<ObjectEntry> {
        keys.iter()
            .map(|key| ObjectEntry {
                key: key.to_string(),
                size: Some(6),
            })
            .collect()
    }

    struct TestHarness {
        pipeline: Pipeline,
        source: MockStorage,
        target: MockStorage,
    }

    fn build_harness(config: Config, objects: Vec<ObjectEntry>) -> TestHarness {
        build_harness_with_token(config, objects, create_pipeline_cancellation_token())
    }

    fn build_harness_with_token(
        config: Config,
        objects: Vec<ObjectEntry>,
        cancellation_token: PipelineCancellationToken,
    ) -> TestHarness {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let source = MockStorage::new("source-bucket", "dir1/", objects, stats_sender.clone());
        let target = MockStorage::new("target-bucket", "dir2/", vec![], stats_sender);

        let pipeline = Pipeline::new_with_storage(
            config,
            source.clone().boxed(),
            target.clone().boxed(),
            cancellation_token,
            stats_receiver,
        );

        TestHarness {
            pipeline,
            source,
            target,
        }
    }

    #[tokio::test]
    async fn run_pipeline_copies_all_objects() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/data1.dat", "dir1/data2.dat", "dir1/sub/data3.dat"]),
        );

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 0);
        assert!(result.failures.is_empty());
        assert!(!harness.pipeline.has_error());

        let mut copied = harness.target.copied_pairs();
        copied.sort();
        assert_eq!(
            copied,
            vec![
                (
                    "dir1/data1.dat".to_string(),
                    "dir2/data1.dat".to_string()
                ),
                (
                    "dir1/data2.dat".to_string(),
                    "dir2/data2.dat".to_string()
                ),
                (
                    "dir1/sub/data3.dat".to_string(),
                    "dir2/sub/data3.dat".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    #[should_panic]
    async fn run_pipeline_twice() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(config, source_entries(&["dir1/data1.dat"]));

        harness.pipeline.run().await;
        harness.pipeline.run().await;
    }

    #[tokio::test]
    async fn run_pipeline_with_empty_source() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(config, vec![]);

        let result = harness.pipeline.run().await;

        assert_eq!(result, SyncResult::default());
        assert!(!harness.pipeline.has_error());
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failure() {
        init_dummy_tracing_subscriber();

        let config = build_config(&["--retry-interval-milliseconds", "1"]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/data1.dat", "dir1/data2.dat"]),
        );

        harness
            .target
            .fail_copy("dir1/data1.dat", FailureMode::FailFirstAttempts(2));

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(harness.target.attempt_count("dir1/data1.dat"), 3);
        assert_eq!(harness.target.attempt_count("dir1/data2.dat"), 1);
        assert!(!harness.pipeline.has_error());
    }

    #[tokio::test]
    async fn exhausted_attempts_recorded_as_failed() {
        init_dummy_tracing_subscriber();

        let config = build_config(&["--retry-interval-milliseconds", "1"]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/data1.dat", "dir1/data2.dat", "dir1/data3.dat"]),
        );

        harness
            .target
            .fail_copy("dir1/data2.dat", FailureMode::AlwaysFail);

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].key, "dir1/data2.dat");
        assert_eq!(result.failures[0].error, "copy_object() failed.");
        assert_eq!(result.failures[0].attempts, 3);
        assert_eq!(harness.target.attempt_count("dir1/data2.dat"), 3);

        // a failed key does not abort the run
        assert!(!harness.pipeline.has_error());
    }

    #[tokio::test]
    async fn copy_attempts_option_is_honored() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[
            "--copy-attempts",
            "5",
            "--retry-interval-milliseconds",
            "1",
        ]);
        let mut harness = build_harness(config, source_entries(&["dir1/data1.dat"]));

        harness
            .target
            .fail_copy("dir1/data1.dat", FailureMode::AlwaysFail);

        let result = harness.pipeline.run().await;

        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].attempts, 5);
        assert_eq!(harness.target.attempt_count("dir1/data1.dat"), 5);
    }

    #[tokio::test]
    async fn worker_pool_respects_worker_size() {
        init_dummy_tracing_subscriber();

        let config = build_config(&["--worker-size", "2"]);
        let objects = source_entries(&[
            "dir1/data1.dat",
            "dir1/data2.dat",
            "dir1/data3.dat",
            "dir1/data4.dat",
            "dir1/data5.dat",
            "dir1/data6.dat",
            "dir1/data7.dat",
            "dir1/data8.dat",
        ]);

        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let source = MockStorage::new("source-bucket", "dir1/", objects, stats_sender.clone());
        let target = MockStorage::new("target-bucket", "dir2/", vec![], stats_sender)
            .with_copy_latency(Duration::from_millis(20));

        let mut pipeline = Pipeline::new_with_storage(
            config,
            source.boxed(),
            target.clone().boxed(),
            create_pipeline_cancellation_token(),
            stats_receiver,
        );

        let result = pipeline.run().await;

        assert_eq!(result.succeeded, 8);
        assert!(target.max_concurrent_copies() <= 2);
    }

    #[tokio::test]
    async fn single_worker_copies_all_objects() {
        init_dummy_tracing_subscriber();

        let config = build_config(&["--worker-size", "1"]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/1.txt", "dir1/2.txt"]),
        );

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(harness.target.max_concurrent_copies(), 1);

        let mut copied = harness.target.copied_pairs();
        copied.sort();
        assert_eq!(
            copied,
            vec![
                ("dir1/1.txt".to_string(), "dir2/1.txt".to_string()),
                ("dir1/2.txt".to_string(), "dir2/2.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn list_error_sets_pipeline_error() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);

        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let source = MockStorage::new("source-bucket", "dir1/", vec![], stats_sender.clone())
            .with_list_error();
        let target = MockStorage::new("target-bucket", "dir2/", vec![], stats_sender);

        let mut pipeline = Pipeline::new_with_storage(
            config,
            source.boxed(),
            target.clone().boxed(),
            create_pipeline_cancellation_token(),
            stats_receiver,
        );

        let result = pipeline.run().await;

        assert_eq!(result.succeeded, 0);
        assert!(pipeline.has_error());
        assert_eq!(pipeline.get_errors_and_consume().unwrap().len(), 1);
        assert!(target.copied_pairs().is_empty());
    }

    #[tokio::test]
    async fn key_outside_source_prefix_recorded_as_failed() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/data1.dat", "other/data2.dat"]),
        );

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].key, "other/data2.dat");
        assert_eq!(result.failures[0].attempts, 0);
    }

    #[tokio::test]
    async fn run_pipeline_cancelled_before_start() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let cancellation_token = create_pipeline_cancellation_token();
        let mut harness = build_harness_with_token(
            config,
            source_entries(&["dir1/data1.dat", "dir1/data2.dat"]),
            cancellation_token.clone(),
        );

        cancellation_token.cancel();
        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 0);
        assert!(!harness.pipeline.has_error());
    }

    #[tokio::test]
    async fn success_counted_when_cancelled_during_copy() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let cancellation_token = create_pipeline_cancellation_token();

        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let source = MockStorage::new(
            "source-bucket",
            "dir1/",
            source_entries(&["dir1/data1.dat"]),
            stats_sender.clone(),
        );
        let target = MockStorage::new("target-bucket", "dir2/", vec![], stats_sender)
            .with_cancel_after_copy(cancellation_token.clone());

        let mut pipeline = Pipeline::new_with_storage(
            config,
            source.boxed(),
            target.clone().boxed(),
            cancellation_token,
            stats_receiver,
        );

        let result = pipeline.run().await;

        // the copy completed before the token fired, so it is a success
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(target.copied_pairs().len(), 1);
    }

    #[tokio::test]
    async fn stats_receiver_observes_copy_events() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(
            config,
            source_entries(&["dir1/data1.dat", "dir1/data2.dat"]),
        );

        let stats_receiver = harness.pipeline.get_stats_receiver();
        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 2);

        let mut complete_count = 0;
        let mut byte_count = 0;
        while let Ok(stats) = stats_receiver.try_recv() {
            match stats {
                SyncStatistics::CopyComplete { .. } => complete_count += 1,
                SyncStatistics::CopyBytes(bytes) => byte_count += bytes,
                _ => {}
            }
        }
        assert_eq!(complete_count, 2);
        assert_eq!(byte_count, 12);
    }

    #[tokio::test]
    async fn source_key_used_verbatim_in_copy_source() {
        init_dummy_tracing_subscriber();

        let config = build_config(&[]);
        let mut harness = build_harness(config, source_entries(&["dir1/a b/c+d.dat"]));

        let result = harness.pipeline.run().await;

        assert_eq!(result.succeeded, 1);
        assert_eq!(
            harness.target.copied_pairs(),
            vec![("dir1/a b/c+d.dat".to_string(), "dir2/a b/c+d.dat".to_string())]
        );
        assert!(harness.source.copied_pairs().is_empty());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .or_else(|_| EnvFilter::try_new("dummy=trace"))
                    .unwrap(),
            )
            .try_init();
    }
}
