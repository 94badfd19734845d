//! Rebuild orchestration: from changed sources to a published registry.
//!
//! A rebuild cycle runs two phases. Discovery fans one task per source and
//! fully enumerates every model shell before any building starts, so the
//! amount of build work is known up front. The build phase then feeds the
//! shells through a bounded queue into a fixed-size worker pool; workers
//! exit when the queue closes, never on a timeout (an idle worker only logs
//! a periodic diagnostic while it waits). Once every worker has finished,
//! mappings are linked serially over the merged aggregate and the result is
//! published as one atomic snapshot swap.
//!
//! Cycles are not cancellable and build order is unconstrained; registry
//! insertion is idempotent and order-independent.

use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::builder;
use crate::catalog::{Registry, RegistryHolder};
use crate::config::Config;
use crate::discover::{self, ModelSeed};
use crate::mappings;
use crate::source::{Source, UpdateOutcome};
use crate::walk::ScanFilter;

/// Phase of the current rebuild cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Discovering,
    Building,
    Linking,
    Publishing,
}

/// Drives rebuild cycles over a set of sources and owns the publish step.
pub struct Rebuilder {
    sources: Vec<Arc<Source>>,
    holder: Arc<RegistryHolder>,
    filter: Arc<ScanFilter>,
    workers: usize,
    queue_capacity: usize,
    idle_warn: Duration,
    state: Mutex<CycleState>,
}

impl Rebuilder {
    pub fn new(
        config: &Config,
        sources: Vec<Arc<Source>>,
        holder: Arc<RegistryHolder>,
    ) -> Result<Self> {
        Ok(Self {
            sources,
            holder,
            filter: Arc::new(config.scan_filter()?),
            workers: config.catalog.workers,
            queue_capacity: config.catalog.queue_capacity,
            idle_warn: Duration::from_secs(config.catalog.idle_warn_secs),
            state: Mutex::new(CycleState::Idle),
        })
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().expect("cycle state lock poisoned")
    }

    fn set_state(&self, state: CycleState) {
        *self.state.lock().expect("cycle state lock poisoned") = state;
    }

    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    /// Refresh every source in parallel and report whether any changed.
    ///
    /// A refresh failure is fatal: it propagates and no rebuild runs.
    pub async fn update_sources(&self) -> Result<bool> {
        let mut updates = Vec::new();

        for source in &self.sources {
            let source = Arc::clone(source);
            updates.push(tokio::task::spawn_blocking(move || source.update()));
        }

        let mut changed = false;
        for update in updates {
            let outcome = update.await.context("source update task failed")??;
            changed |= outcome == UpdateOutcome::Changed;
        }

        Ok(changed)
    }

    /// Refresh all sources, rebuilding when any reported a change.
    /// Returns whether a rebuild ran.
    pub async fn update_and_rebuild(&self) -> Result<bool> {
        if self.update_sources().await? {
            self.rebuild().await?;
            Ok(true)
        } else {
            debug!("sources unchanged");
            Ok(false)
        }
    }

    /// Run one full rebuild cycle and publish the result.
    pub async fn rebuild(&self) -> Result<()> {
        info!("rebuilding catalog");

        // Phase one: enumerate every model shell across all sources.
        self.set_state(CycleState::Discovering);

        let mut discoveries = Vec::new();
        for source in &self.sources {
            let root = source.path().to_path_buf();
            let filter = Arc::clone(&self.filter);
            discoveries.push(tokio::task::spawn_blocking(move || {
                discover::find_models(&root, &filter)
            }));
        }

        let mut seeds: Vec<ModelSeed> = Vec::new();
        for discovery in discoveries {
            seeds.extend(discovery.await.context("discovery task failed")?);
        }

        info!(models = seeds.len(), "discovery complete");

        // Phase two: fan the shells out to the build pool through a bounded
        // queue. Dropping the sender closes the queue and ends the workers.
        self.set_state(CycleState::Building);

        let (tx, rx) = sync_channel::<ModelSeed>(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let aggregate = Arc::new(Mutex::new(Registry::new()));

        let mut workers = Vec::new();
        for id in 0..self.workers.max(1) {
            let rx = Arc::clone(&rx);
            let aggregate = Arc::clone(&aggregate);
            let filter = Arc::clone(&self.filter);
            let idle_warn = self.idle_warn;
            workers.push(tokio::task::spawn_blocking(move || {
                build_worker(id, &rx, &aggregate, &filter, idle_warn);
            }));
        }

        let feeder = tokio::task::spawn_blocking(move || {
            for seed in seeds {
                if tx.send(seed).is_err() {
                    break;
                }
            }
            // tx drops here: end of input.
        });

        feeder.await.context("feeder task failed")?;
        for worker in workers {
            worker.await.context("build worker failed")?;
        }

        // Mappings cross model and source boundaries, so they link serially
        // over the complete aggregate.
        self.set_state(CycleState::Linking);

        let registry = match Arc::try_unwrap(aggregate) {
            Ok(registry) => registry.into_inner().expect("aggregate lock poisoned"),
            Err(aggregate) => aggregate.lock().expect("aggregate lock poisoned").clone(),
        };

        let roots: Vec<PathBuf> = self
            .sources
            .iter()
            .map(|s| s.path().to_path_buf())
            .collect();
        let filter = Arc::clone(&self.filter);
        let registry = tokio::task::spawn_blocking(move || {
            let mut registry = registry;
            mappings::link_mappings(&mut registry, &roots, &filter);
            registry
        })
        .await
        .context("mapping link task failed")?;

        self.set_state(CycleState::Publishing);
        info!(models = registry.len(), "publishing catalog");
        self.holder.publish(registry);

        self.set_state(CycleState::Idle);
        Ok(())
    }

    /// Check sources on an interval forever, rebuilding on change.
    ///
    /// The first check runs immediately. Any refresh or build failure ends
    /// the loop with an error.
    pub async fn poll(&self, interval: Duration) -> Result<()> {
        info!(every_secs = interval.as_secs(), "polling sources");
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            self.update_and_rebuild().await?;
        }
    }
}

fn build_worker(
    id: usize,
    rx: &Mutex<Receiver<ModelSeed>>,
    aggregate: &Mutex<Registry>,
    filter: &ScanFilter,
    idle_warn: Duration,
) {
    loop {
        let seed = {
            let rx = rx.lock().expect("build queue lock poisoned");
            loop {
                match rx.recv_timeout(idle_warn) {
                    Ok(seed) => break Some(seed),
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(worker = id, "build worker idle, waiting for work");
                    }
                    Err(RecvTimeoutError::Disconnected) => break None,
                }
            }
        };

        let Some(seed) = seed else {
            debug!(worker = id, "build queue closed");
            break;
        };

        debug!(
            worker = id,
            model = %seed.row.model,
            version = %seed.row.version,
            "building model"
        );

        let model = builder::build_model(&seed, filter);
        aggregate
            .lock()
            .expect("aggregate lock poisoned")
            .add(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_minimal_model(root: &Path, name: &str, version: &str) {
        fs::create_dir_all(root).unwrap();
        fs::write(
            root.join("models.csv"),
            format!("model,version,label,description,url\n{name},{version},,d,\n"),
        )
        .unwrap();
        fs::write(
            root.join("tables.csv"),
            format!("model,version,table,description\n{name},{version},person,d\n"),
        )
        .unwrap();
        fs::write(
            root.join("fields.csv"),
            format!("model,version,table,field,description\n{name},{version},person,id,d\n"),
        )
        .unwrap();
    }

    fn rebuilder_for(roots: &[&Path], workers: usize) -> (Rebuilder, Arc<RegistryHolder>) {
        let cache = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.catalog.workers = workers;
        config.catalog.cache_dir = cache.path().to_path_buf();

        let sources = roots
            .iter()
            .map(|root| {
                Arc::new(Source::parse(root.to_str().unwrap(), cache.path()).unwrap())
            })
            .collect();

        let holder = Arc::new(RegistryHolder::new());
        let rebuilder = Rebuilder::new(&config, sources, Arc::clone(&holder)).unwrap();
        (rebuilder, holder)
    }

    #[tokio::test]
    async fn test_rebuild_publishes_all_models_for_any_pool_size() {
        let source_a = tempfile::tempdir().unwrap();
        let source_b = tempfile::tempdir().unwrap();
        write_minimal_model(&source_a.path().join("m1"), "alpha", "1");
        write_minimal_model(&source_a.path().join("m2"), "alpha", "2");
        write_minimal_model(&source_b.path().join("m1"), "beta", "1");
        write_minimal_model(&source_b.path().join("m2"), "beta", "2");

        for workers in [1, 2, 4] {
            let (rebuilder, holder) =
                rebuilder_for(&[source_a.path(), source_b.path()], workers);
            rebuilder.rebuild().await.unwrap();

            let snapshot = holder.snapshot();
            assert_eq!(snapshot.len(), 4, "workers = {workers}");
            assert!(snapshot.get("alpha", "1").is_some());
            assert!(snapshot.get("beta", "2").is_some());
            assert_eq!(rebuilder.state(), CycleState::Idle);
        }
    }

    #[tokio::test]
    async fn test_old_snapshot_remains_complete_during_rebuild() {
        let source = tempfile::tempdir().unwrap();
        write_minimal_model(&source.path().join("m1"), "alpha", "1");

        let (rebuilder, holder) = rebuilder_for(&[source.path()], 2);
        rebuilder.rebuild().await.unwrap();

        let before = holder.snapshot();
        assert_eq!(before.len(), 1);

        write_minimal_model(&source.path().join("m2"), "alpha", "2");
        rebuilder.rebuild().await.unwrap();

        // The handle taken before the rebuild still sees the old snapshot.
        assert_eq!(before.len(), 1);
        assert_eq!(holder.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_mappings_linked_across_sources() {
        let source_a = tempfile::tempdir().unwrap();
        let source_b = tempfile::tempdir().unwrap();
        write_minimal_model(source_a.path(), "alpha", "1");
        write_minimal_model(source_b.path(), "beta", "1");
        fs::write(
            source_b.path().join("mappings.csv"),
            "source_model,source_version,source_table,source_field,\
             target_model,target_version,target_table,target_field,comment\n\
             alpha,1,person,id,beta,1,person,id,same\n",
        )
        .unwrap();

        let (rebuilder, holder) = rebuilder_for(&[source_a.path(), source_b.path()], 3);
        rebuilder.rebuild().await.unwrap();

        let snapshot = holder.snapshot();
        let alpha_id = snapshot
            .get("alpha", "1")
            .unwrap()
            .tables
            .get("person")
            .unwrap()
            .fields
            .get("id")
            .unwrap();
        assert_eq!(alpha_id.mappings.len(), 1);
        assert_eq!(alpha_id.mappings[0].field.model, "beta");
    }

    #[tokio::test]
    async fn test_update_and_rebuild_runs_for_local_sources() {
        let source = tempfile::tempdir().unwrap();
        write_minimal_model(source.path(), "alpha", "1");

        let (rebuilder, holder) = rebuilder_for(&[source.path()], 1);

        // Plain directories always report changed, so every cycle rebuilds.
        assert!(rebuilder.update_and_rebuild().await.unwrap());
        assert_eq!(holder.snapshot().len(), 1);
        assert!(rebuilder.update_and_rebuild().await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_declarations_collapse() {
        let source = tempfile::tempdir().unwrap();
        write_minimal_model(&source.path().join("a"), "alpha", "1");
        write_minimal_model(&source.path().join("b"), "alpha", "1");

        let (rebuilder, holder) = rebuilder_for(&[source.path()], 2);
        rebuilder.rebuild().await.unwrap();

        assert_eq!(holder.snapshot().len(), 1);
    }
}
