//! Counter-lifecycle verifier.
//!
//! Drives a counter group through enable, attachment, disable and detachment,
//! waiting for the side tables to converge in each phase. Detachment that does
//! not complete in time is fatal: the external system leaked monitoring
//! resources.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, instrument};

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::{
    CounterBinding, CounterGroup, CounterState, CounterStatus, PollingConfig,
};
use crate::domain::ports::CounterStore;
use crate::services::poller::{await_condition, Expectation, Probe};

/// Per-group counter state machine driven against a [`CounterStore`].
pub struct CounterLifecycle {
    store: Arc<dyn CounterStore>,
    polling: PollingConfig,
    states: HashMap<CounterGroup, CounterState>,
}

impl CounterLifecycle {
    /// Every group starts [`CounterState::Uninitialized`].
    pub fn new(store: Arc<dyn CounterStore>, polling: PollingConfig) -> Self {
        Self {
            store,
            polling,
            states: HashMap::new(),
        }
    }

    /// Last state reached by `group`.
    pub fn state(&self, group: CounterGroup) -> CounterState {
        self.states.get(&group).copied().unwrap_or_default()
    }

    fn transition(&mut self, group: CounterGroup, next: CounterState) -> HarnessResult<()> {
        let current = self.state(group);
        if !current.can_transition_to(next) {
            return Err(HarnessError::InvalidCounterTransition {
                from: current,
                to: next,
            });
        }
        self.states.insert(group, next);
        Ok(())
    }

    /// Issue enable on the group's control table. There is no synchronous
    /// confirmation; attachment is observed by [`Self::wait_attached`].
    #[instrument(skip(self), fields(group = %group))]
    pub async fn enable(&mut self, group: CounterGroup) -> HarnessResult<()> {
        let current = self.state(group);
        if !current.can_transition_to(CounterState::Enabled) {
            return Err(HarnessError::InvalidCounterTransition {
                from: current,
                to: CounterState::Enabled,
            });
        }
        self.store.set_status(group, CounterStatus::Enable).await?;
        self.transition(group, CounterState::Enabled)?;
        info!("counter group enabled");
        Ok(())
    }

    /// Wait for the name map to populate and for every mapped object to carry
    /// a non-empty id list.
    #[instrument(skip(self), fields(group = %group))]
    pub async fn wait_attached(
        &mut self,
        group: CounterGroup,
    ) -> HarnessResult<Vec<CounterBinding>> {
        let current = self.state(group);
        if current != CounterState::Enabled {
            return Err(HarnessError::InvalidCounterTransition {
                from: current,
                to: CounterState::Attached,
            });
        }

        let store = Arc::clone(&self.store);
        let store = store.as_ref();
        let name_map = group.name_map();

        let expectation = Expectation::new(name_map, "populated name map");
        let entries = await_condition(&expectation, &self.polling, || async move {
            let entries = store.name_map(name_map).await?;
            if entries.is_empty() {
                Ok(Probe::pending("empty name map"))
            } else {
                Ok(Probe::Ready(entries))
            }
        })
        .await?;

        let mut bindings = Vec::with_capacity(entries.len());
        for (object_name, object_key) in entries {
            let id_list_key = group.id_list_key(&object_key);
            let expectation = Expectation::new(id_list_key, "non-empty id list");
            let oid = object_key.as_str();

            let id_list = await_condition(&expectation, &self.polling, || async move {
                let ids = store.list_id_list(group, oid).await?;
                if ids.is_empty() {
                    Ok(Probe::pending("no id list"))
                } else {
                    Ok(Probe::Ready(ids))
                }
            })
            .await?;

            bindings.push(CounterBinding {
                group,
                name_map_table: name_map.to_string(),
                object_name,
                object_key,
                id_list,
            });
        }

        self.transition(group, CounterState::Attached)?;
        info!(objects = bindings.len(), "counters attached");
        Ok(bindings)
    }

    /// Disable the group and wait until every id list is removed and the name
    /// map is empty. Calling it again on a detached group converges to the same
    /// state.
    #[instrument(skip(self), fields(group = %group))]
    pub async fn disable(&mut self, group: CounterGroup) -> HarnessResult<()> {
        self.transition(group, CounterState::Disabling)?;

        let store = Arc::clone(&self.store);
        let store = store.as_ref();
        let name_map = group.name_map();
        let attached = store.name_map(name_map).await?;

        store.set_status(group, CounterStatus::Disable).await?;

        let detached = async {
            for object_key in attached.values() {
                let expectation =
                    Expectation::new(group.id_list_key(object_key), "id list removed");
                let oid = object_key.as_str();
                await_condition(&expectation, &self.polling, || async move {
                    if store.has_id_list(group, oid).await? {
                        Ok(Probe::pending("id list present"))
                    } else {
                        Ok(Probe::Ready(()))
                    }
                })
                .await?;
            }

            let expectation = Expectation::new(name_map, "empty name map");
            await_condition(&expectation, &self.polling, || async move {
                if store.is_empty(name_map).await? {
                    Ok(Probe::Ready(()))
                } else {
                    Ok(Probe::pending("name map still populated"))
                }
            })
            .await
        }
        .await;

        if let Err(err) = detached {
            error!(error = %err, "counter group failed to detach; monitoring resources leaked");
            return Err(err);
        }

        self.transition(group, CounterState::Detached)?;
        info!(released = attached.len(), "counters detached");
        Ok(())
    }

    /// Enable `group`, run `body` with the attached bindings, then disable.
    ///
    /// Disable is attempted on every exit path, including attachment failure,
    /// an error from `body` and a panic inside it. The body's failure wins over
    /// a detach failure, which is logged.
    pub async fn with_attached<F, Fut, T>(
        &mut self,
        group: CounterGroup,
        body: F,
    ) -> HarnessResult<T>
    where
        F: FnOnce(Vec<CounterBinding>) -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
    {
        self.enable(group).await?;

        let outcome = match self.wait_attached(group).await {
            Ok(bindings) => AssertUnwindSafe(body(bindings)).catch_unwind().await,
            Err(err) => Ok(Err(err)),
        };

        let released = self.disable(group).await;

        match outcome {
            Err(panic) => {
                if let Err(err) = &released {
                    error!(group = %group, error = %err, "detach after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Err(err)) => {
                if let Err(detach) = released {
                    error!(group = %group, error = %detach, "detach after failure also failed");
                }
                Err(err)
            }
            Ok(Ok(value)) => released.map(|()| value),
        }
    }
}
