#![allow(dead_code, clippy::unwrap_used)]
// Scripted `ResourceSource` for driving the engine under paused time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use community_core::{
    CoreError, Employee, EntityId, FetchError, Mutation, Payload, ResourceKind, ResourceSource,
    Review, ServiceDetail, Session, SubscriptionKey, SyncConfig,
};

/// One scripted fetch: wait `delay`, then answer.
pub struct Reply {
    pub delay: Duration,
    pub result: Result<Payload, FetchError>,
}

impl Reply {
    pub fn ok(payload: Payload) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(payload),
        }
    }

    pub fn err(error: FetchError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type FetchScript = Box<dyn Fn(SubscriptionKey, usize) -> Reply + Send + Sync>;
type MutateScript = Box<dyn Fn(SubscriptionKey, &Mutation) -> Result<(), CoreError> + Send + Sync>;

/// Answers fetches from a script keyed by call index per key.
pub struct ScriptedSource {
    fetch: FetchScript,
    mutate: MutateScript,
    mutate_delay: Duration,
    calls: Mutex<HashMap<SubscriptionKey, usize>>,
    mutations: Mutex<Vec<(SubscriptionKey, Mutation)>>,
}

impl ScriptedSource {
    pub fn new(fetch: impl Fn(SubscriptionKey, usize) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            fetch: Box::new(fetch),
            mutate: Box::new(|_, _| Ok(())),
            mutate_delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mutate(
        mut self,
        delay: Duration,
        mutate: impl Fn(SubscriptionKey, &Mutation) -> Result<(), CoreError> + Send + Sync + 'static,
    ) -> Self {
        self.mutate = Box::new(mutate);
        self.mutate_delay = delay;
        self
    }

    pub fn calls(&self, key: SubscriptionKey) -> usize {
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn mutations(&self) -> Vec<(SubscriptionKey, Mutation)> {
        self.mutations.lock().unwrap().clone()
    }
}

impl ResourceSource for ScriptedSource {
    async fn fetch(&self, key: SubscriptionKey, _session: &Session) -> Result<Payload, FetchError> {
        let reply = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.entry(key).or_insert(0);
            let reply = (self.fetch)(key, *index);
            *index += 1;
            reply
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    async fn mutate(
        &self,
        key: SubscriptionKey,
        mutation: &Mutation,
        _session: &Session,
    ) -> Result<(), CoreError> {
        self.mutations.lock().unwrap().push((key, mutation.clone()));
        if !self.mutate_delay.is_zero() {
            tokio::time::sleep(self.mutate_delay).await;
        }
        (self.mutate)(key, mutation)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub const PERIOD: Duration = Duration::from_millis(5000);

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn config(poll_interval: Duration) -> SyncConfig {
    SyncConfig {
        poll_interval,
        ..SyncConfig::default()
    }
}

pub fn key(kind: ResourceKind, entity: u64) -> SubscriptionKey {
    SubscriptionKey::new(kind, EntityId::new(entity))
}

pub fn service(id: u64, following: bool) -> Payload {
    Payload::Service(ServiceDetail {
        id,
        name: format!("service {id}"),
        image: None,
        qualification: 4.5,
        description: Some("Fresh bread".into()),
        is_following: following,
    })
}

pub fn employees(ids: &[u64]) -> Payload {
    Payload::Employees(
        ids.iter()
            .map(|&id| Employee {
                id,
                name: format!("employee {id}"),
                age: Some(30),
                email: None,
                photo: None,
            })
            .collect(),
    )
}

pub fn reviews(count: usize) -> Payload {
    Payload::Reviews(
        (0..count)
            .map(|i| Review {
                name: format!("review {i}"),
                description: "ok".into(),
                rating: 4.0,
                written_by: None,
            })
            .collect(),
    )
}

/// A payload of the right kind for any key.
pub fn default_payload(key: SubscriptionKey) -> Payload {
    match key.kind {
        ResourceKind::Service => service(key.entity.get(), false),
        ResourceKind::Employees => employees(&[1, 2]),
        ResourceKind::Proposals => Payload::Proposals(Vec::new()),
        ResourceKind::Reviews => reviews(1),
    }
}

pub fn employee_ids(payload: Option<&Payload>) -> Vec<u64> {
    payload
        .and_then(Payload::as_employees)
        .map(|list| list.iter().map(|e| e.id).collect())
        .unwrap_or_default()
}
