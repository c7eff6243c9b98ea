// ── Resource source seam ──
//
// The engine talks to the backend only through `ResourceSource`. The
// production implementation wraps `community_api::ApiClient`; tests plug
// in scripted sources to control timing and failures.

use std::future::Future;
use std::sync::Arc;

use community_api::types::{NewProposal, NewReview};
use community_api::{ApiClient, TlsMode, TransportConfig};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::{Session, SyncConfig, TlsVerification};
use crate::error::{CoreError, FetchError};
use crate::model::{
    Employee, Payload, Proposal, ResourceKind, Review, ServiceDetail, SubscriptionKey,
};
use crate::mutation::{Draft, Flag, Mutation};

/// Backend access used by the fetcher and the mutation coordinator.
pub trait ResourceSource: Send + Sync + 'static {
    /// Fetch the current payload for `key`.
    fn fetch(
        &self,
        key: SubscriptionKey,
        session: &Session,
    ) -> impl Future<Output = Result<Payload, FetchError>> + Send;

    /// Send a mutating request for `key`. Resolves once the server has
    /// accepted or refused it.
    fn mutate(
        &self,
        key: SubscriptionKey,
        mutation: &Mutation,
        session: &Session,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl<T: ResourceSource> ResourceSource for Arc<T> {
    fn fetch(
        &self,
        key: SubscriptionKey,
        session: &Session,
    ) -> impl Future<Output = Result<Payload, FetchError>> + Send {
        (**self).fetch(key, session)
    }

    fn mutate(
        &self,
        key: SubscriptionKey,
        mutation: &Mutation,
        session: &Session,
    ) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).mutate(key, mutation, session)
    }
}

// ── HTTP implementation ──────────────────────────────────────────────

/// [`ResourceSource`] backed by the platform's JSON API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: ApiClient,
}

impl HttpSource {
    pub fn new(config: &SyncConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: tls_to_transport(&config.tls),
            timeout: config.timeout,
        };
        let client = ApiClient::new(&config.api_url, &transport)?;
        Ok(Self { client })
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

impl ResourceSource for HttpSource {
    async fn fetch(&self, key: SubscriptionKey, session: &Session) -> Result<Payload, FetchError> {
        let id = key.entity.get();
        let payload = match key.kind {
            ResourceKind::Service => {
                let detail = self.client.get_service(id, session.token()).await?;
                Payload::Service(ServiceDetail::from(detail))
            }
            ResourceKind::Employees => {
                let list = self.client.list_employees(id).await?;
                Payload::Employees(list.into_iter().map(Employee::from).collect())
            }
            ResourceKind::Proposals => {
                let list = self.client.list_proposals(id).await?;
                Payload::Proposals(list.into_iter().map(Proposal::from).collect())
            }
            ResourceKind::Reviews => {
                let list = self.client.list_reviews(id).await?;
                Payload::Reviews(list.into_iter().map(Review::from).collect())
            }
        };
        Ok(payload)
    }

    async fn mutate(
        &self,
        key: SubscriptionKey,
        mutation: &Mutation,
        session: &Session,
    ) -> Result<(), CoreError> {
        let service_id = key.entity.get();
        debug!(%key, mutation = mutation.name(), "sending mutation");
        match mutation {
            Mutation::Delete { id } => self.client.unlink_employee(service_id, *id).await?,
            Mutation::SetFlag {
                flag: Flag::Following,
                value: true,
            } => self.client.follow_service(service_id, session.token()).await?,
            Mutation::SetFlag {
                flag: Flag::Following,
                value: false,
            } => {
                self.client
                    .unfollow_service(service_id, session.token())
                    .await?;
            }
            Mutation::Create(Draft::Proposal(draft)) => {
                // The backend resolves the author from the session token.
                let written_by = session
                    .token()
                    .map(|t| t.expose_secret().to_owned())
                    .unwrap_or_default();
                self.client
                    .create_proposal(NewProposal {
                        name: draft.name.clone(),
                        written_by,
                        description: draft.description.clone(),
                        service_id,
                        debate_end_date: draft.debate_end_date.clone(),
                        deliberation_end_date: draft.deliberation_end_date.clone(),
                    })
                    .await?;
            }
            Mutation::Create(Draft::Review(draft)) => {
                let written_by = draft
                    .written_by
                    .clone()
                    .or_else(|| session.display_name().map(str::to_owned))
                    .unwrap_or_default();
                self.client
                    .create_review(NewReview {
                        name: draft.name.clone(),
                        description: draft.description.clone(),
                        rating: draft.rating,
                        written_by,
                        service_id,
                    })
                    .await?;
            }
        }
        Ok(())
    }
}
