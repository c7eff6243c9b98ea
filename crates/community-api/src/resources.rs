// Community platform endpoints
//
// Every resource is addressed by the owning service id. Reads that need
// the viewer's identity (service detail, follow) take the session token
// as an explicit argument.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::types::{
    ActionReply, EmployeeResponse, NewProposal, NewReview, Params, ProposalResponse,
    ReviewResponse, ServiceResponse,
};

#[derive(Serialize)]
struct TokenParams<'a> {
    token: Option<&'a str>,
}

#[derive(Serialize)]
struct UnlinkParams {
    id_employee: u64,
}

fn token_body(token: Option<&SecretString>) -> Params<TokenParams<'_>> {
    Params {
        params: TokenParams {
            token: token.map(ExposeSecret::expose_secret),
        },
    }
}

/// Turn an action reply with `success: false` into [`Error::Rejected`].
fn require_success(reply: ActionReply) -> Result<(), Error> {
    if reply.success {
        Ok(())
    } else {
        Err(Error::Rejected {
            message: reply
                .message
                .unwrap_or_else(|| "unknown error".to_owned()),
        })
    }
}

impl ApiClient {
    // ── Reads ────────────────────────────────────────────────────────

    /// Service detail as seen by the session's user.
    ///
    /// `POST /services/{id}` with `{"params": {"token": ...}}`. The reply is
    /// either `{"result": {...}}` or, from the public listing, `[{...}]`.
    pub async fn get_service(
        &self,
        service_id: u64,
        token: Option<&SecretString>,
    ) -> Result<ServiceResponse, Error> {
        self.post_single(&format!("services/{service_id}"), &token_body(token))
            .await
    }

    /// `GET /employees/{service_id}`
    pub async fn list_employees(&self, service_id: u64) -> Result<Vec<EmployeeResponse>, Error> {
        self.get_list(&format!("employees/{service_id}")).await
    }

    /// `GET /proposals/{service_id}`
    pub async fn list_proposals(&self, service_id: u64) -> Result<Vec<ProposalResponse>, Error> {
        self.get_list(&format!("proposals/{service_id}")).await
    }

    /// `GET /reviews/{service_id}`
    pub async fn list_reviews(&self, service_id: u64) -> Result<Vec<ReviewResponse>, Error> {
        self.get_list(&format!("reviews/{service_id}")).await
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Remove an employee from a service's roster.
    ///
    /// `POST /employees/unlink/{service_id}` with `{"params": {"id_employee": ...}}`
    pub async fn unlink_employee(&self, service_id: u64, employee_id: u64) -> Result<(), Error> {
        debug!(service_id, employee_id, "unlinking employee");
        let reply: ActionReply = self
            .post_result(
                &format!("employees/unlink/{service_id}"),
                &Params {
                    params: UnlinkParams {
                        id_employee: employee_id,
                    },
                },
            )
            .await?;
        require_success(reply)
    }

    /// `POST /services/follow/{service_id}` with the session token.
    pub async fn follow_service(
        &self,
        service_id: u64,
        token: Option<&SecretString>,
    ) -> Result<(), Error> {
        debug!(service_id, "following service");
        let reply: ActionReply = self
            .post_result(&format!("services/follow/{service_id}"), &token_body(token))
            .await?;
        require_success(reply)
    }

    /// `POST /services/unfollow/{service_id}` with the session token.
    pub async fn unfollow_service(
        &self,
        service_id: u64,
        token: Option<&SecretString>,
    ) -> Result<(), Error> {
        debug!(service_id, "unfollowing service");
        let reply: ActionReply = self
            .post_result(&format!("services/unfollow/{service_id}"), &token_body(token))
            .await?;
        require_success(reply)
    }

    /// `POST /proposals/create`. Any 2xx status counts as accepted.
    pub async fn create_proposal(&self, proposal: NewProposal) -> Result<(), Error> {
        debug!(service_id = proposal.service_id, name = %proposal.name, "creating proposal");
        self.post_status("proposals/create", &Params { params: proposal })
            .await
    }

    /// `POST /reviews/create`. Any 2xx status counts as accepted.
    pub async fn create_review(&self, review: NewReview) -> Result<(), Error> {
        debug!(service_id = review.service_id, name = %review.name, "creating review");
        self.post_status("reviews/create", &Params { params: review })
            .await
    }
}
