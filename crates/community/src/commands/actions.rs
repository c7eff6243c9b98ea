//! Mutating commands. Each one opens a single-kind view so the change
//! has an entry to layer over, proposes it, and waits for the server.

use community_config::Config;
use community_core::{
    Draft, EntityId, Flag, Mutation, ProposalDraft, ResourceKind, ReviewDraft, SubscriptionKey,
};

use super::{connect, parse_service, round_trip};
use crate::cli::{GlobalOpts, ProposeArgs, ReviewArgs, ServiceArgs, UnlinkArgs};
use crate::error::CliError;
use crate::output;

async fn submit(
    cfg: &Config,
    global: &GlobalOpts,
    kind: ResourceKind,
    entity: EntityId,
    mutation: Mutation,
) -> Result<(), CliError> {
    let engine = connect(cfg, global, Some(0))?;
    let mut view = engine.view_of(&[kind]);
    view.view(entity)?;

    let key = SubscriptionKey::new(kind, entity);
    let ticket = engine.propose(key, mutation)?;
    let id = ticket.id();
    tracing::debug!(%key, mutation = %id, "waiting for server");

    let outcome = tokio::time::timeout(round_trip(&engine), ticket.outcome())
        .await
        .map_err(|_| CliError::Timeout {
            what: format!("the server to answer for {key}"),
        })?;

    view.leave();
    engine.shutdown();
    outcome?;
    Ok(())
}

pub async fn unlink(args: UnlinkArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    submit(
        cfg,
        global,
        ResourceKind::Employees,
        entity,
        Mutation::Delete { id: args.employee },
    )
    .await?;
    output::print_output(
        &format!("Employee {} unlinked from service {entity}", args.employee),
        global.quiet,
    );
    Ok(())
}

pub async fn set_following(
    args: ServiceArgs,
    value: bool,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    submit(
        cfg,
        global,
        ResourceKind::Service,
        entity,
        Mutation::SetFlag {
            flag: Flag::Following,
            value,
        },
    )
    .await?;
    let verb = if value { "Following" } else { "No longer following" };
    output::print_output(&format!("{verb} service {entity}"), global.quiet);
    Ok(())
}

pub async fn propose(args: ProposeArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    let name = args.name.clone();
    let draft = ProposalDraft {
        name: args.name,
        description: args.description,
        debate_end_date: args.debate_end,
        deliberation_end_date: args.deliberation_end,
        written_by: None,
    };
    submit(
        cfg,
        global,
        ResourceKind::Proposals,
        entity,
        Mutation::Create(Draft::Proposal(draft)),
    )
    .await?;
    output::print_output(
        &format!("Proposal '{name}' submitted to service {entity}"),
        global.quiet,
    );
    Ok(())
}

pub async fn review(args: ReviewArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    let draft = ReviewDraft {
        name: args.name,
        description: args.description,
        rating: args.rating,
        written_by: None,
    };
    let rating = draft.rating;
    submit(
        cfg,
        global,
        ResourceKind::Reviews,
        entity,
        Mutation::Create(Draft::Review(draft)),
    )
    .await?;
    output::print_output(
        &format!("Review ({rating}/5) posted on service {entity}"),
        global.quiet,
    );
    Ok(())
}
