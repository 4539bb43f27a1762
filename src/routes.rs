use axum::{Json, Router, extract::State, routing::post};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    auth::{Authenticated, CredentialStore},
    config::Config,
    error::ApiError,
    models::{
        description::ParsedDescription,
        directory::{CustomerDirectory, CustomerLookup, PgDirectory},
        helpdesk::Helpdesk,
        odoo::OdooClient,
        ticket::{Action, TicketRequest, TicketResult},
    },
};

/// Partner id sent to the helpdesk when the customer could not be resolved.
pub const UNKNOWN_CUSTOMER_ID: i64 = 0;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub credentials: CredentialStore,
    pub directory: Arc<dyn CustomerDirectory>,
    pub helpdesk: Helpdesk,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let rpc = OdooClient::new(&config.odoo)?;

        Ok(Self {
            credentials: CredentialStore::new(config.users.clone()),
            directory: Arc::new(PgDirectory::new(&config.directory)),
            helpdesk: Helpdesk::new(Arc::new(rpc), config.odoo.url.clone(), config.workflow.clone()),
        })
    }
}

/// An action paired with the helpdesk ticket it applies to.
enum Target {
    Create,
    Update(i64),
    Resolve(i64),
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ticketRequests", post(ticket_requests))
        .with_state(state)
}

#[tracing::instrument(
    skip_all,
    fields(user = %user.username, action = %request.action, ncentral_id = %request.external_ticket_id)
)]
async fn ticket_requests(
    user: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(request): Json<TicketRequest>,
) -> Result<Json<TicketResult>, ApiError> {
    debug!("Item: {:?}", request);

    let target = match (request.action, request.psa_ticket_number) {
        (Action::Create, _) => Target::Create,
        (Action::Update, Some(ticket_id)) => Target::Update(ticket_id),
        (Action::Resolve, Some(ticket_id)) => Target::Resolve(ticket_id),
        (action, None) => {
            warn!("{} request without psaTicketNumber", action);
            return Err(ApiError::MissingTicketNumber(action));
        }
    };

    let customer_id = resolve_customer(state.directory.as_ref(), &request.details).await?;

    let result = match target {
        Target::Create => create(&state.helpdesk, &request, customer_id).await?,
        Target::Update(ticket_id) => update(&state.helpdesk, ticket_id, &request).await?,
        Target::Resolve(ticket_id) => resolve(&state.helpdesk, ticket_id).await?,
    };

    Ok(Json(result))
}

/// Finds the helpdesk partner for the customer named in the ticket details.
///
/// Details without a customer and an unreachable directory both fall back to
/// [`UNKNOWN_CUSTOMER_ID`]; only a customer the directory positively does
/// not know rejects the request.
async fn resolve_customer(directory: &dyn CustomerDirectory, details: &str) -> Result<i64, ApiError> {
    let parsed = ParsedDescription::parse(details);
    if let Ok(rendered) = parsed.to_json() {
        debug!("Parsed details: {}", rendered);
    }

    let Some(customer) = parsed.customer() else {
        error!("Couldn't find a customer in ticket details, using unknown customer");
        return Ok(UNKNOWN_CUSTOMER_ID);
    };

    match directory.lookup(customer).await {
        CustomerLookup::Found(id) => Ok(id),
        CustomerLookup::NotFound => {
            warn!("Customer not found: {}", customer);
            Err(ApiError::CustomerNotFound)
        }
        CustomerLookup::Failed(e) => {
            error!("Customer lookup for {} failed, using unknown customer: {:#}", customer, e);
            Ok(UNKNOWN_CUSTOMER_ID)
        }
    }
}

async fn create(
    helpdesk: &Helpdesk,
    request: &TicketRequest,
    customer_id: i64,
) -> Result<TicketResult, ApiError> {
    let ticket_id = helpdesk
        .create_ticket(&request.title, &request.details, customer_id)
        .await?;

    info!("Creating Ticket: {}", ticket_id);
    Ok(TicketResult {
        external_ticket_id: ticket_id,
        ticket_url: helpdesk.ticket_url(ticket_id),
        already_resolved: false,
    })
}

async fn update(
    helpdesk: &Helpdesk,
    ticket_id: i64,
    request: &TicketRequest,
) -> Result<TicketResult, ApiError> {
    info!("Updating Ticket: {}", ticket_id);

    if !helpdesk.post_comment(ticket_id, &request.details).await? {
        error!("Ticket {} update was refused", ticket_id);
        return Err(ApiError::UpdateFailed);
    }

    Ok(TicketResult {
        external_ticket_id: ticket_id,
        ticket_url: helpdesk.ticket_url(ticket_id),
        already_resolved: false,
    })
}

/// Moves the ticket to the auto-resolved stage unless someone already
/// solved it by hand.
async fn resolve(helpdesk: &Helpdesk, ticket_id: i64) -> Result<TicketResult, ApiError> {
    info!("Resolving Ticket: {}", ticket_id);

    let Some(ticket) = helpdesk.read_ticket(ticket_id).await? else {
        warn!("Ticket {} not found in helpdesk", ticket_id);
        return Err(ApiError::TicketNotFound(ticket_id));
    };

    let workflow = helpdesk.workflow();
    let already_resolved = ticket.stage_id == Some(workflow.solved_stage_id);

    if already_resolved {
        info!("Ticket {} is already solved, leaving it as is", ticket.id);
    } else if !helpdesk.set_stage(ticket_id, workflow.auto_resolved_stage_id).await? {
        error!("Ticket {} stage change was refused", ticket_id);
        return Err(ApiError::UpdateFailed);
    }

    Ok(TicketResult {
        external_ticket_id: ticket_id,
        ticket_url: helpdesk.ticket_url(ticket_id),
        already_resolved,
    })
}
