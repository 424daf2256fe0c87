//! HandleRequest use case: dispatches one decoded [`MarketRequest`] to the
//! [`MarketApi`] and wraps the outcome in a [`MarketResponse`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::control::{MarketRequest, MarketResponse};
use crate::domain::error::MarketResult;

use super::ports::MarketApi;

pub struct HandleRequestUseCase {
    api: Arc<dyn MarketApi>,
}

fn respond<T>(result: MarketResult<T>, wrap: impl FnOnce(T) -> MarketResponse) -> MarketResponse {
    match result {
        Ok(value) => wrap(value),
        Err(e) => MarketResponse::Error(e),
    }
}

impl HandleRequestUseCase {
    pub fn new(api: Arc<dyn MarketApi>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, request: MarketRequest) -> MarketResponse {
        let op = request.op_name();
        let response = self.dispatch(request).await;
        match &response {
            MarketResponse::Error(e) => warn!(op, kind = e.kind(), "Request failed: {e}"),
            ok => debug!(op, kind = ok.kind(), "Request handled"),
        }
        response
    }

    async fn dispatch(&self, request: MarketRequest) -> MarketResponse {
        let api = &self.api;
        match request {
            MarketRequest::Register { registration } => {
                respond(api.register(registration).await, MarketResponse::Account)
            }
            MarketRequest::Authenticate { handle, secret } => respond(
                api.authenticate(&handle, &secret).await,
                MarketResponse::Session,
            ),
            MarketRequest::Logout { session } => {
                respond(api.logout(&session).await, |()| MarketResponse::Done)
            }
            MarketRequest::Me { session } => respond(api.me(&session).await, MarketResponse::Account),

            MarketRequest::ListDiscoverable { filter } => respond(
                api.list_discoverable(filter).await,
                MarketResponse::Accounts,
            ),
            MarketRequest::Showcase { filter } => {
                respond(api.showcase(filter).await, MarketResponse::Accounts)
            }
            MarketRequest::CallableProvider { provider } => respond(
                api.callable_provider(provider).await,
                MarketResponse::Account,
            ),

            MarketRequest::PendingProviders { session } => respond(
                api.pending_providers(&session).await,
                MarketResponse::Accounts,
            ),
            MarketRequest::ApprovedProviders { session } => respond(
                api.approved_providers(&session).await,
                MarketResponse::Accounts,
            ),
            MarketRequest::Payers { session } => {
                respond(api.payers(&session).await, MarketResponse::Accounts)
            }
            MarketRequest::Stats { session } => {
                respond(api.stats(&session).await, MarketResponse::Stats)
            }
            MarketRequest::Approve { session, provider } => respond(
                api.approve(&session, provider).await,
                MarketResponse::Approval,
            ),
            MarketRequest::Reject { session, provider } => respond(
                api.reject(&session, provider).await,
                MarketResponse::Approval,
            ),

            MarketRequest::SetOnline {
                session,
                provider,
                online,
            } => respond(
                api.set_online(&session, provider, online).await,
                MarketResponse::Account,
            ),
            MarketRequest::SetRate {
                session,
                provider,
                rate,
            } => respond(
                api.set_rate(&session, provider, rate).await,
                MarketResponse::Account,
            ),
            MarketRequest::AddMedia {
                session,
                provider,
                locator,
                kind,
            } => respond(
                api.add_media(&session, provider, locator, kind).await,
                MarketResponse::Media,
            ),
            MarketRequest::RemoveMedia {
                session,
                provider,
                media,
            } => respond(
                api.remove_media(&session, provider, media).await,
                |()| MarketResponse::Done,
            ),

            MarketRequest::Balance { session } => {
                respond(api.balance(&session).await, MarketResponse::Credits)
            }
            MarketRequest::ConfirmFunds { session, amount } => respond(
                api.confirm_funds(&session, amount).await,
                MarketResponse::Credits,
            ),
            MarketRequest::ReserveAndDebit {
                session,
                payer,
                amount,
            } => respond(
                api.reserve_and_debit(&session, payer, amount).await,
                MarketResponse::Receipt,
            ),

            MarketRequest::BeginCall {
                session,
                payer,
                amount,
            } => respond(
                api.begin_call(&session, payer, amount).await,
                MarketResponse::Receipt,
            ),
            MarketRequest::EndCall { session, payer } => respond(
                api.end_call(&session, payer).await,
                |()| MarketResponse::Done,
            ),
        }
    }
}
