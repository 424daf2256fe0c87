//! Command handlers. Each one checks the local role snapshot first; the
//! server re-checks against the live record.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use livecall_core::application::call_session::{ActiveCall, CallSessionEngine};
use livecall_core::application::incoming_call::IncomingCallHints;
use livecall_core::domain::account::{Account, AccountId, MediaId, Registration};
use livecall_core::domain::call::{format_clock, CallSummary, Party};
use livecall_core::domain::session::Capability;

use crate::capture::SimulatedCapture;
use crate::state::ClientState;
use crate::{Command, MediaCommand};

pub async fn run(state: &ClientState, command: Command) -> anyhow::Result<()> {
    let api = &state.api;
    match command {
        Command::Register {
            handle,
            name,
            gender,
            secret,
        } => {
            let account = api
                .register(Registration {
                    handle,
                    secret,
                    display_name: name,
                    gender,
                })
                .await?;
            if account.approved {
                println!("Registered {} as {}", account.handle, account.role);
            } else {
                println!(
                    "Registered {} as {}; an admin must approve the account",
                    account.handle, account.role
                );
            }
        }
        Command::Login { handle, secret } => {
            let session = state.sessions.login(&handle, &secret).await?;
            println!("Signed in as {} ({})", session.account.display_name, session.role());
        }
        Command::Logout => {
            state.sessions.logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match state.sessions.current() {
            Some(session) => print_account(&session.account),
            None => println!("Not signed in"),
        },

        Command::Discover { filter } => {
            state.require(Capability::Discover)?;
            print_accounts(&api.list_discoverable(filter).await?);
        }
        Command::Showcase { filter } => print_accounts(&api.showcase(filter).await?),

        Command::Pending => {
            let session = state.require(Capability::ApproveProviders)?;
            print_accounts(&api.pending_providers(&session).await?);
        }
        Command::Approved => {
            let session = state.require(Capability::ApproveProviders)?;
            print_accounts(&api.approved_providers(&session).await?);
        }
        Command::Payers => {
            let session = state.require(Capability::ApproveProviders)?;
            print_accounts(&api.payers(&session).await?);
        }
        Command::Stats => {
            let session = state.require(Capability::ViewStats)?;
            let stats = api.stats(&session).await?;
            println!("{stats:#?}");
        }
        Command::Approve { provider } => {
            let session = state.require(Capability::ApproveProviders)?;
            let outcome = api.approve(&session, AccountId(provider)).await?;
            println!("Provider {provider}: {outcome:?}");
        }
        Command::Reject { provider } => {
            let session = state.require(Capability::ApproveProviders)?;
            let outcome = api.reject(&session, AccountId(provider)).await?;
            println!("Provider {provider}: {outcome:?}");
        }

        Command::Online => set_presence(state, true).await?,
        Command::Offline => set_presence(state, false).await?,
        Command::Rate { rate } => {
            let session = state.require(Capability::ManagePresence)?;
            let account = api.set_rate(&session, session.account_id(), rate).await?;
            println!("Rate set to {}/min", account.rate);
        }
        Command::Media(media) => {
            let session = state.require(Capability::ManageGallery)?;
            let provider = session.account_id();
            match media {
                MediaCommand::Add { locator, kind } => {
                    let item = api.add_media(&session, provider, locator, kind).await?;
                    println!("Added {:?} #{}", item.kind, item.id.0);
                }
                MediaCommand::Remove { id } => {
                    api.remove_media(&session, provider, MediaId(id)).await?;
                    println!("Removed #{id}");
                }
                MediaCommand::List => {
                    for item in api.me(&session).await?.gallery {
                        println!("#{:<4} {:?} {}", item.id.0, item.kind, item.locator);
                    }
                }
            }
        }
        Command::Standby => standby(state).await?,

        Command::Balance => {
            let session = state.require(Capability::ManageBalance)?;
            println!("Balance: {}", api.balance(&session).await?);
        }
        Command::TopUp { amount } => {
            let session = state.require(Capability::ManageBalance)?;
            println!("Balance: {}", api.confirm_funds(&session, amount).await?);
        }
        Command::Call {
            provider,
            minutes,
            mute,
            no_video,
        } => {
            let session = state.require(Capability::PlaceCall)?;
            let engine = CallSessionEngine::new(
                Arc::clone(api),
                Arc::new(SimulatedCapture),
                Arc::clone(&state.app_events),
                state.config.pricing.durations_minutes.clone(),
            );
            let call = engine
                .offer(&session, AccountId(provider), minutes)
                .await?
                .start()
                .await?;
            if mute {
                call.set_audio_enabled(false);
            }
            if no_video {
                call.set_video_enabled(false);
            }
            let summary = follow_call(call).await?;
            info!(call = %summary.call_id, reason = ?summary.reason, "Call finished");
        }
    }
    Ok(())
}

/// Render the countdown until the call ends; Ctrl-C hangs up.
async fn follow_call(call: ActiveCall) -> anyhow::Result<CallSummary> {
    let mut remaining = call.watch_remaining();
    let summary = loop {
        tokio::select! {
            changed = remaining.changed() => {
                if changed.is_err() {
                    break call.wait().await?;
                }
                let seconds = *remaining.borrow_and_update();
                print!("\r{} left ", format_clock(seconds));
                std::io::stdout().flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                break call.hang_up(Party::Payer).await?;
            }
        }
    };
    println!();
    Ok(summary)
}

/// Go online, roll incoming-call hints while waiting, go offline on Ctrl-C.
async fn standby(state: &ClientState) -> anyhow::Result<()> {
    let session = state.require(Capability::ManagePresence)?;
    let provider = session.account_id();
    state.api.set_online(&session, provider, true).await?;
    println!("Online. Press Ctrl-C to go offline");

    let notifications = &state.config.notifications;
    let _hints = notifications.enabled.then(|| {
        IncomingCallHints::new(Arc::clone(&state.app_events), notifications).spawn(provider)
    });

    tokio::signal::ctrl_c().await?;
    state.api.set_online(&session, provider, false).await?;
    println!("\nOffline");
    Ok(())
}

async fn set_presence(state: &ClientState, online: bool) -> anyhow::Result<()> {
    let session = state.require(Capability::ManagePresence)?;
    let account = state
        .api
        .set_online(&session, session.account_id(), online)
        .await?;
    println!("{} is {}", account.display_name, presence(&account));
    Ok(())
}

fn presence(account: &Account) -> &'static str {
    if account.online {
        "online"
    } else {
        "offline"
    }
}

fn print_account(account: &Account) {
    println!("#{} {} ({})", account.id.0, account.display_name, account.role);
    println!("  handle:   {}", account.handle);
    println!("  approved: {}", account.approved);
    if account.rate > 0 {
        println!("  rate:     {}/min", account.rate);
        println!("  status:   {}", presence(account));
        println!("  gallery:  {} item(s)", account.gallery.len());
    }
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("(none)");
        return;
    }
    for account in accounts {
        println!(
            "#{:<4} {:<24} {:<8} {:>5}/min {}",
            account.id.0,
            account.display_name,
            account.role.to_string(),
            account.rate,
            presence(account)
        );
    }
}
