/*
[INPUT]:  Parsed subcommands and an AppContext
[OUTPUT]: One-shot account and order management
[POS]:    CLI layer - non-interactive commands
[UPDATE]: When adding subcommands
*/

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use mmr_backend::{AuthProvider, Stage};
use tracing::info;

use mmr_tracker::{OrderListing, StageCoordinator, TrackerError, format_elapsed};

use super::AppContext;

pub async fn signup(ctx: &AppContext, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = prompt_email(&theme, email)?;
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?;

    match ctx.auth.sign_up(&email, &password).await {
        Ok(Some(session)) => {
            ctx.remember_session(&session)?;
            println!("{}", style("Account created. You are signed in.").green());
        }
        Ok(None) => {
            println!(
                "{}",
                style("Account created. Confirm your email, then run `mmr-tracker login`.").green()
            );
        }
        Err(err) => println!("{}", style(err.user_message()).red()),
    }
    Ok(())
}

pub async fn login(ctx: &AppContext, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = prompt_email(&theme, email)?;
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    sign_in(ctx, &email, &password).await
}

/// Sign in and persist the session. Rejected credentials are reported, not
/// returned as errors.
pub async fn sign_in(ctx: &AppContext, email: &str, password: &str) -> Result<()> {
    match ctx.auth.sign_in(email, password).await {
        Ok(session) => {
            ctx.remember_session(&session)?;
            let who = session.user.email.as_deref().unwrap_or(&session.user.id);
            println!("{} {}", style("Signed in as").green(), style(who).cyan());
        }
        Err(err) => println!("{}", style(err.user_message()).red()),
    }
    Ok(())
}

/// Sign out through the coordinator that owns the in-memory timers, so a
/// later snapshot cannot bring them back.
pub async fn logout(ctx: &AppContext, coordinator: &mut StageCoordinator) -> Result<()> {
    let result = coordinator.sign_out(&ctx.auth as &dyn AuthProvider).await;
    ctx.forget_session();
    match result {
        Ok(()) => println!("{}", style("Signed out.").green()),
        Err(err) => {
            info!(error = %err, "remote sign out failed");
            println!(
                "{}",
                style("Signed out locally; the server could not be reached.").yellow()
            );
        }
    }
    Ok(())
}

pub async fn list_orders(ctx: &AppContext) -> Result<()> {
    ctx.require_session()?;
    let coordinator = ctx.coordinator();
    let listing = coordinator.list_orders().await.map_err(report)?;
    print_listing(&listing);
    Ok(())
}

pub async fn rename(ctx: &AppContext, order_id: &str, number: &str) -> Result<()> {
    ctx.require_session()?;
    let coordinator = ctx.coordinator();
    match coordinator.rename_order(order_id, number).await {
        Ok(order) => println!(
            "{} {}",
            style("Order renamed to").green(),
            style(order.display_name()).cyan()
        ),
        Err(err) => println!("{}", style(err.user_message()).red()),
    }
    Ok(())
}

pub async fn delete(ctx: &AppContext, order_id: &str, yes: bool) -> Result<()> {
    ctx.require_session()?;
    if !yes && !confirm(&format!("Delete order {order_id} and its recorded times?"))? {
        return Ok(());
    }
    let mut coordinator = ctx.coordinator();
    coordinator
        .delete_order(order_id)
        .await
        .map_err(report)
        .with_context(|| format!("delete order {order_id}"))?;
    println!("{}", style("Order deleted.").green());
    Ok(())
}

pub async fn delete_all(ctx: &AppContext, yes: bool) -> Result<()> {
    ctx.require_session()?;
    if !yes && !confirm("Delete ALL orders and their recorded times?")? {
        return Ok(());
    }
    let mut coordinator = ctx.coordinator();
    coordinator
        .delete_all_orders()
        .await
        .map_err(report)
        .context("delete all orders")?;
    println!("{}", style("All orders deleted.").green());
    Ok(())
}

pub fn print_listing(listing: &OrderListing) {
    if listing.orders.is_empty() {
        println!("{}", style("No orders found.").yellow());
        return;
    }
    println!(
        "{}",
        style(format!(
            "{:<36}  {:<16}  {:<9}  {:>9}  {}",
            "ID", "ORDER", "STAGE", "ASSEMBLY", "CREATED"
        ))
        .bold()
    );
    for order in &listing.orders {
        let assembly = listing
            .times_for(&order.id)
            .map(|times| format_elapsed(times.stage(Stage::ACTIVE)))
            .unwrap_or_else(|| "-".to_string());
        let incidents = match order.has_incidents {
            Some(true) => style(" !").red().to_string(),
            _ => String::new(),
        };
        println!(
            "{:<36}  {:<16}  {:<9}  {:>9}  {}{}",
            order.id,
            order.display_name(),
            order.current_stage.as_str(),
            assembly,
            order.created_at.format("%Y-%m-%d %H:%M"),
            incidents
        );
    }
}

fn prompt_email(theme: &ColorfulTheme, email: Option<String>) -> Result<String> {
    match email {
        Some(email) => Ok(email),
        None => Ok(Input::with_theme(theme)
            .with_prompt("Email")
            .interact_text()?),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Keep the operator-facing message in the error chain.
fn report(err: TrackerError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
