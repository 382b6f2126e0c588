/*
[INPUT]:  Operator choices via dialoguer prompts
[OUTPUT]: Orders created/opened and their stage timer driven end to end
[POS]:    CLI interactive flow
[UPDATE]: When the production screen or completion flow changes
*/

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select, theme::ColorfulTheme};
use mmr_backend::{IncidentCategory, ManufacturingOrder, Stage};
use tracing::info;

use mmr_tracker::{
    CompletionReport, RemoteStatus, StageCoordinator, StopResult, TimerPhase, TrackerError,
    format_elapsed,
};

use super::{AppContext, commands};

pub async fn run_interactive(ctx: &AppContext) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("{}", style("MMR Production Tracker").bold().cyan());

    if ctx.session().is_none() {
        println!("{}", style("Please sign in.").yellow());
        let email: String = Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()?;
        let password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;
        commands::sign_in(ctx, &email, &password).await?;
        if ctx.session().is_none() {
            return Ok(());
        }
    }

    let mut coordinator = ctx.coordinator();
    let result = main_menu(ctx, &mut coordinator, &theme).await;
    if !matches!(result, Ok(MenuExit::SignedOut)) {
        coordinator.shutdown().await;
    }
    result.map(|_| ())
}

/// How the main menu was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuExit {
    Exit,
    /// Local timers are already discarded; nothing may be persisted again.
    SignedOut,
}

async fn main_menu(
    ctx: &AppContext,
    coordinator: &mut StageCoordinator,
    theme: &ColorfulTheme,
) -> Result<MenuExit> {
    loop {
        let pending = coordinator.pending_count();
        let retry_label = format!("Retry unsaved changes ({pending})");
        let mut actions = vec![
            "New manufacturing order",
            "New task without order number",
            "Open existing order",
        ];
        if pending > 0 {
            actions.push(&retry_label);
        }
        actions.extend(["Sign out", "Exit"]);

        let selection = Select::with_theme(theme)
            .with_prompt("Select action")
            .items(&actions)
            .default(0)
            .interact()?;

        match actions[selection] {
            "New manufacturing order" => {
                let number: String = Input::with_theme(theme)
                    .with_prompt("Manufacturing number")
                    .interact_text()?;
                if let Some(order) = create(coordinator, Some(number)).await? {
                    production(coordinator, &order, theme).await?;
                }
            }
            "New task without order number" => {
                if let Some(order) = create(coordinator, None).await? {
                    production(coordinator, &order, theme).await?;
                }
            }
            "Open existing order" => open_existing(coordinator, theme).await?,
            "Sign out" => {
                commands::logout(ctx, coordinator).await?;
                return Ok(MenuExit::SignedOut);
            }
            "Exit" => return Ok(MenuExit::Exit),
            _ => retry(coordinator).await?,
        }
    }
}

async fn create(
    coordinator: &mut StageCoordinator,
    number: Option<String>,
) -> Result<Option<ManufacturingOrder>> {
    match coordinator.create_order(number).await {
        Ok(order) => {
            println!(
                "{} {}",
                style("Ready:").green(),
                style(order.display_name()).cyan()
            );
            Ok(Some(order))
        }
        Err(err) if err.is_auth_error() => Err(err.into()),
        Err(err) => {
            println!("{}", style(err.user_message()).red());
            Ok(None)
        }
    }
}

async fn open_existing(coordinator: &mut StageCoordinator, theme: &ColorfulTheme) -> Result<()> {
    let listing = coordinator.list_orders().await?;
    if listing.orders.is_empty() {
        println!("{}", style("No orders found.").yellow());
        return Ok(());
    }

    let items: Vec<String> = listing
        .orders
        .iter()
        .map(|order| {
            let time = listing
                .times_for(&order.id)
                .map(|times| format_elapsed(times.total))
                .unwrap_or_else(|| "--:--.--".to_string());
            format!("{} | {} | {}", order.display_name(), order.current_stage, time)
        })
        .collect();
    let selection = Select::with_theme(theme)
        .with_prompt("Select order")
        .items(&items)
        .default(0)
        .interact()?;

    let order = &listing.orders[selection];
    coordinator
        .select_order(order, listing.times_for(&order.id))
        .await?;
    production(coordinator, order, theme).await
}

async fn production(
    coordinator: &mut StageCoordinator,
    order: &ManufacturingOrder,
    theme: &ColorfulTheme,
) -> Result<()> {
    let order_id = order.id.as_str();
    loop {
        let Some(state) = coordinator.state(order_id).await else {
            coordinator.go_to_menu().await;
            return Ok(());
        };
        let phase = state.phase();
        println!(
            "{} {}  {}  [{}]",
            style(order.display_name()).bold(),
            style(Stage::ACTIVE.title()).dim(),
            style(format_elapsed(state.display_ms())).cyan().bold(),
            phase_label(phase)
        );

        let actions: &[&str] = match phase {
            TimerPhase::Idle => &["Start", "Back to menu"],
            TimerPhase::Running => &["Refresh", "Pause", "Stop", "Back to menu"],
            TimerPhase::Paused => &["Resume", "Stop", "Back to menu"],
            TimerPhase::Stopped
                if order.current_stage.is_summary()
                    || coordinator.is_completion_submitted(order_id) =>
            {
                &["Back to menu"]
            }
            TimerPhase::Stopped => &["Complete", "Back to menu"],
        };
        let selection = Select::with_theme(theme)
            .with_prompt("Timer")
            .items(actions)
            .default(0)
            .interact()?;

        let outcome = match actions[selection] {
            "Start" => coordinator.start(order_id).await.map(|_| ()),
            "Pause" => coordinator.pause(order_id).await.map(|_| ()),
            "Resume" => coordinator.resume(order_id).await.map(|_| ()),
            "Stop" => match coordinator.stop(order_id).await {
                Ok(StopResult::Committed { millis, remote }) => {
                    println!(
                        "{} {}",
                        style("Stage time recorded:").green(),
                        style(format_elapsed(millis)).cyan()
                    );
                    print_remote(&remote);
                    complete(coordinator, order, theme).await?;
                    coordinator.go_to_menu().await;
                    return Ok(());
                }
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            },
            "Complete" => {
                complete(coordinator, order, theme).await?;
                coordinator.go_to_menu().await;
                return Ok(());
            }
            "Refresh" => Ok(()),
            _ => {
                coordinator.go_to_menu().await;
                return Ok(());
            }
        };

        if let Err(err) = outcome {
            if err.is_auth_error() {
                return Err(err.into());
            }
            println!("{}", style(err.user_message()).red());
        }
    }
}

/// Ask for the completion report until it is accepted.
async fn complete(
    coordinator: &mut StageCoordinator,
    order: &ManufacturingOrder,
    theme: &ColorfulTheme,
) -> Result<()> {
    loop {
        let report = if order.is_ad_hoc() {
            let text: String = Input::with_theme(theme)
                .with_prompt("What was done in this task?")
                .interact_text()?;
            CompletionReport::Description(text)
        } else if Confirm::with_theme(theme)
            .with_prompt("Were there any incidents?")
            .default(false)
            .interact()?
        {
            let labels: Vec<&str> = IncidentCategory::ALL.iter().map(|c| c.label()).collect();
            let picked = MultiSelect::with_theme(theme)
                .with_prompt("Incident categories (space to select)")
                .items(&labels)
                .interact()?;
            let notes: String = Input::with_theme(theme)
                .with_prompt("Describe the incident")
                .allow_empty(true)
                .interact_text()?;
            CompletionReport::Incidents {
                categories: picked.into_iter().map(|idx| IncidentCategory::ALL[idx]).collect(),
                notes,
            }
        } else {
            CompletionReport::NoIncidents
        };

        match coordinator.complete(&order.id, report).await {
            Ok(status) => {
                print_remote(&status);
                info!(order_id = %order.id, "completion recorded");
                return Ok(());
            }
            Err(TrackerError::InvalidInput(message)) => {
                println!("{}", style(message).yellow());
            }
            Err(err @ TrackerError::CompletionSubmitted { .. }) => {
                println!("{}", style(err.user_message()).yellow());
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn retry(coordinator: &mut StageCoordinator) -> Result<()> {
    match coordinator.retry_pending().await {
        Ok(report) if report.remaining == 0 => {
            println!(
                "{}",
                style(format!("All {} changes saved.", report.flushed)).green()
            );
        }
        Ok(report) => {
            println!(
                "{}",
                style(format!(
                    "{} saved, {} still waiting for the server.",
                    report.flushed, report.remaining
                ))
                .yellow()
            );
        }
        Err(err) => println!("{}", style(err.user_message()).red()),
    }
    Ok(())
}

fn print_remote(status: &RemoteStatus) {
    match status {
        RemoteStatus::Saved => println!("{}", style("Saved.").green()),
        RemoteStatus::Pending { reason } => println!("{}", style(reason).yellow()),
    }
}

fn phase_label(phase: TimerPhase) -> console::StyledObject<&'static str> {
    match phase {
        TimerPhase::Idle => style("ready"),
        TimerPhase::Running => style("running").green(),
        TimerPhase::Paused => style("paused").yellow(),
        TimerPhase::Stopped => style("done").dim(),
    }
}
