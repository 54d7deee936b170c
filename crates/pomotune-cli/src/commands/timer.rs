use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use pomotune_core::timer::format_clock;
use pomotune_core::{Event, IntervalEngine, PlaybackSync, TickSource};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::context::{catch_up, AppContext, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start or resume the current session
    Start,
    /// Pause the countdown
    Pause,
    /// Rewind the current session to its full length
    Reset,
    /// Finish the current session and move to the next one
    Skip,
    /// Drive the countdown in the foreground until the session ends (Ctrl-C pauses)
    Run,
}

pub async fn run(action: TimerAction) -> CliResult {
    let ctx = AppContext::open()?;
    let mut engine = ctx.load_engine()?;
    let sync = ctx.playback_sync();

    // Time that passed while no process was driving the engine.
    catch_up(&mut engine, ctx.secs_since_save()?, sync.as_deref()).await?;

    match action {
        TimerAction::Status => {
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
        TimerAction::Start => {
            let event = engine.start();
            report(&engine, sync.as_deref(), event).await?;
        }
        TimerAction::Pause => {
            let event = engine.pause();
            report(&engine, sync.as_deref(), event).await?;
        }
        TimerAction::Reset => {
            let event = engine.reset();
            report(&engine, sync.as_deref(), event).await?;
        }
        TimerAction::Skip => {
            let event = engine.skip();
            report(&engine, sync.as_deref(), event).await?;
        }
        TimerAction::Run => {
            ctx.save_engine(&engine)?;
            run_foreground(&ctx, &mut engine, sync).await?;
        }
    }

    ctx.save_engine(&engine)?;
    Ok(())
}

fn emit(event: &Event) -> CliResult {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

/// Print the event, or the snapshot when the command was a no-op.
async fn report(
    engine: &IntervalEngine,
    sync: Option<&PlaybackSync>,
    event: Option<Event>,
) -> CliResult {
    match event {
        Some(event) => {
            emit(&event)?;
            dispatch_now(sync, &event).await;
        }
        None => println!("{}", serde_json::to_string_pretty(&engine.snapshot())?),
    }
    Ok(())
}

async fn dispatch_now(sync: Option<&PlaybackSync>, event: &Event) {
    if let Some(sync) = sync {
        sync.handle(event).await;
    }
}

async fn run_foreground(
    ctx: &AppContext,
    engine: &mut IntervalEngine,
    sync: Option<Arc<PlaybackSync>>,
) -> CliResult {
    let mut pending = JoinSet::new();
    let mut dispatch = |event: &Event| {
        if let Some(sync) = sync.clone() {
            let event = event.clone();
            pending.spawn(async move { sync.handle(&event).await });
        }
    };

    if let Some(event) = engine.start() {
        dispatch(&event);
    }

    let mut ticks = TickSource::new(ctx.clock.clone());
    let mut second = tokio::time::interval(Duration::from_secs(1));
    second.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = tokio::time::interval(Duration::from_secs(ctx.config.spotify.poll_interval_secs));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut now_playing: Option<String> = None;

    loop {
        tokio::select! {
            _ = second.tick() => {
                if let Some(event) = engine.advance(ticks.elapsed_ticks()) {
                    eprintln!();
                    emit(&event)?;
                    dispatch(&event);
                    ctx.save_engine(engine)?;
                }
                render(engine, now_playing.as_deref());
                if !engine.is_running() {
                    break;
                }
            }
            _ = poll.tick(), if sync.is_some() => {
                if let Some(sync) = sync.as_deref() {
                    now_playing = sync.poll().await.and_then(|s| s.now_playing());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                if let Some(event) = engine.pause() {
                    emit(&event)?;
                    dispatch(&event);
                }
                break;
            }
        }
    }
    eprintln!();

    while pending.join_next().await.is_some() {}
    Ok(())
}

fn render(engine: &IntervalEngine, now_playing: Option<&str>) {
    let snap = engine.snapshot();
    let mut line = format!(
        "\r{:<12} {}  {:>3.0}%  #{}",
        snap.label,
        format_clock(snap.remaining_secs),
        snap.progress_pct,
        snap.completed_work_sessions,
    );
    if let Some(track) = now_playing {
        line.push_str("  ♪ ");
        line.push_str(track);
    }
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{line}\x1b[K");
    let _ = stderr.flush();
}
