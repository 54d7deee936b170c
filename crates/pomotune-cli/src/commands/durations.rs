use clap::Subcommand;
use pomotune_core::storage::settings;
use pomotune_core::Durations;

use crate::context::{catch_up, AppContext, CliResult};

#[derive(Subcommand)]
pub enum DurationsAction {
    /// Print session lengths in minutes
    Show,
    /// Change one or more session lengths (1-180 minutes)
    Set {
        /// Work session length
        #[arg(long)]
        work: Option<u32>,
        /// Short break length
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break length
        #[arg(long)]
        long_break: Option<u32>,
    },
}

pub async fn run(action: DurationsAction) -> CliResult {
    let ctx = AppContext::open()?;
    match action {
        DurationsAction::Show => {
            let durations = settings::load_durations(ctx.db.as_ref());
            println!("{}", serde_json::to_string_pretty(&durations)?);
        }
        DurationsAction::Set {
            work,
            short_break,
            long_break,
        } => {
            let current = settings::load_durations(ctx.db.as_ref());
            let updated = Durations::new(
                work.unwrap_or(current.work_min),
                short_break.unwrap_or(current.short_break_min),
                long_break.unwrap_or(current.long_break_min),
            )?;

            // Load first so a running engine catches up under the old lengths.
            let mut engine = ctx.load_engine()?;
            let sync = ctx.playback_sync();
            catch_up(&mut engine, ctx.secs_since_save()?, sync.as_deref()).await?;
            settings::save_durations(ctx.db.as_ref(), &updated)?;
            engine.set_durations(updated)?;
            ctx.save_engine(&engine)?;

            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }
    Ok(())
}
