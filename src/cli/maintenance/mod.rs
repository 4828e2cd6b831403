//! Maintenance commands

use clap::{Args, Subcommand};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum MaintenanceCommand {
    /// Mark pending invitations past their expiry as expired
    ExpireInvitations(ExpireInvitationsArgs),

    /// Recompute member counters from memberships and repair drift
    RecountMembers(RecountMembersArgs),

    /// Archive active teams without recent team or member activity
    ArchiveInactive(ArchiveInactiveArgs),

    /// Permanently delete teams soft-deleted long enough ago
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug)]
pub struct ExpireInvitationsArgs {
    /// Only touch invitations that expired at least this many days ago
    #[arg(long, default_value_t = 0)]
    pub older_than_days: i64,

    /// Report without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct RecountMembersArgs {
    /// Report drift without repairing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ArchiveInactiveArgs {
    /// Days without activity before a team counts as inactive
    #[arg(long, default_value_t = 30)]
    pub days: i64,

    /// List inactive teams without archiving them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Only purge teams deleted at least this many days ago
    #[arg(long, default_value_t = 30)]
    pub older_than_days: i64,

    /// List teams without purging them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(command: MaintenanceCommand) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let engine = crate::build_engine(&config).await?;

    match command {
        MaintenanceCommand::ExpireInvitations(args) => {
            let expired = engine
                .maintenance
                .expire_invitations(args.older_than_days, args.dry_run)
                .await?;
            for invitation in &expired {
                println!(
                    "{}\t{}\t{}\texpired {}",
                    invitation.id(),
                    invitation.team_id(),
                    invitation.email(),
                    invitation.expires_at().to_rfc3339()
                );
            }
            info!(count = expired.len(), dry_run = args.dry_run, "Invitation sweep done");
        }
        MaintenanceCommand::RecountMembers(args) => {
            let report = engine.maintenance.recount_members(args.dry_run).await?;
            for repair in &report.repairs {
                println!("{}\t{} -> {}", repair.team_id, repair.stored, repair.actual);
            }
            info!(
                teams_checked = report.teams_checked,
                drifted = report.repairs.len(),
                dry_run = args.dry_run,
                "Recount done"
            );
        }
        MaintenanceCommand::ArchiveInactive(args) => {
            let report = engine
                .maintenance
                .archive_inactive_teams(args.days, args.dry_run)
                .await?;
            for team in &report.inactive {
                println!(
                    "{}\t{}\tlast active {}",
                    team.team_id,
                    team.name,
                    team.last_activity_at.to_rfc3339()
                );
            }
            for (team_id, reason) in &report.skipped {
                println!("{}\tskipped: {}", team_id, reason);
            }
            info!(
                inactive = report.inactive.len(),
                archived = report.archived.len(),
                dry_run = args.dry_run,
                "Inactive team sweep done"
            );
        }
        MaintenanceCommand::Cleanup(args) => {
            let purged = engine
                .maintenance
                .purge_deleted_teams(args.older_than_days, args.dry_run)
                .await?;
            for team in &purged {
                let deleted_at = team.deleted_at().map(|at| at.to_rfc3339()).unwrap_or_default();
                println!("{}\t{}\tdeleted {}", team.id(), team.name(), deleted_at);
            }
            info!(count = purged.len(), dry_run = args.dry_run, "Cleanup done");
        }
    }
    Ok(())
}
