//! Analytics command

use clap::{Args, ValueEnum};

use crate::domain::ids::TeamId;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    /// Report on a single team instead of all teams
    #[arg(long)]
    pub team: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub async fn run(args: AnalyticsArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let engine = crate::build_engine(&config).await?;

    let rows: Vec<(String, String)> = match &args.team {
        Some(team) => {
            let report = engine.analytics.team(&TeamId::parse(team)?).await?;
            if let OutputFormat::Json = args.format {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            vec![
                ("team_id".into(), report.team_id.to_string()),
                ("team_name".into(), report.team_name),
                ("status".into(), report.status.as_str().into()),
                ("total_members".into(), report.total_members.to_string()),
                ("active_members".into(), report.active_members.to_string()),
                ("pending_invitations".into(), report.pending_invitations.to_string()),
                ("created_at".into(), report.created_at.to_rfc3339()),
            ]
        }
        None => {
            let report = engine.analytics.global().await?;
            if let OutputFormat::Json = args.format {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            let mut rows = vec![
                ("total_teams".into(), report.total_teams.to_string()),
                ("active_teams".into(), report.active_teams.to_string()),
                ("total_members".into(), report.total_members.to_string()),
                ("active_members".into(), report.active_members.to_string()),
                ("pending_invitations".into(), report.pending_invitations.to_string()),
                ("teams_created_today".into(), report.teams_created_today.to_string()),
                ("teams_created_this_week".into(), report.teams_created_this_week.to_string()),
                ("teams_created_this_month".into(), report.teams_created_this_month.to_string()),
            ];
            rows.extend(
                report
                    .teams_by_status
                    .into_iter()
                    .map(|(status, count)| (format!("status.{}", status), count.to_string())),
            );
            rows
        }
    };

    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in rows {
        println!("{:<width$}  {}", name, value, width = width);
    }
    Ok(())
}
