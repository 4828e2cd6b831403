//! Create-team command

use clap::Args;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::action::{ActionOutcome, Actor};
use crate::domain::ids::TenantId;
use crate::domain::principal::PrincipalRef;
use crate::infrastructure::action::CreateTeamInput;

#[derive(Args, Debug)]
pub struct CreateTeamArgs {
    /// Team name; the slug is derived from it
    #[arg(long)]
    pub name: String,

    /// Owning principal as `kind:id`, e.g. `user:42`
    #[arg(long)]
    pub owner: String,

    #[arg(long)]
    pub description: Option<String>,

    /// project, department, organization, community or custom
    #[arg(long = "type")]
    pub team_type: Option<String>,

    /// Tenant scope when tenancy is enabled
    #[arg(long)]
    pub tenant: Option<String>,
}

pub async fn run(args: CreateTeamArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    warn_if_ephemeral(&config);

    let owner = PrincipalRef::parse(&args.owner).ok_or_else(|| {
        anyhow::anyhow!("'{}' is not a principal reference (expected kind:id)", args.owner)
    })?;
    let mut actor = Actor::new(owner);
    if let Some(tenant) = args.tenant {
        actor = actor.with_tenant(TenantId::new(tenant));
    }

    let engine = crate::build_engine(&config).await?;
    let outcome = engine
        .teams
        .create_team(
            actor,
            CreateTeamInput {
                name: args.name,
                description: args.description,
                team_type: args.team_type,
                ..Default::default()
            },
        )
        .await;

    match outcome {
        ActionOutcome::Success {
            data,
            message,
            warnings,
        } => {
            for warning in &warnings {
                warn!(sub_action = %warning.sub_action, "{}", warning.message);
            }
            info!("{}", message);
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        ActionOutcome::Failure { error, errors } => {
            eprintln!("{}", serde_json::to_string_pretty(&errors)?);
            Err(error.into())
        }
    }
}

fn warn_if_ephemeral(config: &AppConfig) {
    if config.storage.backend.eq_ignore_ascii_case("memory") {
        warn!("storage.backend is 'memory'; the team will not outlive this process");
    }
}
