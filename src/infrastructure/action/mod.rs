//! Team operations run through the validate / authorize / execute / after pipeline

mod add_member;
mod create_team;
mod follow_ups;
mod invite_member;
mod lifecycle;
mod manage_invitation;
mod pipeline;
mod remove_member;
mod respond_invitation;
mod support;
mod update_team;

pub use add_member::{AddMember, AddMemberInput};
pub use create_team::{CreateTeam, CreateTeamInput};
pub use invite_member::{InviteMember, InviteMemberInput, IssuedInvitation};
pub use lifecycle::{TransitionTeam, TransitionTeamInput};
pub use manage_invitation::{CancelInvitation, InvitationIdInput, ResendInvitation};
pub use pipeline::{Action, ActionEnv, ActionPipeline, Executed};
pub use remove_member::{RemoveMember, RemoveMemberInput, RemovedMember};
pub use respond_invitation::{
    AcceptInvitation, AcceptedInvitation, DeclineInvitation, InvitationTokenInput,
};
pub use update_team::{UpdateTeam, UpdateTeamInput};
