//! Staged writes applied by a single commit

use crate::domain::activity::ActivityRecord;
use crate::domain::ids::TeamId;
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::team::Team;

/// One staged write
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertTeam(Team),
    /// Replaces team fields except the denormalized counters
    UpdateTeam { team: Team, expected_version: u64 },
    /// Adds `delta` to `members_count`; fails if the result would exceed `ceiling`
    AdjustMembers {
        team_id: TeamId,
        delta: i32,
        ceiling: Option<u32>,
    },
    /// Overwrites `members_count`; used by reconciliation only
    SetMemberCount { team_id: TeamId, count: u32 },
    InsertMembership(Membership),
    UpdateMembership {
        membership: Membership,
        expected_version: u64,
    },
    InsertInvitation(Invitation),
    UpdateInvitation {
        invitation: Invitation,
        expected_version: u64,
    },
    AppendActivity(ActivityRecord),
    /// Hard-deletes a soft-deleted team together with its memberships,
    /// invitations, issued tokens and activity
    PurgeTeam(TeamId),
}

/// Ordered list of writes committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<Write>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn insert_team(&mut self, team: Team) -> &mut Self {
        self.push(Write::InsertTeam(team))
    }

    /// Stages `team` guarded by the version it was read at
    pub fn update_team(&mut self, team: Team) -> &mut Self {
        let expected_version = team.version();
        self.push(Write::UpdateTeam {
            team,
            expected_version,
        })
    }

    pub fn adjust_members(&mut self, team_id: TeamId, delta: i32, ceiling: Option<u32>) -> &mut Self {
        self.push(Write::AdjustMembers {
            team_id,
            delta,
            ceiling,
        })
    }

    pub fn set_member_count(&mut self, team_id: TeamId, count: u32) -> &mut Self {
        self.push(Write::SetMemberCount { team_id, count })
    }

    pub fn insert_membership(&mut self, membership: Membership) -> &mut Self {
        self.push(Write::InsertMembership(membership))
    }

    pub fn update_membership(&mut self, membership: Membership) -> &mut Self {
        let expected_version = membership.version();
        self.push(Write::UpdateMembership {
            membership,
            expected_version,
        })
    }

    pub fn insert_invitation(&mut self, invitation: Invitation) -> &mut Self {
        self.push(Write::InsertInvitation(invitation))
    }

    pub fn update_invitation(&mut self, invitation: Invitation) -> &mut Self {
        let expected_version = invitation.version();
        self.push(Write::UpdateInvitation {
            invitation,
            expected_version,
        })
    }

    pub fn append_activity(&mut self, record: ActivityRecord) -> &mut Self {
        self.push(Write::AppendActivity(record))
    }

    pub fn purge_team(&mut self, team_id: TeamId) -> &mut Self {
        self.push(Write::PurgeTeam(team_id))
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}
