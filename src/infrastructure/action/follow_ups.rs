//! Post-commit sub-actions: notifications and deferred setup
//!
//! Builders here capture owned clones of the collaborators they need so the
//! returned `SubAction`s can outlive the pipeline run when side effects are
//! detached.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::action::SubAction;
use crate::domain::cache::CacheTag;
use crate::domain::ids::TeamId;
use crate::domain::invitation::Invitation;
use crate::domain::notification::{Notification, NotificationKind, Recipient};
use crate::domain::principal::PrincipalRef;
use crate::domain::store::ChangeSet;
use crate::domain::DomainError;

use super::pipeline::ActionEnv;

pub(crate) fn notifications_enabled(env: &ActionEnv) -> bool {
    env.config.features.notifications
}

/// Notifies specific principals
pub(crate) fn notify_principals(
    env: &ActionEnv,
    name: &str,
    kind: NotificationKind,
    team_id: TeamId,
    principals: Vec<PrincipalRef>,
    payload: Value,
) -> SubAction {
    let notifier = env.notifier.clone();
    SubAction::new(name, move || async move {
        let recipients = principals.into_iter().map(Recipient::Principal).collect();
        notifier
            .notify(Notification::new(kind, team_id, recipients, payload))
            .await
    })
}

/// Notifies every active member of the team as of when the sub-action runs
pub(crate) fn notify_team_members(
    env: &ActionEnv,
    kind: NotificationKind,
    team_id: TeamId,
    payload: Value,
) -> SubAction {
    let store = env.store.clone();
    let notifier = env.notifier.clone();
    SubAction::new("notify_team_members", move || async move {
        let recipients: Vec<Recipient> = store
            .list_memberships(&team_id)
            .await?
            .into_iter()
            .filter(|m| m.is_active())
            .map(|m| Recipient::Principal(m.user().clone()))
            .collect();

        if recipients.is_empty() {
            debug!(team_id = %team_id, "No active members to notify");
            return Ok(());
        }

        notifier
            .notify(Notification::new(kind, team_id, recipients, payload))
            .await
    })
}

/// Fills in the configured default settings a new team does not set itself
pub(crate) fn initialize_team_defaults(env: &ActionEnv, team_id: TeamId, now: DateTime<Utc>) -> SubAction {
    let store = env.store.clone();
    let cache = env.cache.clone();
    let defaults = env.config.default_team_settings();

    SubAction::new("initialize_team_defaults", move || async move {
        let mut team = store
            .find_team(&team_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Team '{}' not found", team_id)))?;
        if !team.fill_default_settings(defaults, now) {
            debug!(team_id = %team_id, "Team defaults already present");
            return Ok(());
        }

        let mut changes = ChangeSet::new();
        changes.update_team(team);
        store.commit(changes).await?;
        cache.invalidate_tags(&[CacheTag::team(&team_id)]).await.map(|_| ())
    })
}

fn invitation_payload(invitation: &Invitation, team_name: &str) -> Value {
    json!({
        "invitation_id": invitation.id(),
        "team_name": team_name,
        "token": invitation.token(),
        "role": invitation.role(),
        "message": invitation.message(),
        "invited_by": invitation.invited_by(),
        "expires_at": invitation.expires_at(),
    })
}

/// Delivers the invitation to its email address. Later sub-actions depend on
/// it, so a failure halts the chain.
pub(crate) fn send_invitation_email(
    env: &ActionEnv,
    invitation: &Invitation,
    team_name: &str,
) -> SubAction {
    let notifier = env.notifier.clone();
    let notification = Notification::new(
        NotificationKind::Invitation,
        *invitation.team_id(),
        vec![Recipient::Email(invitation.email().to_string())],
        invitation_payload(invitation, team_name),
    );

    SubAction::new("send_invitation_email", move || async move {
        notifier.notify(notification).await
    })
    .halt_on_failure()
}

/// Queues a reminder `reminder_after_days` after the last send, provided it
/// would still arrive before the invitation expires
pub(crate) fn schedule_invitation_reminder(
    env: &ActionEnv,
    invitation: &Invitation,
    team_name: &str,
) -> Option<SubAction> {
    let remind_at = invitation.last_sent_at() + env.config.reminder_delay();
    if remind_at >= invitation.expires_at() {
        return None;
    }

    let notifier = env.notifier.clone();
    let notification = Notification::new(
        NotificationKind::InvitationReminder,
        *invitation.team_id(),
        vec![Recipient::Email(invitation.email().to_string())],
        invitation_payload(invitation, team_name),
    )
    .deliver_after(remind_at);

    Some(SubAction::new(
        "schedule_invitation_reminder",
        move || async move { notifier.notify(notification).await },
    ))
}
