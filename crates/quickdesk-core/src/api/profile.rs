//! The caller's own profile and notification preferences, and first
//! sign-in provisioning.

use serde_json::Value;

use super::NoArgs;
use crate::error::{DeskError, Result};
use crate::function::{AuthContext, DeskServices, MutationContext, QueryContext};
use crate::model::{NewProfile, NotificationSettings, Profile, ProfileUpdate};
use crate::validation;

desk_query!(
    GetSession,
    "get_session",
    "The caller's profile",
    NoArgs => Profile,
    get_session
);

desk_query!(
    GetNotificationSettings,
    "get_notification_settings",
    "The caller's notification preferences",
    NoArgs => NotificationSettings,
    get_notification_settings
);

desk_mutation!(
    UpdateProfile,
    "update_profile",
    "Change the caller's name or e-mail",
    ProfileUpdate => Profile,
    update_profile
);

desk_mutation!(
    /// Takes a partial object; keys left out keep their current value.
    UpdateNotificationSettings,
    "update_notification_settings",
    "Change some of the caller's notification preferences",
    Value => NotificationSettings,
    update_notification_settings
);

desk_mutation!(
    ResetNotificationSettings,
    "reset_notification_settings",
    "Turn every notification back on",
    NoArgs => NotificationSettings,
    reset_notification_settings
);

/// Load the caller's profile, creating an end-user profile from the token
/// on first sign-in.
pub async fn ensure_profile(services: &DeskServices, auth: &AuthContext) -> Result<Profile> {
    let user_id = auth.require_user_id()?;
    if let Some(profile) = services.store.get_profile(user_id).await? {
        return Ok(profile);
    }

    let settings = services.store.load_settings().await?;
    if !settings.allow_registration {
        return Err(DeskError::forbidden("Registration is closed"));
    }
    let email = auth
        .email()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| DeskError::Unauthorized("Token carries no e-mail address".into()))?
        .trim()
        .to_string();
    let full_name = auth
        .claim("user_metadata")
        .and_then(|meta| meta.get("full_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

    let new_profile = NewProfile {
        id: user_id,
        full_name,
        email,
    };
    let profile = match services.store.create_profile(new_profile).await {
        Ok(profile) => profile,
        // Another request provisioned it first.
        Err(DeskError::Conflict(_)) => services
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| DeskError::Internal(format!("Profile {} vanished", user_id)))?,
        Err(e) => return Err(e),
    };
    tracing::info!(user_id = %profile.id, email = %profile.email, "Profile provisioned");

    services.notifier.welcome(&profile).await;
    Ok(profile)
}

async fn get_session(ctx: &QueryContext, _: NoArgs) -> Result<Profile> {
    Ok(ctx.viewer().clone())
}

async fn get_notification_settings(ctx: &QueryContext, _: NoArgs) -> Result<NotificationSettings> {
    Ok(ctx.viewer().notification_settings)
}

async fn update_profile(ctx: &MutationContext, update: ProfileUpdate) -> Result<Profile> {
    let full_name = match update.full_name {
        Some(name) if name.trim().is_empty() => {
            return Err(DeskError::Validation("Full name cannot be empty".into()))
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let email = update.email.as_deref().map(validation::email).transpose()?;

    let profile = ctx
        .store()
        .update_profile(ctx.viewer().id, ProfileUpdate { full_name, email })
        .await?;
    tracing::info!(user_id = %profile.id, "Profile updated");
    Ok(profile)
}

async fn update_notification_settings(ctx: &MutationContext, patch: Value) -> Result<NotificationSettings> {
    let settings = ctx.viewer().notification_settings.merged(&patch)?;
    let profile = ctx
        .store()
        .update_notification_settings(ctx.viewer().id, settings)
        .await?;
    Ok(profile.notification_settings)
}

async fn reset_notification_settings(ctx: &MutationContext, _: NoArgs) -> Result<NotificationSettings> {
    let profile = ctx
        .store()
        .update_notification_settings(ctx.viewer().id, NotificationSettings::default())
        .await?;
    Ok(profile.notification_settings)
}
