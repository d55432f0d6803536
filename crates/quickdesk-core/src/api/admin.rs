//! Admin functions: users, categories and desk settings.
//!
//! Every function here is registered with `required_role = admin`, which
//! the runtime checks before execution. Each also checks again so direct
//! callers get the same answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NoArgs;
use crate::access;
use crate::error::{DeskError, Result};
use crate::function::{MutationContext, QueryContext};
use crate::model::{Category, CategoryInput, CategoryWithCount, DeskSettings, Profile, ProfileUpdate, Role};
use crate::stats::{self, SystemStats};
use crate::validation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEdit {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub update: ProfileUpdate,
    /// Optional role change applied with the edit.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEdit {
    pub category_id: Uuid,
    #[serde(flatten)]
    pub input: CategoryInput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryRef {
    pub category_id: Uuid,
}

desk_query!(ListUsers, "list_users", "Every profile", NoArgs => Vec<Profile>, list_users, admin);

desk_query!(
    ListAllCategories,
    "list_all_categories",
    "Every category with its ticket count",
    NoArgs => Vec<CategoryWithCount>,
    list_all_categories,
    admin
);

desk_query!(GetSettings, "get_settings", "Desk settings", NoArgs => DeskSettings, get_settings, admin);

desk_query!(
    GetSystemStats,
    "system_stats",
    "User, ticket and category totals",
    NoArgs => SystemStats,
    system_stats,
    admin
);

desk_mutation!(
    UpdateUserRole,
    "update_user_role",
    "Change a user's role",
    RoleChange => Profile,
    update_user_role,
    admin
);

desk_mutation!(
    UpdateUser,
    "update_user",
    "Edit another user's profile",
    UserEdit => Profile,
    update_user,
    admin
);

desk_mutation!(
    CreateCategory,
    "create_category",
    "Add a category",
    CategoryInput => Category,
    create_category,
    admin
);

desk_mutation!(
    UpdateCategory,
    "update_category",
    "Rename or recolour a category",
    CategoryEdit => Category,
    update_category,
    admin
);

desk_mutation!(
    ToggleCategory,
    "toggle_category",
    "Activate or deactivate a category",
    CategoryRef => Category,
    toggle_category,
    admin
);

desk_mutation!(
    DeleteCategory,
    "delete_category",
    "Delete a category no ticket uses",
    CategoryRef => (),
    delete_category,
    admin
);

desk_mutation!(
    UpdateSettings,
    "update_settings",
    "Replace the desk settings",
    DeskSettings => DeskSettings,
    update_settings,
    admin
);

async fn list_users(ctx: &QueryContext, _: NoArgs) -> Result<Vec<Profile>> {
    access::require_admin(ctx.viewer())?;
    ctx.store().list_profiles().await
}

async fn list_all_categories(ctx: &QueryContext, _: NoArgs) -> Result<Vec<CategoryWithCount>> {
    access::require_admin(ctx.viewer())?;
    ctx.store().list_categories_with_counts().await
}

async fn get_settings(ctx: &QueryContext, _: NoArgs) -> Result<DeskSettings> {
    access::require_admin(ctx.viewer())?;
    ctx.store().load_settings().await
}

async fn system_stats(ctx: &QueryContext, _: NoArgs) -> Result<SystemStats> {
    access::require_admin(ctx.viewer())?;
    stats::system_stats(ctx.store()).await
}

async fn change_role(ctx: &MutationContext, user_id: Uuid, role: Role) -> Result<Profile> {
    if user_id == ctx.viewer().id && role != ctx.viewer().role {
        return Err(DeskError::Validation("You cannot change your own role".into()));
    }
    let profile = ctx.store().update_role(user_id, role).await?;
    tracing::info!(user_id = %user_id, role = %role, by = %ctx.viewer().id, "User role changed");
    Ok(profile)
}

async fn update_user_role(ctx: &MutationContext, args: RoleChange) -> Result<Profile> {
    access::require_admin(ctx.viewer())?;
    change_role(ctx, args.user_id, args.role).await
}

async fn update_user(ctx: &MutationContext, args: UserEdit) -> Result<Profile> {
    access::require_admin(ctx.viewer())?;
    let full_name = match args.update.full_name {
        Some(name) if name.trim().is_empty() => {
            return Err(DeskError::Validation("Full name cannot be empty".into()))
        }
        other => other.map(|n| n.trim().to_string()),
    };
    let email = args.update.email.as_deref().map(validation::email).transpose()?;

    let mut profile = ctx
        .store()
        .update_profile(args.user_id, ProfileUpdate { full_name, email })
        .await?;
    if let Some(role) = args.role.filter(|r| *r != profile.role) {
        profile = change_role(ctx, args.user_id, role).await?;
    }
    tracing::info!(user_id = %profile.id, by = %ctx.viewer().id, "User updated");
    Ok(profile)
}

async fn create_category(ctx: &MutationContext, input: CategoryInput) -> Result<Category> {
    access::require_admin(ctx.viewer())?;
    let input = validation::category_input(input)?;
    let category = ctx.store().create_category(input).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "Category created");
    Ok(category)
}

async fn update_category(ctx: &MutationContext, args: CategoryEdit) -> Result<Category> {
    access::require_admin(ctx.viewer())?;
    let input = validation::category_input(args.input)?;
    let category = ctx.store().update_category(args.category_id, input).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "Category updated");
    Ok(category)
}

async fn toggle_category(ctx: &MutationContext, args: CategoryRef) -> Result<Category> {
    access::require_admin(ctx.viewer())?;
    let current = ctx
        .store()
        .get_category(args.category_id)
        .await?
        .ok_or_else(|| DeskError::NotFound(format!("Category {} not found", args.category_id)))?;
    let category = ctx
        .store()
        .set_category_active(current.id, !current.is_active)
        .await?;
    tracing::info!(category_id = %category.id, active = category.is_active, "Category toggled");
    Ok(category)
}

async fn delete_category(ctx: &MutationContext, args: CategoryRef) -> Result<()> {
    access::require_admin(ctx.viewer())?;
    ctx.store().delete_category(args.category_id).await?;
    tracing::info!(category_id = %args.category_id, "Category deleted");
    Ok(())
}

async fn update_settings(ctx: &MutationContext, settings: DeskSettings) -> Result<DeskSettings> {
    access::require_admin(ctx.viewer())?;
    validation::settings(&settings)?;
    let mut settings = settings;
    for ext in settings.allowed_file_types.iter_mut() {
        *ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    }
    settings.allowed_file_types.retain(|ext| !ext.is_empty());

    ctx.store().save_settings(&settings).await?;
    tracing::info!(by = %ctx.viewer().id, "Desk settings updated");
    Ok(settings)
}
