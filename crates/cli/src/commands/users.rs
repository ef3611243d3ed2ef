//! User management commands.
//!
//! Acting commands take `--admin <handle>` and run with that admin's
//! permissions; the same checks as the dashboard apply.

use stockroom_core::{UserRole, UserUid};
use stockroom_dashboard::models::UserProfile;
use stockroom_dashboard::services::{NewUserForm, UserAdminService};

use super::{CliError, Context, password_from_env};

fn service(ctx: &Context) -> UserAdminService<'_> {
    UserAdminService::new(
        ctx.backends.identity.as_ref(),
        ctx.backends.store.as_ref(),
    )
}

fn parse_role(role: &str) -> Result<UserRole, CliError> {
    role.parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))
}

fn log_profile(profile: &UserProfile) {
    tracing::info!(
        "  {} <{}> {} ({}) uid={}",
        profile.username,
        profile.email,
        profile.name,
        profile.role,
        profile.uid
    );
}

/// Create the first admin.
///
/// # Errors
///
/// Fails if an admin already exists, the password is missing, or the
/// input is invalid.
pub async fn bootstrap(
    ctx: &Context,
    username: String,
    name: String,
    email: String,
) -> Result<UserUid, CliError> {
    let form = NewUserForm {
        username,
        name,
        email,
        password: password_from_env()?,
        role: UserRole::Admin,
    };

    tracing::info!("Creating first admin: {}", form.username);
    let profile = service(ctx).bootstrap_admin(form).await?;

    tracing::info!("Admin created successfully!");
    log_profile(&profile);
    Ok(profile.uid)
}

/// List all users.
///
/// # Errors
///
/// Fails if the acting user is unknown or not an admin.
pub async fn list(ctx: &Context, admin: &str) -> Result<(), CliError> {
    let admin = ctx.profile(admin).await?;
    let users = service(ctx).list_users(&admin).await?;

    tracing::info!("{} user(s):", users.len());
    for profile in &users {
        log_profile(profile);
    }
    Ok(())
}

/// Create a user.
///
/// # Errors
///
/// Fails if the acting user is not an admin, the password is missing, the
/// role is unknown, or the handle or email is already in use.
pub async fn create(
    ctx: &Context,
    admin: &str,
    username: String,
    name: String,
    email: String,
    role: &str,
) -> Result<UserUid, CliError> {
    let role = parse_role(role)?;
    let admin = ctx.profile(admin).await?;
    let form = NewUserForm {
        username,
        name,
        email,
        password: password_from_env()?,
        role,
    };

    let profile = service(ctx).create_user(&admin, form).await?;

    tracing::info!("User created successfully!");
    log_profile(&profile);
    Ok(profile.uid)
}

/// Change a user's role.
///
/// # Errors
///
/// Fails if either user is unknown, the role is invalid, or the change is
/// refused.
pub async fn set_role(ctx: &Context, admin: &str, username: &str, role: &str) -> Result<(), CliError> {
    let role = parse_role(role)?;
    let admin = ctx.profile(admin).await?;
    let target = ctx.profile(username).await?;

    let profile = service(ctx).set_role(&admin, &target.uid, role).await?;

    tracing::info!("Role updated:");
    log_profile(&profile);
    Ok(())
}

/// Delete a user's profile.
///
/// # Errors
///
/// Fails if either user is unknown or the deletion is refused.
pub async fn delete(ctx: &Context, admin: &str, username: &str) -> Result<(), CliError> {
    let admin = ctx.profile(admin).await?;
    let target = ctx.profile(username).await?;

    service(ctx).delete_profile(&admin, &target.uid).await?;

    tracing::info!("Deleted profile for {} (uid={})", target.username, target.uid);
    tracing::warn!("The identity account still exists; remove it in the provider console if needed.");
    Ok(())
}
