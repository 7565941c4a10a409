use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::api::NewUser;
use crate::cli::{print_object, App, FavoriteCommand, NotificationCommand, UserCommand};
use crate::error::SyncError;
use crate::models::{Notification, User};

pub async fn favorite(app: &App, command: FavoriteCommand, remote: bool) -> Result<()> {
    if remote {
        let api = app.api()?;
        match command {
            FavoriteCommand::Add { user, object } => {
                api.add_favorite(user, object).await?;
                println!("⭐ Added #{object} to favorites of user #{user}");
            }
            FavoriteCommand::Remove { user, object } => {
                let reply = api.remove_favorite(user, object).await?;
                println!("{}", reply.message);
            }
            FavoriteCommand::List { user } => {
                let favorites = api.get_favorites(user).await?;
                if favorites.is_empty() {
                    println!("No favorites.");
                }
                for favorite in favorites {
                    match api.get_object(favorite.object_id).await {
                        Ok(object) => print_object(&object.into_object()),
                        Err(e) => println!("#{} (unavailable: {e:#})", favorite.object_id),
                    }
                }
            }
        }
        return Ok(());
    }

    let mut store = app.store.load().await?;
    match command {
        FavoriteCommand::Add { user, object } => {
            if store.add_favorite(user, object, Utc::now())? {
                app.store.save(&store).await?;
                println!("⭐ Added #{object} to favorites of user #{user}");
            } else {
                println!("#{object} is already a favorite of user #{user}");
            }
        }
        FavoriteCommand::Remove { user, object } => {
            store.remove_favorite(user, object)?;
            app.store.save(&store).await?;
            println!("Removed #{object} from favorites of user #{user}");
        }
        FavoriteCommand::List { user } => {
            let favorites = store.favorites_of(user);
            if favorites.is_empty() {
                println!("No favorites.");
            }
            for object in favorites {
                print_object(object);
            }
        }
    }
    Ok(())
}

fn print_notification(n: &Notification) {
    let marker = if n.is_read { " " } else { "•" };
    let when = n
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!("{marker} #{} [{}] {} {}", n.id, n.kind, when, n.title);
    println!("   {}", n.message);
}

pub async fn notifications(app: &App, command: NotificationCommand, remote: bool) -> Result<()> {
    if remote {
        let api = app.api()?;
        match command {
            NotificationCommand::List { user } => {
                let mut list = api.get_notifications(user).await?;
                list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                if list.is_empty() {
                    println!("No notifications.");
                }
                list.iter().for_each(print_notification);
            }
            NotificationCommand::Read { id } => {
                api.mark_notification_read(id).await?;
                println!("Notification #{id} marked as read");
            }
        }
        return Ok(());
    }

    let mut store = app.store.load().await?;
    match command {
        NotificationCommand::List { user } => {
            let list = store.notifications_for(user);
            if list.is_empty() {
                println!("No notifications.");
            }
            for n in list {
                print_notification(n);
            }
        }
        NotificationCommand::Read { id } => {
            store.mark_read(id)?;
            app.store.save(&store).await?;
            println!("Notification #{id} marked as read");
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    let admin = if user.is_admin() { ", admin" } else { "" };
    let notify = if user.notify_new_objects { ", notified" } else { "" };
    println!(
        "#{} {} <{}> ({}{}{})",
        user.id,
        user.name,
        user.email,
        user.role.as_str(),
        admin,
        notify
    );
}

pub async fn user(app: &App, command: UserCommand, remote: bool) -> Result<()> {
    if remote {
        let api = app.api()?;
        match command {
            UserCommand::Add { email, name, role, notify } => {
                let id = api.create_user(&NewUser { email, name, role }).await?;
                if notify {
                    api.update_user(id, None, Some(true)).await?;
                }
                println!("User #{id}");
            }
            UserCommand::List => {
                for user in api.get_users().await? {
                    print_user(&user);
                }
            }
            UserCommand::Notify { id, enabled } => {
                let user = api.update_user(id, None, Some(enabled)).await?;
                print_user(&user);
            }
        }
        return Ok(());
    }

    let mut store = app.store.load().await?;
    match command {
        UserCommand::Add { email, name, role, notify } => {
            let id = store.add_user(&email, &name, role, notify, Utc::now());
            app.store.save(&store).await?;
            info!("User {} stored as #{}", email, id);
            println!("User #{id}");
        }
        UserCommand::List => {
            if store.users.is_empty() {
                println!("No users.");
            }
            store.users.iter().for_each(print_user);
        }
        UserCommand::Notify { id, enabled } => {
            store.set_notify(id, enabled)?;
            app.store.save(&store).await?;
            let user = store.user(id).ok_or(SyncError::UserNotFound(id))?;
            print_user(user);
        }
    }
    Ok(())
}
