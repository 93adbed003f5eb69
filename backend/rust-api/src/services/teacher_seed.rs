use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::{
    bson::{self, doc, Document},
    Database,
};

use super::user_service::{hash_password, normalize_email, UserService};
use crate::config::Config;
use crate::models::user::{User, UserRole};

/// Creates the configured teacher account on first start; existing accounts are left untouched
pub async fn bootstrap(config: &Config, mongo: &Database) -> Result<()> {
    let Some(seed) = config.seed_teacher.as_ref() else {
        tracing::debug!("No seed teacher configured, skipping bootstrap");
        return Ok(());
    };

    let email = normalize_email(&seed.email);
    let users = UserService::new(mongo.clone());
    if users.email_exists(&email).await? {
        tracing::info!("Seed teacher already exists, seed skipped");
        return Ok(());
    }

    let now = Utc::now();
    let user = User {
        id: None,
        user_id: Some(users.unique_user_id(&seed.name).await?),
        username: Some(users.unique_username(&email).await?),
        name: seed.name.clone(),
        email: email.clone(),
        password_hash: hash_password(&seed.password).await?,
        role: UserRole::Teacher,
        phone: String::new(),
        generated_password: String::new(),
        university: String::new(),
        department: String::new(),
        academic_year: String::new(),
        participation_type: String::new(),
        previous_participation: String::new(),
        technical_skills: String::new(),
        created_at: now,
        updated_at: now,
    };
    let document: Document =
        bson::to_document(&user).context("Failed to encode seed teacher")?;

    let update = mongo
        .collection::<Document>(User::COLLECTION)
        .update_one(doc! { "email": &email }, doc! { "$setOnInsert": document })
        .upsert(true)
        .await
        .context("Failed to insert seed teacher")?;

    if update.upserted_id.is_some() {
        tracing::info!(email = %email, "Seed teacher inserted");
    } else {
        tracing::info!("Seed teacher already exists, seed skipped");
    }
    Ok(())
}
