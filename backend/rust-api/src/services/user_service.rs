use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Collection, Database,
};

use super::credentials::{
    generate_password, generate_user_id, username_base, username_candidate,
    GENERATED_PASSWORD_LENGTH,
};
use super::{is_duplicate_key, ServiceError};
use crate::models::id_hex;
use crate::models::user::{
    CreateUserRequest, CreatedUser, UpdateProfileRequest, UpdateUserRequest, User,
    UserCredentials, UserProfile, UserRole, UserSummary,
};

/// Upper bound on candidate attempts for generated ids
const MAX_ID_ATTEMPTS: u32 = 50;

/// Everything needed to provision one account
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role: UserRole,
    pub phone: String,
    pub university: String,
    pub department: String,
    pub academic_year: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// bcrypt on the blocking pool; imports hash hundreds of passwords per request
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Password verification task failed")?
        .context("Failed to verify password")
}

pub struct UserService {
    mongo: Database,
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<User> {
        self.mongo.collection::<User>(User::COLLECTION)
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        self.collection()
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to query user")
    }

    pub async fn get_user(&self, id: &ObjectId) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()).into())
    }

    /// Looks the account up by email or by generated user id
    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let login = login.trim();
        self.collection()
            .find_one(doc! {
                "$or": [
                    { "email": normalize_email(login) },
                    { "userId": login },
                ]
            })
            .await
            .context("Failed to query user")
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = self
            .collection()
            .count_documents(doc! { "email": normalize_email(email) })
            .await
            .context("Failed to check existing email")?;
        Ok(count > 0)
    }

    async fn field_taken(&self, field: &str, value: &str) -> Result<bool> {
        let count = self
            .collection()
            .count_documents(doc! { field: value })
            .await
            .with_context(|| format!("Failed to check {} uniqueness", field))?;
        Ok(count > 0)
    }

    pub async fn unique_user_id(&self, name: &str) -> Result<String> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let candidate = generate_user_id(name, attempt);
            if !self.field_taken("userId", &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(anyhow!("Could not generate a unique userId for {}", name))
    }

    pub async fn unique_username(&self, email: &str) -> Result<String> {
        let base = username_base(email);
        for attempt in 0..MAX_ID_ATTEMPTS {
            let candidate = username_candidate(&base, attempt);
            if !self.field_taken("username", &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(anyhow!("Could not generate a unique username for {}", email))
    }

    /// Inserts a new account with generated userId, username and (if absent) password.
    /// The plain password is kept as `generatedPassword` and returned.
    pub async fn provision(&self, account: NewAccount) -> Result<CreatedUser> {
        let email = normalize_email(&account.email);
        if self.email_exists(&email).await? {
            return Err(ServiceError::InvalidInput("User Already Exists".to_string()).into());
        }

        let user_id = self.unique_user_id(&account.name).await?;
        let username = self.unique_username(&email).await?;
        let plain_password = account
            .password
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| generate_password(GENERATED_PASSWORD_LENGTH));
        let password_hash = hash_password(&plain_password).await?;

        let now = Utc::now();
        let mut user = User {
            id: None,
            user_id: Some(user_id),
            username: Some(username),
            name: account.name.trim().to_string(),
            email,
            password_hash,
            role: account.role,
            phone: account.phone.trim().to_string(),
            generated_password: plain_password.clone(),
            university: account.university.trim().to_string(),
            department: account.department.trim().to_string(),
            academic_year: account.academic_year.trim().to_string(),
            participation_type: String::new(),
            previous_participation: String::new(),
            technical_skills: String::new(),
            created_at: now,
            updated_at: now,
        };

        let inserted = match self.collection().insert_one(&user).await {
            Ok(res) => res,
            Err(e) if is_duplicate_key(&e) => {
                return Err(ServiceError::Conflict(format!(
                    "User with email {} or generated id already exists",
                    user.email
                ))
                .into())
            }
            Err(e) => return Err(e).context("Failed to insert user"),
        };
        user.id = inserted.inserted_id.as_object_id();

        tracing::info!(
            user_id = %id_hex(&user.id),
            role = %user.role,
            "User provisioned"
        );

        Ok(CreatedUser {
            id: id_hex(&user.id),
            user_id: user.user_id.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            generated_password: plain_password,
            university: user.university,
            department: user.department,
            academic_year: user.academic_year,
        })
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<CreatedUser> {
        self.provision(NewAccount {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role.unwrap_or_default(),
            phone: req.phone.unwrap_or_default(),
            university: req.university.unwrap_or_default(),
            department: req.department.unwrap_or_default(),
            academic_year: req.academic_year.unwrap_or_default(),
        })
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let users: Vec<User> = self
            .collection()
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to list users")?
            .try_collect()
            .await
            .context("Failed to read users")?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    pub async fn list_credentials(&self) -> Result<Vec<UserCredentials>> {
        let users: Vec<User> = self
            .collection()
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to list users")?
            .try_collect()
            .await
            .context("Failed to read users")?;
        Ok(users.into_iter().map(UserCredentials::from).collect())
    }

    async fn ensure_email_free(&self, email: &str, owner: &ObjectId) -> Result<()> {
        let taken = self
            .collection()
            .count_documents(doc! { "email": email, "_id": { "$ne": owner } })
            .await
            .context("Failed to check existing email")?;
        if taken > 0 {
            return Err(ServiceError::Conflict("Email is already in use".to_string()).into());
        }
        Ok(())
    }

    async fn apply_update(&self, id: &ObjectId, set: Document) -> Result<User> {
        let result = self
            .collection()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(mongodb::options::ReturnDocument::After)
            .await;

        match result {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::NotFound("User not found".to_string()).into()),
            Err(e) if is_duplicate_key(&e) => {
                Err(ServiceError::Conflict("Email is already in use".to_string()).into())
            }
            Err(e) => Err(e).context("Failed to update user"),
        }
    }

    pub async fn update_user(&self, id: &ObjectId, req: UpdateUserRequest) -> Result<UserSummary> {
        // existence first so a missing user is a 404 even for an empty body
        self.get_user(id).await?;

        let mut set = doc! { "updatedAt": mongodb::bson::DateTime::now() };
        if let Some(name) = non_empty(req.name) {
            set.insert("name", name);
        }
        if let Some(email) = non_empty(req.email).map(|e| normalize_email(&e)) {
            self.ensure_email_free(&email, id).await?;
            set.insert("email", email);
        }
        if let Some(role) = req.role {
            set.insert("role", role.as_str());
        }
        if let Some(phone) = non_empty(req.phone) {
            set.insert("phone", phone);
        }
        if let Some(university) = non_empty(req.university) {
            set.insert("university", university);
        }
        if let Some(department) = non_empty(req.department) {
            set.insert("department", department);
        }
        if let Some(academic_year) = non_empty(req.academic_year) {
            set.insert("academicYear", academic_year);
        }
        if let Some(password) = req.password.filter(|p| !p.is_empty()) {
            set.insert("password", hash_password(&password).await?);
            set.insert("generatedPassword", password);
        }

        let user = self.apply_update(id, set).await?;
        tracing::info!(user_id = %id.to_hex(), "User updated");
        Ok(UserSummary::from(user))
    }

    pub async fn delete_user(&self, acting: &ObjectId, target: &ObjectId) -> Result<()> {
        self.get_user(target).await?;
        if acting == target {
            return Err(
                ServiceError::InvalidInput("Cannot delete your own account".to_string()).into(),
            );
        }

        self.collection()
            .delete_one(doc! { "_id": target })
            .await
            .context("Failed to delete user")?;

        tracing::info!(user_id = %target.to_hex(), deleted_by = %acting.to_hex(), "User deleted");
        Ok(())
    }

    /// New random password; stored hashed and as `generatedPassword`
    pub async fn reset_password(&self, id: &ObjectId) -> Result<(User, String)> {
        let password = generate_password(GENERATED_PASSWORD_LENGTH);
        let set = doc! {
            "password": hash_password(&password).await?,
            "generatedPassword": &password,
            "updatedAt": mongodb::bson::DateTime::now(),
        };
        let user = self.apply_update(id, set).await?;
        tracing::info!(user_id = %id.to_hex(), "Credentials reset");
        Ok((user, password))
    }

    pub async fn update_profile(
        &self,
        id: &ObjectId,
        req: UpdateProfileRequest,
    ) -> Result<UserProfile> {
        self.get_user(id).await?;

        let mut set = doc! { "updatedAt": mongodb::bson::DateTime::now() };
        if let Some(name) = non_empty(req.name) {
            set.insert("name", name);
        }
        if let Some(email) = non_empty(req.email).map(|e| normalize_email(&e)) {
            self.ensure_email_free(&email, id).await?;
            set.insert("email", email);
        }
        if let Some(password) = req.password.filter(|p| !p.is_empty()) {
            set.insert("password", hash_password(&password).await?);
        }

        let user = self.apply_update(id, set).await?;
        Ok(UserProfile::from(&user))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_non_empty_trims_and_drops_blank() {
        assert_eq!(non_empty(Some("  x ".into())), Some("x".into()));
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(non_empty(None), None);
    }

    #[tokio::test]
    async fn test_hash_and_verify_password() {
        let hash = hash_password("s3cret!").await.unwrap();
        assert!(verify_password("s3cret!", &hash).await.unwrap());
        assert!(!verify_password("wrong", &hash).await.unwrap());
    }
}
