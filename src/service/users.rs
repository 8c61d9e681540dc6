use chrono::Utc;

use super::{
    validate_email, validate_length, validate_phone, validate_text, validate_url, SocialService,
};
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, CredentialType, LoginRequest, RegisterRequest, User};

fn validate_credential(credential_type: CredentialType, value: &str) -> AppResult<()> {
    match credential_type {
        CredentialType::Email => validate_email(value),
        CredentialType::Phone => validate_phone(value),
    }
}

impl SocialService {
    // ==================== User Operations ====================

    pub fn register(&self, req: &RegisterRequest) -> AppResult<AuthResponse> {
        validate_credential(req.credential_type, &req.credential_value)?;
        validate_length("name", &req.name, 5, 50)?;
        validate_text("name", &req.name)?;
        validate_length("password", &req.password, 5, 15)?;

        let (email, phone) = match req.credential_type {
            CredentialType::Email => (Some(req.credential_value.clone()), None),
            CredentialType::Phone => (None, Some(req.credential_value.clone())),
        };

        let mut user = User {
            id: String::new(),
            name: req.name.clone(),
            email,
            phone,
            password_hash: self.auth.hash_password(&req.password)?,
            image_url: String::new(),
            friend_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.create_user(&mut user)?;
        log::info!("user {} registered", user.id);

        self.auth_response(user)
    }

    pub fn login(&self, req: &LoginRequest) -> AppResult<AuthResponse> {
        validate_credential(req.credential_type, &req.credential_value)?;

        let user = self
            .store
            .find_user_by_credential(req.credential_type, &req.credential_value)?;
        if !self.auth.verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::validation("password not match"));
        }

        log::debug!("user {} logged in", user.id);
        self.auth_response(user)
    }

    pub fn link_email(&self, user_id: &str, email: &str) -> AppResult<User> {
        validate_email(email)?;
        self.link_credential(user_id, CredentialType::Email, email)
    }

    pub fn link_phone(&self, user_id: &str, phone: &str) -> AppResult<User> {
        validate_phone(phone)?;
        self.link_credential(user_id, CredentialType::Phone, phone)
    }

    fn link_credential(
        &self,
        user_id: &str,
        credential_type: CredentialType,
        value: &str,
    ) -> AppResult<User> {
        let user = self.store.get_user(user_id)?;
        let (already_linked, label) = match credential_type {
            CredentialType::Email => (user.email.is_some(), "email"),
            CredentialType::Phone => (user.phone.is_some(), "phone"),
        };
        if already_linked {
            return Err(AppError::validation(format!("{} already linked", label)));
        }

        self.store.set_credential(user_id, credential_type, value)?;
        log::info!("user {} linked {}", user_id, label);
        Ok(self.store.get_user(user_id)?)
    }

    pub fn update_account(&self, user_id: &str, name: &str, image_url: &str) -> AppResult<User> {
        validate_length("name", name, 5, 50)?;
        validate_text("name", name)?;
        validate_url(image_url)?;
        validate_text("imageUrl", image_url)?;

        self.store.update_profile(user_id, name, image_url)?;
        Ok(self.store.get_user(user_id)?)
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<User> {
        Ok(self.store.get_user(user_id)?)
    }

    fn auth_response(&self, user: User) -> AppResult<AuthResponse> {
        let access_token = self.auth.generate_token(&user.id, &user.name)?;
        Ok(AuthResponse {
            email: user.email.unwrap_or_default(),
            phone: user.phone.unwrap_or_default(),
            name: user.name,
            access_token,
        })
    }
}
