//! Input validation done before a request is sent.

use bookswap_types::api::{CreateProductRequest, LoginRequest, RegisterRequest};
use bookswap_types::models::{Category, UnknownCategory};

use crate::error::ClientError;

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterRequest, ClientError> {
        require(&self.name, "Name")?;
        require(&self.email, "Email")?;
        require(&self.password, "Password")?;
        if self.password != self.confirm_password {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        Ok(RegisterRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ClientError> {
        require(&self.email, "Email")?;
        require(&self.password, "Password")?;
        Ok(LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// New listing. `image` is the path returned by an earlier upload, if any.
#[derive(Debug, Clone)]
pub struct ListingForm {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub category: String,
}

impl Default for ListingForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            image: None,
            category: Category::ALL[0].code().to_string(),
        }
    }
}

impl ListingForm {
    pub fn validate(&self) -> Result<CreateProductRequest, ClientError> {
        require(&self.name, "Name")?;
        let category: Category = self
            .category
            .parse()
            .map_err(|e: UnknownCategory| ClientError::Validation(e.to_string()))?;
        Ok(CreateProductRequest {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            image: self.image.clone().unwrap_or_default(),
            category: category.code().to_string(),
        })
    }
}

/// Text to send from a chat box, or `None` when there is nothing to send.
pub fn chat_input(raw: &str) -> Option<&str> {
    let text = raw.trim();
    (!text.is_empty()).then_some(text)
}

fn require(value: &str, field: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ClientError) -> String {
        match err {
            ClientError::Validation(msg) => msg,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn register_needs_matching_passwords() {
        let mut form = RegisterForm {
            name: "Alice".into(),
            email: " alice@campus.test ".into(),
            password: "hunter2".into(),
            confirm_password: "hunter3".into(),
        };
        assert_eq!(message(form.validate().unwrap_err()), "Passwords do not match");

        form.confirm_password = "hunter2".into();
        let req = form.validate().unwrap();
        assert_eq!(req.email, "alice@campus.test");
    }

    #[test]
    fn register_needs_every_field() {
        let form = RegisterForm {
            name: "  ".into(),
            ..Default::default()
        };
        assert_eq!(message(form.validate().unwrap_err()), "Name is required");
        assert!(LoginForm::default().validate().is_err());
    }

    #[test]
    fn listing_category_must_be_known() {
        let mut form = ListingForm {
            name: "Linear Algebra".into(),
            category: "XX".into(),
            ..Default::default()
        };
        assert!(form.validate().is_err());

        form.category = "RB".into();
        let req = form.validate().unwrap();
        assert_eq!(req.category, "RB");
        assert_eq!(req.image, "");
    }

    #[test]
    fn blank_chat_is_not_sent() {
        assert_eq!(chat_input("   \n"), None);
        assert_eq!(chat_input(" hi "), Some("hi"));
    }
}
