//! This module stores the expected format of the arguments for the requests.
//! Args holding a password are not [`serde::Serialize`] on purpose, the client
//! builds the body by hand so the secret is only exposed at that point

use crate::{errors::ConversionError, id::UserId, uac::DisplayName};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

#[derive(serde::Deserialize, Clone)]
pub struct LoginReqArgs {
    pub email: String,
    pub password: SecretString,
}

#[derive(serde::Deserialize, Clone)]
pub struct RegisterReqArgs {
    pub name: DisplayName,
    pub email: String,
    pub password: SecretString,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReqArgs {
    pub user_id: UserId,
}

impl LoginReqArgs {
    pub fn new<S: Into<String>>(email: S, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    pub fn email(mut self, email: String) -> Self {
        self.email = email;
        self
    }

    pub fn password(mut self, password: SecretString) -> Self {
        self.password = password;
        self
    }
}

impl RegisterReqArgs {
    pub fn new<S: Into<String>>(
        name: S,
        email: S,
        password: SecretString,
    ) -> Result<Self, ConversionError> {
        Ok(Self {
            name: name.into().try_into()?,
            email: email.into(),
            password,
            phone: None,
        })
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }
}

impl Debug for LoginReqArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginReqArgs")
            .field("email", &self.email)
            .field("has_password", &!self.password.expose_secret().is_empty())
            .finish()
    }
}

impl Debug for RegisterReqArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterReqArgs")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("has_password", &!self.password.expose_secret().is_empty())
            .field("phone", &self.phone)
            .finish()
    }
}
