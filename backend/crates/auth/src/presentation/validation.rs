//! Request validation
//!
//! Turns raw request DTOs into use-case inputs, collecting one field error
//! per offending field instead of stopping at the first.

use kernel::error::field::{FieldError, FieldErrors};
use platform::password::ClearTextPassword;

use crate::application::{SignInInput, SignUpInput};
use crate::domain::value_object::{
    display_name::DisplayName, email::Email, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{SignInRequest, SignUpRequest};

pub fn validate_sign_up(req: SignUpRequest) -> AuthResult<SignUpInput> {
    let mut errors = FieldErrors::new();

    let name = required(&mut errors, "name", req.name)
        .and_then(|name| errors.capture("name", DisplayName::new(&name)));

    let email = required(&mut errors, "email", req.email)
        .and_then(|email| errors.capture("email", Email::new(email)));

    let password = required(&mut errors, "password", req.password)
        .and_then(|password| errors.capture("password", ClearTextPassword::new(password)));

    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") => Some(UserRole::User),
        Some(code) => {
            let role = UserRole::from_code(code);
            if role.is_none() {
                errors.push(FieldError::new("role", "Role must be 'user' or 'admin'"));
            }
            role
        }
    };

    match (name, email, password, role) {
        (Some(name), Some(email), Some(password), Some(role)) if errors.is_empty() => {
            Ok(SignUpInput {
                name,
                email,
                password,
                role,
            })
        }
        _ => Err(AuthError::Validation(errors.into_vec())),
    }
}

/// Sign in only checks shape; policy is not re-applied to existing passwords
pub fn validate_sign_in(req: SignInRequest) -> AuthResult<SignInInput> {
    let mut errors = FieldErrors::new();

    let email = required(&mut errors, "email", req.email)
        .and_then(|email| errors.capture("email", Email::new(email)));

    let password = required(&mut errors, "password", req.password).map(ClearTextPassword::candidate);

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(SignInInput { email, password }),
        _ => Err(AuthError::Validation(errors.into_vec())),
    }
}

/// Missing and blank values are both "required"
fn required(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<String>,
) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.push(FieldError::required(field));
            None
        }
    }
}
