//! Input schemas for the account commands.

use keel_bus::Command;
use keel_middleware::{FieldRule, ObjectSchema, ValidationMiddleware};

use crate::commands::{ChangePassword, DeactivateUser, RegisterUser, UpdateProfile};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

/// Register a schema for every account command on `validation`.
pub fn install_schemas(validation: &ValidationMiddleware) {
    validation.register_schema(
        RegisterUser::NAME,
        ObjectSchema::new()
            .field("email", FieldRule::string().required().non_empty().email())
            .field(
                "displayName",
                FieldRule::string()
                    .required()
                    .non_empty()
                    .max_len(MAX_DISPLAY_NAME_LEN),
            )
            .field(
                "password",
                FieldRule::string().required().min_len(MIN_PASSWORD_LEN),
            ),
    );

    validation.register_schema(
        UpdateProfile::NAME,
        ObjectSchema::new()
            .field("userId", FieldRule::string().required().non_empty())
            .field("email", FieldRule::string().non_empty().email())
            .field(
                "displayName",
                FieldRule::string().non_empty().max_len(MAX_DISPLAY_NAME_LEN),
            )
            .deny_unknown_fields(),
    );

    validation.register_schema(
        ChangePassword::NAME,
        ObjectSchema::new()
            .field("userId", FieldRule::string().required().non_empty())
            .field("currentPassword", FieldRule::string().required().non_empty())
            .field(
                "newPassword",
                FieldRule::string().required().min_len(MIN_PASSWORD_LEN),
            ),
    );

    validation.register_schema(
        DeactivateUser::NAME,
        ObjectSchema::new()
            .field("userId", FieldRule::string().required().non_empty())
            .field("reason", FieldRule::string().max_len(500)),
    );
}
