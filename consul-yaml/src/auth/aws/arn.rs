use percent_encoding::utf8_percent_encode;
use std::fmt;

use crate::error::{AuthError, AuthResult};
use crate::QUERY_ENCODE_SET;

/// API version of the IAM query protocol
const IAM_API_VERSION: &str = "2010-05-08";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    User,
    Role,
    AssumedRole,
    InstanceProfile,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::User => "user",
            EntityType::Role => "role",
            EntityType::AssumedRole => "assumed-role",
            EntityType::InstanceProfile => "instance-profile",
        };
        f.write_str(name)
    }
}

/// IAM principal identified by an ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamEntity {
    pub partition: String,
    pub account_id: String,
    pub entity_type: EntityType,
    pub path: String,
    pub friendly_name: String,
    /// Session name, for assumed roles only
    pub session_name: String,
}

/// Parse a caller ARN such as `arn:aws:iam::123456789012:user/path/name` or
/// `arn:aws:sts::123456789012:assumed-role/RoleName/session`
pub fn parse_arn(arn: &str) -> AuthResult<IamEntity> {
    let parts: Vec<&str> = arn.split(':').collect();
    if parts.len() != 6 {
        return Err(AuthError::credentials(format!(
            "unrecognized arn: contains {} colon-separated parts, expected 6",
            parts.len()
        )));
    }
    if parts[0] != "arn" {
        return Err(AuthError::credentials(
            "unrecognized arn: does not begin with \"arn:\"",
        ));
    }
    if parts[1].is_empty() {
        return Err(AuthError::credentials(format!(
            "unrecognized arn: {:?} is missing the partition",
            arn
        )));
    }
    if parts[2] != "iam" && parts[2] != "sts" {
        return Err(AuthError::credentials(format!(
            "unrecognized service {:?}, not one of iam or sts",
            parts[2]
        )));
    }
    if parts[4].is_empty() {
        return Err(AuthError::credentials(format!(
            "unrecognized arn: {:?} is missing the account number",
            arn
        )));
    }

    let resource: Vec<&str> = parts[5].split('/').collect();
    if resource.len() < 2 {
        return Err(AuthError::credentials(format!(
            "unrecognized arn: {:?} contains fewer than 2 slash-separated parts",
            parts[5]
        )));
    }

    let entity_type = match resource[0] {
        "user" => EntityType::User,
        "role" => EntityType::Role,
        "assumed-role" => EntityType::AssumedRole,
        "instance-profile" => EntityType::InstanceProfile,
        other => {
            return Err(AuthError::credentials(format!(
                "unrecognized principal type: {:?}",
                other
            )))
        }
    };

    let mut entity = IamEntity {
        partition: parts[1].to_string(),
        account_id: parts[4].to_string(),
        entity_type,
        path: resource[1..resource.len() - 1].join("/"),
        friendly_name: resource[resource.len() - 1].to_string(),
        session_name: String::new(),
    };

    // Assumed roles have no path: assumed-role/<RoleName>/<RoleSessionName>
    if entity_type == EntityType::AssumedRole {
        if resource.len() < 3 {
            return Err(AuthError::credentials(format!(
                "unrecognized arn: {:?} contains fewer than 3 slash-separated parts",
                parts[5]
            )));
        }
        entity.path = String::new();
        entity.friendly_name = resource[1].to_string();
        entity.session_name = resource[2].to_string();
    }

    Ok(entity)
}

impl IamEntity {
    /// Query-protocol body of the `iam:GetRole` or `iam:GetUser` call that
    /// fetches this entity
    pub fn get_entity_body(&self) -> AuthResult<String> {
        let name = utf8_percent_encode(&self.friendly_name, QUERY_ENCODE_SET);
        match self.entity_type {
            EntityType::Role | EntityType::AssumedRole => Ok(format!(
                "Action=GetRole&RoleName={}&Version={}",
                name, IAM_API_VERSION
            )),
            EntityType::User => Ok(format!(
                "Action=GetUser&UserName={}&Version={}",
                name, IAM_API_VERSION
            )),
            EntityType::InstanceProfile => Err(AuthError::credentials(format!(
                "entity {} is not an IAM role or IAM user",
                self.entity_type
            ))),
        }
    }
}
