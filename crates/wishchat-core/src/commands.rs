//! Administrative mutations accepted by the platform API.
//!
//! These are request descriptors only: an endpoint, a JSON body, and the
//! activity-log record that accompanies a successful submission. Sending
//! them is the caller's concern.

use crate::error::{AdminError, Result};
use crate::types::LogKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// HTTP method of a mutation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub price: f64,
    pub message_limit: i64,
    pub trial_days: i64,
    pub is_active: bool,
    pub is_lifetime: bool,
    pub auto_reset_quota: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percent: f64,
    pub max_usage: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStaff {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// One administrative mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    UpdateMessageLimit { chatbot_id: i64, message_limit: i64 },
    AddTemporaryBoost { chatbot_id: i64, additional_messages: i64 },
    UpdateGracePeriod { chatbot_id: i64, grace_period_days: i64 },
    SetSending { chatbot_id: i64, enabled: bool },
    AssignLifetime { chatbot_id: i64 },
    RevokeLifetime { chatbot_id: i64 },
    DeletePlan { plan_id: i64 },
    CreatePlan(NewPlan),
    CreateCoupon(NewCoupon),
    CreateStaff(NewStaff),
}

impl AdminCommand {
    /// Reject values the API would refuse.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(AdminError::InvalidCommand(msg.to_string()));
        match self {
            AdminCommand::UpdateMessageLimit { message_limit, .. } if *message_limit < 0 => {
                invalid("message limit cannot be negative")
            }
            AdminCommand::AddTemporaryBoost {
                additional_messages,
                ..
            } if *additional_messages <= 0 => invalid("boost must be at least one message"),
            AdminCommand::UpdateGracePeriod {
                grace_period_days, ..
            } if *grace_period_days < 0 => invalid("grace period cannot be negative"),
            AdminCommand::CreatePlan(plan) => {
                if plan.name.trim().is_empty() {
                    invalid("plan name is required")
                } else if plan.price < 0.0 || plan.message_limit < 0 || plan.trial_days < 0 {
                    invalid("plan price, message limit and trial days cannot be negative")
                } else {
                    Ok(())
                }
            }
            AdminCommand::CreateCoupon(coupon) => {
                if coupon.code.trim().is_empty() {
                    invalid("coupon code is required")
                } else if !(0.0..=100.0).contains(&coupon.discount_percent) {
                    invalid("discount must be between 0 and 100 percent")
                } else if coupon.max_usage < 0 {
                    invalid("max usage cannot be negative")
                } else {
                    Ok(())
                }
            }
            AdminCommand::CreateStaff(staff) => {
                if !staff.email.contains('@') {
                    invalid("staff email is not valid")
                } else if staff.username.trim().is_empty() || staff.password.is_empty() {
                    invalid("staff username and password are required")
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            AdminCommand::DeletePlan { .. } => Method::Delete,
            _ => Method::Post,
        }
    }

    /// Endpoint path relative to the API base.
    pub fn endpoint(&self) -> String {
        match self {
            AdminCommand::UpdateMessageLimit { chatbot_id, .. } => {
                format!("/chatbots/{}/update-message-limit/", chatbot_id)
            }
            AdminCommand::AddTemporaryBoost { chatbot_id, .. } => {
                format!("/chatbots/{}/temporary-boost/", chatbot_id)
            }
            AdminCommand::UpdateGracePeriod { chatbot_id, .. } => {
                format!("/chatbots/{}/update-grace-period/", chatbot_id)
            }
            AdminCommand::SetSending { chatbot_id, .. } => {
                format!("/chatbots/{}/update-sending-status/", chatbot_id)
            }
            AdminCommand::AssignLifetime { chatbot_id } => {
                format!("/chatbots/{}/lifetime-plan/", chatbot_id)
            }
            AdminCommand::RevokeLifetime { chatbot_id } => {
                format!("/chatbots/{}/revoke-lifetime/", chatbot_id)
            }
            AdminCommand::DeletePlan { plan_id } => {
                format!("/subscription-plans/{}/delete/", plan_id)
            }
            AdminCommand::CreatePlan(_) => "/subscription-plans/create/".into(),
            AdminCommand::CreateCoupon(_) => "/set/coupon-codes/".into(),
            AdminCommand::CreateStaff(_) => "/staff/create/".into(),
        }
    }

    /// JSON request body, if the endpoint takes one.
    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            AdminCommand::UpdateMessageLimit { message_limit, .. } => {
                Some(json!({ "message_limit": message_limit }))
            }
            AdminCommand::AddTemporaryBoost {
                additional_messages,
                ..
            } => Some(json!({ "additional_messages": additional_messages })),
            AdminCommand::UpdateGracePeriod {
                grace_period_days, ..
            } => Some(json!({ "grace_period_days": grace_period_days })),
            AdminCommand::SetSending { enabled, .. } => {
                Some(json!({ "is_sending_enabled": enabled }))
            }
            AdminCommand::AssignLifetime { .. }
            | AdminCommand::RevokeLifetime { .. }
            | AdminCommand::DeletePlan { .. } => None,
            AdminCommand::CreatePlan(plan) => serde_json::to_value(plan).ok(),
            AdminCommand::CreateCoupon(coupon) => serde_json::to_value(coupon).ok(),
            AdminCommand::CreateStaff(staff) => serde_json::to_value(staff).ok(),
        }
    }

    pub fn log_kind(&self) -> LogKind {
        match self {
            AdminCommand::UpdateMessageLimit { .. } => LogKind::PlanUpdate,
            AdminCommand::AddTemporaryBoost { .. } => LogKind::BoostAdded,
            AdminCommand::UpdateGracePeriod { .. } | AdminCommand::SetSending { .. } => {
                LogKind::SettingChanged
            }
            AdminCommand::AssignLifetime { .. } | AdminCommand::RevokeLifetime { .. } => {
                LogKind::PlanActivation
            }
            AdminCommand::DeletePlan { .. }
            | AdminCommand::CreatePlan(_)
            | AdminCommand::CreateCoupon(_) => LogKind::PlanUpdate,
            AdminCommand::CreateStaff(_) => LogKind::StaffCreated,
        }
    }

    /// Human-readable description for the activity log.
    pub fn description(&self) -> String {
        match self {
            AdminCommand::UpdateMessageLimit {
                chatbot_id,
                message_limit,
            } => format!(
                "Updated message limit for chatbot #{} to {}",
                chatbot_id, message_limit
            ),
            AdminCommand::AddTemporaryBoost {
                chatbot_id,
                additional_messages,
            } => format!(
                "Added temporary boost of {} messages to chatbot #{}",
                additional_messages, chatbot_id
            ),
            AdminCommand::UpdateGracePeriod {
                chatbot_id,
                grace_period_days,
            } => format!(
                "Updated grace period for chatbot #{} to {} days",
                chatbot_id, grace_period_days
            ),
            AdminCommand::SetSending {
                chatbot_id,
                enabled,
            } => format!(
                "{} message sending for chatbot #{}",
                if *enabled { "Enabled" } else { "Disabled" },
                chatbot_id
            ),
            AdminCommand::AssignLifetime { chatbot_id } => {
                format!("Assigned lifetime plan for chatbot #{}", chatbot_id)
            }
            AdminCommand::RevokeLifetime { chatbot_id } => {
                format!("Revoked lifetime plan for chatbot #{}", chatbot_id)
            }
            AdminCommand::DeletePlan { plan_id } => {
                format!("Deleted subscription plan #{}", plan_id)
            }
            AdminCommand::CreatePlan(plan) => {
                format!("Created subscription plan: {}", plan.name)
            }
            AdminCommand::CreateCoupon(coupon) => format!(
                "Created coupon {} ({}% off)",
                coupon.code, coupon.discount_percent
            ),
            AdminCommand::CreateStaff(staff) => {
                format!("Created staff account: {}", staff.email)
            }
        }
    }

    /// Metadata attached to the activity log entry. Never includes secrets.
    pub fn metadata(&self) -> serde_json::Value {
        match self {
            AdminCommand::CreateStaff(staff) => json!({
                "command": "create_staff",
                "email": staff.email,
                "username": staff.username,
            }),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_limit_descriptor() {
        let cmd = AdminCommand::UpdateMessageLimit {
            chatbot_id: 12,
            message_limit: 5000,
        };
        assert_eq!(cmd.method(), Method::Post);
        assert_eq!(cmd.endpoint(), "/chatbots/12/update-message-limit/");
        assert_eq!(cmd.body().unwrap(), json!({"message_limit": 5000}));
        assert_eq!(cmd.log_kind(), LogKind::PlanUpdate);
        assert_eq!(
            cmd.description(),
            "Updated message limit for chatbot #12 to 5000"
        );
    }

    #[test]
    fn test_sending_toggle_body() {
        let cmd = AdminCommand::SetSending {
            chatbot_id: 3,
            enabled: false,
        };
        assert_eq!(cmd.body().unwrap(), json!({"is_sending_enabled": false}));
        assert_eq!(cmd.description(), "Disabled message sending for chatbot #3");
    }

    #[test]
    fn test_lifetime_commands_have_no_body() {
        let assign = AdminCommand::AssignLifetime { chatbot_id: 8 };
        let revoke = AdminCommand::RevokeLifetime { chatbot_id: 8 };
        assert!(assign.body().is_none());
        assert_eq!(assign.endpoint(), "/chatbots/8/lifetime-plan/");
        assert_eq!(revoke.endpoint(), "/chatbots/8/revoke-lifetime/");
        assert_eq!(revoke.log_kind(), LogKind::PlanActivation);
    }

    #[test]
    fn test_delete_plan_uses_delete() {
        let cmd = AdminCommand::DeletePlan { plan_id: 2 };
        assert_eq!(cmd.method(), Method::Delete);
        assert_eq!(cmd.endpoint(), "/subscription-plans/2/delete/");
    }

    #[test]
    fn test_create_plan_body_matches_api_shape() {
        let cmd = AdminCommand::CreatePlan(NewPlan {
            name: "Pro".into(),
            price: 5000.0,
            message_limit: 10000,
            trial_days: 14,
            is_active: true,
            is_lifetime: false,
            auto_reset_quota: true,
        });
        let body = cmd.body().unwrap();
        assert_eq!(body["name"], "Pro");
        assert_eq!(body["message_limit"], 10000);
        assert_eq!(body["auto_reset_quota"], true);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AdminCommand::UpdateMessageLimit {
            chatbot_id: 1,
            message_limit: -1
        }
        .validate()
        .is_err());
        assert!(AdminCommand::AddTemporaryBoost {
            chatbot_id: 1,
            additional_messages: 0
        }
        .validate()
        .is_err());
        assert!(AdminCommand::CreateCoupon(NewCoupon {
            code: "BIG".into(),
            discount_percent: 150.0,
            max_usage: 1,
            is_active: true,
        })
        .validate()
        .is_err());
        assert!(AdminCommand::AssignLifetime { chatbot_id: 1 }.validate().is_ok());
        assert!(AdminCommand::UpdateMessageLimit {
            chatbot_id: 1,
            message_limit: 0
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_staff_metadata_omits_password() {
        let cmd = AdminCommand::CreateStaff(NewStaff {
            email: "ops@wish.test".into(),
            username: "ops".into(),
            password: "hunter2".into(),
            first_name: "Op".into(),
            last_name: "Erator".into(),
        });
        let metadata = cmd.metadata().to_string();
        assert!(metadata.contains("ops@wish.test"));
        assert!(!metadata.contains("hunter2"));
        assert_eq!(cmd.log_kind(), LogKind::StaffCreated);
    }
}
