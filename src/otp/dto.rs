use serde::{Deserialize, Serialize};

use super::store::FlowType;

/// Request body for issuing (or re-issuing) a code.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default)]
    pub flow: FlowType,
}

/// Request body for verifying a code. `newPassword` is only read for the
/// forgot-password flow.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(
        rename = "newPassword",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub new_password: Option<String>,
    #[serde(rename = "type", default)]
    pub flow: FlowType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_defaults_to_verification() {
        let req: SendOtpRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert_eq!(req.flow, FlowType::Verification);
    }

    #[test]
    fn verify_reads_camel_case_password() {
        let req: VerifyOtpRequest = serde_json::from_str(
            r#"{"email":"a@b.co","otp":"123456","newPassword":"hunter22","type":"forgot-password"}"#,
        )
        .unwrap();
        assert_eq!(req.new_password.as_deref(), Some("hunter22"));
        assert_eq!(req.flow, FlowType::ForgotPassword);
    }
}
