//! Messages posted by the wizard frame.
//!
//! Two encodings are accepted: the legacy plain strings (`CLOSE_IFRAME`,
//! `dealId:<id>`, `applicantInfo:<json>`) and a tagged JSON object
//! `{"type": "...", "value": ...}` using the same tags.

use serde::Deserialize;

use crate::error::MessageError;

const DEAL_ID_TAG: &str = "dealId:";
const APPLICANT_INFO_TAG: &str = "applicantInfo:";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FrameMessage {
    #[serde(rename = "CLOSE_IFRAME")]
    CloseFrame,
    #[serde(rename = "ENABLE_OVERLAY_CLICK")]
    EnableOverlayClick,
    #[serde(rename = "DISABLE_OVERLAY_CLICK")]
    DisableOverlayClick,
    #[serde(rename = "dealId")]
    DealId(String),
    /// Contact details the applicant entered in the wizard.
    #[serde(rename = "applicantInfo")]
    ApplicantInfo(serde_json::Value),
}

impl FrameMessage {
    /// Decodes one posted message.
    ///
    /// Returns `Ok(None)` for messages that are not part of the protocol;
    /// host pages routinely receive unrelated `postMessage` traffic.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] when a message carries one of our tags but
    /// its value cannot be decoded.
    pub fn parse(raw: &str) -> Result<Option<Self>, MessageError> {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(MessageError::InvalidEnvelope);
        }

        match trimmed {
            "CLOSE_IFRAME" => return Ok(Some(FrameMessage::CloseFrame)),
            "ENABLE_OVERLAY_CLICK" => return Ok(Some(FrameMessage::EnableOverlayClick)),
            "DISABLE_OVERLAY_CLICK" => return Ok(Some(FrameMessage::DisableOverlayClick)),
            _ => {}
        }

        if let Some(rest) = trimmed.strip_prefix(DEAL_ID_TAG) {
            let id = rest.split(':').next().unwrap_or_default().trim();
            if id.is_empty() {
                return Err(MessageError::MissingValue { tag: "dealId" });
            }
            return Ok(Some(FrameMessage::DealId(id.to_owned())));
        }

        if let Some(rest) = trimmed.strip_prefix(APPLICANT_INFO_TAG) {
            let body = rest.trim_start();
            if body.is_empty() {
                return Err(MessageError::MissingValue {
                    tag: "applicantInfo",
                });
            }
            let value = serde_json::from_str(body).map_err(MessageError::InvalidApplicant)?;
            return Ok(Some(FrameMessage::ApplicantInfo(value)));
        }

        Ok(None)
    }
}
