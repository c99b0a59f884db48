//! Messages handed to the transport.

use crate::error::Result;
use crate::patch::PatchOp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"type": "STATE_FULL", ...}` or `{"type": "STATE_PATCH", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateMessage {
    #[serde(rename = "STATE_FULL")]
    Full {
        #[serde(rename = "revisionId")]
        revision_id: u64,
        data: Value,
    },
    #[serde(rename = "STATE_PATCH")]
    Patch {
        #[serde(rename = "revisionId")]
        revision_id: u64,
        ops: Vec<PatchOp>,
    },
}

impl StateMessage {
    pub fn revision_id(&self) -> u64 {
        match self {
            StateMessage::Full { revision_id, .. } | StateMessage::Patch { revision_id, .. } => {
                *revision_id
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
