//! The content of `m.room.message` events, discriminated by their `msgtype`.

use serde::{Deserialize, Serialize};

pub const TEXT_MSGTYPE: &str = "m.text";
pub const EMOTE_MSGTYPE: &str = "m.emote";
pub const NOTICE_MSGTYPE: &str = "m.notice";
pub const IMAGE_MSGTYPE: &str = "m.image";
pub const VIDEO_MSGTYPE: &str = "m.video";
pub const FILE_MSGTYPE: &str = "m.file";
pub const TX_MSGTYPE: &str = "m.tx";
pub const CLAIM_MSGTYPE: &str = "m.claim";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msgtype")]
pub enum MessageContent {
    #[serde(rename = "m.text")]
    Text(TextContent),
    #[serde(rename = "m.emote")]
    Emote(TextContent),
    #[serde(rename = "m.notice")]
    Notice(TextContent),
    #[serde(rename = "m.image")]
    Image(MediaContent),
    #[serde(rename = "m.video")]
    Video(MediaContent),
    #[serde(rename = "m.file")]
    File(MediaContent),
    #[serde(rename = "m.tx")]
    Tx(TxContent),
    #[serde(rename = "m.claim")]
    Claim(ClaimContent),
    /// Any `msgtype` this client doesn't know how to render.
    #[serde(other)]
    Unknown,
}

impl MessageContent {
    pub fn msgtype(&self) -> Option<&'static str> {
        Some(match self {
            Self::Text(_) => TEXT_MSGTYPE,
            Self::Emote(_) => EMOTE_MSGTYPE,
            Self::Notice(_) => NOTICE_MSGTYPE,
            Self::Image(_) => IMAGE_MSGTYPE,
            Self::Video(_) => VIDEO_MSGTYPE,
            Self::File(_) => FILE_MSGTYPE,
            Self::Tx(_) => TX_MSGTYPE,
            Self::Claim(_) => CLAIM_MSGTYPE,
            Self::Unknown => return None,
        })
    }

    /// The plaintext body (or fallback description) of this message.
    pub fn body(&self) -> &str {
        match self {
            Self::Text(c) | Self::Emote(c) | Self::Notice(c) => &c.body,
            Self::Image(c) | Self::Video(c) | Self::File(c) => &c.body,
            Self::Tx(c) => &c.body,
            Self::Claim(c) => &c.body,
            Self::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MediaInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    /// Duration of a video, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_info: Option<Box<MediaInfo>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// A token transfer posted into the room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxContent {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<u32>,
    #[serde(default)]
    pub token_data: Option<TokenData>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A claim of a previously posted token transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimContent {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_msgtype_deserializes_to_unknown() {
        let content: MessageContent =
            serde_json::from_str(r#"{ "msgtype": "m.location", "body": "here", "geo_uri": "geo:0,0" }"#).unwrap();
        assert_eq!(content, MessageContent::Unknown);
        assert_eq!(content.msgtype(), None);
    }

    #[test]
    fn tx_content_uses_camel_case_fields() {
        let content: MessageContent = serde_json::from_str(
            r#"{ "msgtype": "m.tx", "body": "gift", "txHash": "0xabc", "type": 1,
                 "tokenData": { "name": "GG" }, "value": "0.2BTC" }"#,
        ).unwrap();
        let MessageContent::Tx(tx) = content else { panic!("expected a tx message") };
        assert_eq!(tx.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(tx.kind, Some(1));
        assert_eq!(tx.token_data.and_then(|t| t.name).as_deref(), Some("GG"));
    }
}
