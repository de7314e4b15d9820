use serde::{ Serialize, Deserialize };

use super::chat::{ Role, Turn };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "turn")] Turn {
        role: Role,
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
}

impl From<&Turn> for ServerMessage {
    fn from(turn: &Turn) -> Self {
        ServerMessage::Turn {
            role: turn.role(),
            content: turn.content().to_string(),
            timestamp: turn.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_frame() {
        let msg: ClientMessage = serde_json
            ::from_str(r#"{"type":"chat","content":"안녕"}"#)
            .unwrap();
        let ClientMessage::Chat { content } = msg;
        assert_eq!(content, "안녕");
    }

    #[test]
    fn turn_frame_is_tagged() {
        let json = serde_json::to_value(ServerMessage::from(&Turn::user("hello"))).unwrap();
        assert_eq!(json["type"], "turn");
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn processing_frame_has_only_type() {
        let json = serde_json::to_string(&ServerMessage::Processing).unwrap();
        assert_eq!(json, r#"{"type":"processing"}"#);
    }
}
