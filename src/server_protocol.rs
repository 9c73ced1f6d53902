use serde_json::Value;

use crate::types::Direction;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    CreateRoom { name: String },
    JoinRoom { code: String, name: String },
    Start,
    Input { dir: Direction },
    Leave,
    Resync,
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "create_room" => {
            let name = parse_optional_string(object.get("name"))?;
            Some(ParsedClientMessage::CreateRoom { name })
        }
        "join_room" => {
            let code = object.get("code")?.as_str()?.to_string();
            let name = parse_optional_string(object.get("name"))?;
            Some(ParsedClientMessage::JoinRoom { code, name })
        }
        "start" => Some(ParsedClientMessage::Start),
        "input" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Input { dir })
        }
        "leave" => Some(ParsedClientMessage::Leave),
        "resync" => Some(ParsedClientMessage::Resync),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

// Absent and null both mean "no name"; any other non-string rejects the message.
fn parse_optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(value) => Some(value.as_str()?.to_string()),
    }
}
