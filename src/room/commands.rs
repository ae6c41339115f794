//! Parsing the text entered into the composer into a message or a slash command.

use crate::{
    errors::SdkError,
    timeline::content::{EMOTE_MSGTYPE, TEXT_MSGTYPE},
};

/// What the composer text asks the room view-model to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    /// Send a message with the given `msgtype` and body.
    Send { msgtype: &'static str, body: String },
    /// Join the room with the given ID or alias.
    Join(String),
    /// The command was invalid; show this error instead of sending anything.
    Error(String),
    /// Nothing to send, e.g. a `/me` without text.
    Nothing,
}

/// Emoticon commands and the text they prefix to their arguments.
const EMOTICON_COMMANDS: [(&str, &str); 4] = [
    ("shrug", "¯\\_(ツ)_/¯"),
    ("tableflip", "(╯°□°）╯︵ ┻━┻"),
    ("unflip", "┬──┬ ノ( ゜-゜ノ)"),
    ("lenny", "( ͡° ͜ʖ ͡°)"),
];

/// Parses composer text.
///
/// Text starting with `//` is sent literally without its first slash.
/// Other text starting with `/` is a command.
pub fn parse_message(text: &str) -> ParsedMessage {
    if let Some(literal) = text.strip_prefix("//") {
        return send(TEXT_MSGTYPE, format!("/{literal}").trim().to_owned());
    }
    let Some(command) = text.strip_prefix('/') else {
        return send(TEXT_MSGTYPE, text.to_owned());
    };
    let mut parts = command.split(' ');
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    match name {
        "me" => send(EMOTE_MSGTYPE, args.join(" ")),
        "join" => match args[..] {
            [room] => ParsedMessage::Join(room.to_owned()),
            _ => ParsedMessage::Error("join syntax: /join <room-id>".to_owned()),
        },
        _ => match EMOTICON_COMMANDS.iter().find(|(command, _)| *command == name) {
            Some((_, emoticon)) => send(TEXT_MSGTYPE, format!("{emoticon} {}", args.join(" "))),
            None => ParsedMessage::Error(format!(
                "no command name \"{name}\". To send the message instead of executing, please type \"/{text}\""
            )),
        },
    }
}

fn send(msgtype: &'static str, body: String) -> ParsedMessage {
    if body.is_empty() {
        ParsedMessage::Nothing
    } else {
        ParsedMessage::Send { msgtype, body }
    }
}

/// Turns a failed `/join` into the message shown to the user.
pub fn join_error_message(room: &str, error: &SdkError) -> String {
    match error.status {
        Some(400) => format!("/join : '{room}' was not legal room ID or room alias"),
        Some(404 | 502) => format!("/join : room '{room}' not found"),
        Some(403) => format!("/join : you're not invited to join '{room}'"),
        _ if error.message == "Internal Server Error" => format!("/join : room '{room}' not found"),
        _ => error.message.clone(),
    }
}
