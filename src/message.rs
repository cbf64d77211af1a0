//! Commands driving the headless host

use knx_app::EventResponse;

/// Inputs of the host loop: stdin commands plus internal requests
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Host comes to the foreground
    Resume,
    /// Host goes to the background
    Pause,
    /// Configuration change: the host is recreated, the model kept
    Rotate,
    /// Flip a row on or off
    Toggle(i64),
    /// Move a row's slider
    Set { id: i64, value: f64 },
    /// Inject a socket event
    Event(EventResponse),
    Connect,
    Disconnect,
    Back,
    /// Host finishes for good (back navigation)
    Finish,
    Quit,
}

impl Message {
    /// Parse one stdin line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Message>, String> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let message = match command {
            "" => return Ok(None),
            "resume" => Message::Resume,
            "pause" => Message::Pause,
            "rotate" => Message::Rotate,
            "toggle" | "t" => Message::Toggle(parse_id(rest)?),
            "set" | "s" => {
                let mut args = rest.split_whitespace();
                let id = parse_id(args.next().unwrap_or_default())?;
                let value = args
                    .next()
                    .ok_or_else(|| "set needs a value".to_string())?
                    .parse::<f64>()
                    .map_err(|e| format!("invalid value: {e}"))?;
                Message::Set { id, value }
            }
            "event" | "e" => {
                let event = serde_json::from_str::<EventResponse>(rest)
                    .map_err(|e| format!("invalid event json: {e}"))?;
                Message::Event(event)
            }
            "connect" => Message::Connect,
            "disconnect" => Message::Disconnect,
            "back" | "b" => Message::Back,
            "quit" | "q" => Message::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(message))
    }
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>()
        .map_err(|_| format!("invalid device id: {:?}", raw))
}
