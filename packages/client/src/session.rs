//! WebSocket client session management.

use futures_util::{SinkExt, StreamExt};
use lapak_server::infrastructure::dto::websocket::ServerEvent;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message},
};

use crate::{command::Command, error::ClientError};

use super::{
    formatter::MessageFormatter,
    ui::{prompt, redisplay_prompt},
};

/// Run one WebSocket client session
///
/// Returns `Ok(())` when the user quits, an error when the connection is lost or refused.
pub async fn run_client_session(url: &str, user_id: u64) -> Result<(), ClientError> {
    let url = format!("{}?user_id={}", url, user_id);

    let (ws_stream, _response) = match connect_async(&url).await {
        Ok(result) => result,
        Err(WsError::Http(response)) if response.status().is_client_error() => {
            return Err(ClientError::Rejected(response.status().as_u16()));
        }
        Err(e) => return Err(ClientError::ConnectionError(e.to_string())),
    };

    tracing::info!("Connected to chat server!");
    println!(
        "\nYou are user {}. Commands: /join <room>, /leave, /read <id>, /quit. \
         Any other line is sent to the joined room.\n",
        user_id
    );

    let (mut write, mut read) = ws_stream.split();

    // Spawn a task to handle incoming messages
    let mut read_task = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let formatted = match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => MessageFormatter::format_event(&event, user_id),
                        Err(_) => MessageFormatter::format_raw_message(text.as_str()),
                    };
                    print!("{}", formatted);
                    redisplay_prompt(user_id);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    break;
                }
                // pings are answered by tungstenite
                _ => {}
            }
        }
    });

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = prompt(user_id);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    let _ = input_tx.send("/quit".to_string());
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    let _ = input_tx.send("/quit".to_string());
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to turn input lines into frames; true on a write failure
    let mut write_task = tokio::spawn(async move {
        let mut active_room: Option<u64> = None;

        while let Some(line) = input_rx.recv().await {
            let frame = Command::parse(&line).and_then(|command| {
                let frame = command.to_frame(active_room)?;
                match command {
                    Command::Join(room) => active_room = Some(room),
                    Command::Leave => active_room = None,
                    _ => {}
                }
                Ok(frame)
            });

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    let _ = write.send(Message::Close(None)).await;
                    return false;
                }
                Err(e) => {
                    println!("{}", e);
                    redisplay_prompt(user_id);
                    continue;
                }
            };

            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if let Err(e) = write.send(Message::text(json)).await {
                tracing::warn!("Failed to send message: {}", e);
                return true;
            }
        }

        false
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
            Err(ClientError::ConnectionError("Connection lost".to_string()))
        }
        write_result = &mut write_task => {
            read_task.abort();
            if write_result.unwrap_or(false) {
                return Err(ClientError::ConnectionError("Connection lost".to_string()));
            }
            Ok(())
        }
    }
}
