use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{
    aof::AofError,
    input::{CommandReadError, CommandReader},
    resp::RespValue,
    server::{CommandResult, Server},
};

/// Serves one client until it quits, disconnects, sends malformed input or
/// stops accepting replies.
///
/// Replies are buffered and pushed out at the flush points reported by the
/// reader, right after the staged write commands reach the append-only file.
/// Only append-only file failures are returned; they are fatal to the server.
pub async fn handle_client_connection(
    stream: TcpStream,
    server: Arc<Server>,
    client_address: String,
) -> Result<(), AofError> {
    debug!("client {} connected", client_address);

    let (reader, writer) = stream.into_split();
    let mut reader = CommandReader::new(reader);
    let mut writer = BufWriter::new(writer);

    loop {
        let command = match reader.read_command().await {
            Ok(Some(command)) => command,
            Ok(None) => break,
            Err(CommandReadError::Protocol(e)) => {
                debug!("client {}: {}", client_address, e);
                if let Err(e) = writer.write_all(&e.to_resp().encode()).await {
                    debug!("client {}: error writing error reply: {}", client_address, e);
                }
                break;
            }
            Err(e) => {
                debug!("client {}: {}", client_address, e);
                break;
            }
        };

        let reply = match server.execute(&command).await {
            CommandResult::NoResponse => None,
            CommandResult::Response(reply) => Some(reply),
            CommandResult::Quit => {
                let ok = RespValue::SimpleString("OK".to_string()).encode();
                if let Err(e) = writer.write_all(&ok).await {
                    debug!("client {}: error writing reply: {}", client_address, e);
                }
                break;
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = writer.write_all(&reply.encode()).await {
                debug!("client {}: error writing reply: {}", client_address, e);
                break;
            }
        }

        if command.flush {
            server.flush_aof().await?;

            if let Err(e) = writer.flush().await {
                debug!("client {}: error flushing replies: {}", client_address, e);
                break;
            }
        }
    }

    server.flush_aof().await?;
    if let Err(e) = writer.flush().await {
        debug!("client {}: error flushing replies: {}", client_address, e);
    }

    debug!("client {} disconnected", client_address);

    Ok(())
}
