//! Shared server state, command execution and the accept loop.
//!
//! One [`RwLock`] guards both the keyspace and the buffer of write commands
//! waiting to be appended to the log. Read commands run under the shared
//! lock, write commands under the exclusive lock, and a write command's raw
//! bytes are staged before that exclusive lock is released, so the staged
//! order is the execution order.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::{net::TcpListener, sync::RwLock, task::JoinSet};
use tracing::{error, info, warn};

use crate::{
    aof::{AofError, AppendOnlyFile},
    commands::{command_table, CommandError, CommandHandler, CommandRegistry},
    config::{Config, FsyncPolicy},
    connection::handle_client_connection,
    input::Command,
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Interval of the background sync under the `everysec` policy.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Conditions that stop the whole server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Aof(#[from] AofError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Outcome of executing one command.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    NoResponse,
    Response(RespValue),
    Quit,
}

#[derive(Debug, Default)]
struct Dataset {
    store: KeyValueStore,
    aof_buffer: BytesMut,
}

#[derive(Debug)]
pub struct Server {
    config: Config,
    registry: CommandRegistry,
    dataset: RwLock<Dataset>,
    aof: AppendOnlyFile,
}

impl Server {
    /// Opens the append-only file, replays it and returns a server ready to
    /// accept connections.
    pub async fn open(config: Config) -> Result<Self, ServerError> {
        Self::with_registry(config, command_table()).await
    }

    /// Like [`Server::open`], serving the commands in `registry`.
    pub async fn with_registry(
        config: Config,
        registry: CommandRegistry,
    ) -> Result<Self, ServerError> {
        let aof = AppendOnlyFile::open(&config.appendfilename, config.appendfsync).await?;

        Self::with_aof(config, registry, aof).await
    }

    /// Builds a server over an already opened append-only file, replaying it
    /// first.
    pub async fn with_aof(
        config: Config,
        registry: CommandRegistry,
        aof: AppendOnlyFile,
    ) -> Result<Self, ServerError> {
        info!("{} commands registered", registry.len());

        let mut store = KeyValueStore::new();
        let replayed = aof.load(&registry, &mut store).await?;
        info!(
            "AOF loaded {} commands from {}",
            replayed,
            aof.path().display()
        );

        Ok(Self {
            config,
            registry,
            dataset: RwLock::new(Dataset {
                store,
                aof_buffer: BytesMut::new(),
            }),
            aof,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A copy of the current keyspace.
    pub async fn snapshot(&self) -> KeyValueStore {
        self.dataset.read().await.store.clone()
    }

    /// Executes a decoded command.
    ///
    /// PING and QUIT are answered without touching the keyspace. Everything
    /// else is looked up in the command table and run under the lock its
    /// access mode calls for; successful write commands are staged for the
    /// append-only file.
    pub async fn execute(&self, command: &Command) -> CommandResult {
        let Some((name, arguments)) = command.arguments.split_first() else {
            return CommandResult::NoResponse;
        };

        if name.eq_ignore_ascii_case(b"quit") {
            return CommandResult::Quit;
        }

        if name.eq_ignore_ascii_case(b"ping") {
            return CommandResult::Response(RespValue::SimpleString("PONG".to_string()));
        }

        let Some(spec) = self.registry.lookup(name) else {
            let name = String::from_utf8_lossy(name).into_owned();
            return CommandResult::Response(CommandError::UnknownCommand(name).to_resp());
        };

        let result = match spec.handler() {
            CommandHandler::Read(handler) => {
                let dataset = self.dataset.read().await;
                handler(&dataset.store, arguments)
            }
            CommandHandler::Write(handler) => {
                let mut dataset = self.dataset.write().await;
                let result = handler(&mut dataset.store, arguments);

                if result.is_ok() {
                    dataset.aof_buffer.extend_from_slice(&command.raw);
                }

                result
            }
        };

        CommandResult::Response(result.unwrap_or_else(|e| e.to_resp()))
    }

    /// Moves staged write commands to the append-only file.
    pub async fn flush_aof(&self) -> Result<(), AofError> {
        if self.dataset.read().await.aof_buffer.is_empty() {
            return Ok(());
        }

        // File lock first: whoever swaps the buffer out earlier also writes
        // it earlier.
        let mut writer = self.aof.lock().await;

        let pending = {
            let mut dataset = self.dataset.write().await;

            if dataset.aof_buffer.is_empty() {
                return Ok(());
            }

            dataset.aof_buffer.split().freeze()
        };

        writer.append(&pending).await
    }

    /// Accepts connections until a fatal append-only file error occurs.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        let mut tasks: JoinSet<Result<(), AofError>> = JoinSet::new();

        if self.config.appendfsync == FsyncPolicy::EverySec {
            let server = Arc::clone(&self);
            tasks.spawn(async move { server.aof.sync_every(SYNC_INTERVAL).await });
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, address)) => {
                        tasks.spawn(handle_client_connection(
                            stream,
                            Arc::clone(&self),
                            address.to_string(),
                        ));
                    }
                    Err(e) => warn!("failed to accept connection: {}", e),
                },
                Some(joined) = tasks.join_next() => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!("{}", e);
                        return Err(e.into());
                    }
                    Err(e) => warn!("connection task failed: {}", e),
                },
            }
        }
    }
}

/// Opens the server described by `config` and serves it on `config.addr`.
pub async fn start(config: Config) -> Result<(), ServerError> {
    let server = Arc::new(Server::open(config).await?);

    let addr = server.config().addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("listening on {}", addr);

    server.serve(listener).await
}
