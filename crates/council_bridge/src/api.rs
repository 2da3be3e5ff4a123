//! Async host API over the core dispatcher.
//!
//! # Responsibility
//! - Run each command on the blocking pool so scrypt, SQLite and keyring
//!   work never stalls the async runtime.
//! - Serve newline-delimited request frames and write response frames.
//!
//! # Invariants
//! - Requests are independent: no ordering or mutual exclusion between them.
//! - A panicking handler becomes a failure envelope; serving continues.
//! - `serve` returns only after every accepted request has been answered,
//!   including when reading the input fails part way.
//! - An undecodable line is answered with an error frame; serving continues.

use crate::frame::{decode_line, parse_request, BridgeResponse};
use council_core::{CommandName, CredentialStore, Dispatcher, Envelope, RecordStore};
use log::{error, info};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Shared handle to one dispatcher.
pub struct HostBridge<S: CredentialStore, R: RecordStore> {
    dispatcher: Arc<Dispatcher<S, R>>,
}

impl<S: CredentialStore, R: RecordStore> Clone for HostBridge<S, R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S, R> HostBridge<S, R>
where
    S: CredentialStore + 'static,
    R: RecordStore + 'static,
{
    pub fn new(dispatcher: Dispatcher<S, R>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, R> {
        &self.dispatcher
    }

    /// Runs one command off the async runtime.
    ///
    /// # Contract
    /// - Never panics; join failures are reported as failure envelopes.
    pub async fn invoke(&self, command: String, payload: Value) -> Envelope<Value> {
        let label = command
            .parse::<CommandName>()
            .map_or("unknown", CommandName::as_str);
        let dispatcher = Arc::clone(&self.dispatcher);
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(&command, payload)).await {
            Ok(envelope) => envelope,
            Err(err) if err.is_panic() => {
                error!(
                    "event=bridge_invoke module=bridge status=error command={label} error_code=handler_panicked"
                );
                Envelope::err("internal error while handling command")
            }
            Err(_) => {
                error!(
                    "event=bridge_invoke module=bridge status=error command={label} error_code=handler_cancelled"
                );
                Envelope::err("command was cancelled")
            }
        }
    }

    /// Handles one request line and returns the frame to write back.
    pub async fn handle_line(&self, line: &str) -> BridgeResponse {
        match parse_request(line) {
            Ok(request) => {
                let envelope = self.invoke(request.command, request.payload).await;
                BridgeResponse::new(request.id, envelope)
            }
            Err(response) => {
                error!(
                    "event=bridge_frame module=bridge status=error error_code=malformed_frame"
                );
                response
            }
        }
    }

    /// Serves frames from `reader` until EOF, writing responses to `writer`.
    ///
    /// Responses are written as they complete, so they may arrive out of
    /// request order.
    pub async fn serve<Rd, W>(&self, mut reader: Rd, writer: W) -> io::Result<()>
    where
        Rd: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("event=bridge_serve module=bridge status=start");
        let (tx, rx) = mpsc::unbounded_channel::<BridgeResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut accepted = 0_u64;
        let mut raw = Vec::new();
        let read_result = loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(err) => break Err(err),
            }
            let line = match decode_line(&raw) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => line.to_string(),
                Err(response) => {
                    error!(
                        "event=bridge_frame module=bridge status=error error_code=invalid_utf8"
                    );
                    accepted += 1;
                    let _ = tx.send(response);
                    continue;
                }
            };
            accepted += 1;
            let bridge = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = bridge.handle_line(&line).await;
                // Receiver only closes once the writer failed; that error is reported below.
                let _ = tx.send(response);
            });
        };
        drop(tx);

        let written = writer_task
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??;
        if let Err(err) = read_result {
            error!(
                "event=bridge_serve module=bridge status=error error_code=read_failed accepted={accepted} written={written}"
            );
            return Err(err);
        }
        info!(
            "event=bridge_serve module=bridge status=ok accepted={accepted} written={written}"
        );
        Ok(())
    }
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<BridgeResponse>,
    mut writer: W,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0_u64;
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}
