//! Newline-delimited JSON block messages
//!
//! One message per line, from stdin or a file/FIFO. A queue consumer that
//! writes each delivery as a line can sit on the other end of a FIFO.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use super::MessageSource;
use crate::error::{ExtractorError, Result};
use crate::models::BlockMessage;

pub struct JsonLinesSource<R> {
    name: String,
    lines: Lines<R>,
    line_no: u64,
    delivered: u64,
    acknowledged: u64,
    closed: bool,
}

impl JsonLinesSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::from_reader("stdin", BufReader::new(tokio::io::stdin()))
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        Ok(Self::from_reader(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn from_reader(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
            line_no: 0,
            delivered: 0,
            acknowledged: 0,
            closed: false,
        }
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for JsonLinesSource<R> {
    fn describe(&self) -> String {
        format!("JSON lines from {}", self.name)
    }

    async fn next_message(&mut self) -> Result<Option<BlockMessage>> {
        if self.closed {
            return Ok(None);
        }

        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: BlockMessage = serde_json::from_str(line).map_err(|e| {
                ExtractorError::InvalidMessage(format!("{} line {}: {}", self.name, self.line_no, e))
            })?;
            self.delivered += 1;
            debug!(line = self.line_no, height = message.block.height, "Received block message");
            return Ok(Some(message));
        }

        info!(source = %self.name, messages = self.delivered, "End of stream");
        Ok(None)
    }

    async fn acknowledge(&mut self, message: &BlockMessage) -> Result<()> {
        self.acknowledged += 1;
        debug!(height = message.block.height, acknowledged = self.acknowledged, "Acknowledged");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.delivered > self.acknowledged {
            warn!(
                source = %self.name,
                unacknowledged = self.delivered - self.acknowledged,
                "Closing with unacknowledged messages"
            );
        }
        self.closed = true;
        Ok(())
    }
}
