//! FileSink - appends chunk bytes to a file

use contracts::{Chunk, ChunkSink, ContractError};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: false,
        }
    }

    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let append = match params.get("append").map(String::as_str) {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => return Err(format!("invalid 'append' value '{}'", other)),
        };

        Ok(Self { path, append })
    }
}

/// Sink that writes chunks to a file, byte for byte
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if config.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&config.path).await?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[{name}].params"), e))?;

        Ok(Self::new(name, config).await?)
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(name, "file already closed"))
    }
}

impl ChunkSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        let result = self.writer()?.write_all(chunk.data()).await;
        if let Err(e) = result {
            error!(sink = %self.name, path = %self.config.path.display(), error = %e, "Write failed");
            return Err(ContractError::sink_write(&self.name, e.to_string()));
        }
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
        }
        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_sink_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("one.log");

        let mut sink = FileSink::new("test_file", FileSinkConfig::new(&path))
            .await
            .unwrap();
        sink.write(&Chunk::text("abc\n")).await.unwrap();
        sink.write(&Chunk::text("def")).await.unwrap();
        sink.flush().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc\ndef");
        assert!(!sink.is_writable());
        assert!(sink.write(&Chunk::from("late")).await.is_err());
    }

    #[tokio::test]
    async fn test_file_sink_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("append.log");
        std::fs::write(&path, "head-").unwrap();

        let config = FileSinkConfig {
            path: path.clone(),
            append: true,
        };
        let mut sink = FileSink::new("append", config).await.unwrap();
        sink.write(&Chunk::from("tail")).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "head-tail");
    }

    #[test]
    fn test_file_sink_config_requires_path() {
        let params = HashMap::new();
        assert!(FileSinkConfig::from_params(&params).is_err());

        let params = HashMap::from([
            ("path".to_string(), "/tmp/x.log".to_string()),
            ("append".to_string(), "maybe".to_string()),
        ]);
        assert!(FileSinkConfig::from_params(&params).is_err());
    }
}
