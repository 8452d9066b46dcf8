use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};
use shared_memory::{Shmem, ShmemConf, ShmemError};
use tracing::info;

use crate::buffer::UnsafeBuffer;
use crate::descriptor::{self, MIN_LOG_SIZE, STATE_BUFFER_LENGTH};
use crate::errors::LogBufferError;

pub static DEFAULT_FILE_NAME: &str = "logbuffer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBufferConfig {
    pub data_dir: String,
    pub file_name: String,
    pub log_capacity: usize,
    pub max_frame_length: usize,
}

impl Default for LogBufferConfig {
    fn default() -> LogBufferConfig {
        LogBufferConfig {
            data_dir: "/dev/shm".to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            log_capacity: MIN_LOG_SIZE,
            max_frame_length: 1024,
        }
    }
}

impl LogBufferConfig {
    pub fn flink_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.file_name)
    }

    /// State region followed by the log region.
    pub fn mapped_length(&self) -> usize {
        STATE_BUFFER_LENGTH + self.log_capacity
    }
}

/// A shared memory segment holding one state region and one log region.
///
/// The creating process owns the segment and removes it on drop. Newly created segments are
/// zeroed, which is the state an appender expects after rotation.
pub struct MappedLogBuffers {
    shmem: Shmem,
    log_capacity: usize,
}

impl MappedLogBuffers {
    /// Creates the segment, or opens it when another process already created it.
    pub fn create(cfg: &LogBufferConfig) -> Result<MappedLogBuffers, LogBufferError> {
        descriptor::check_log_capacity(cfg.log_capacity)?;
        let path = cfg.flink_path();
        match ShmemConf::new()
            .size(cfg.mapped_length())
            .flink(&path)
            .create()
        {
            Ok(shmem) => {
                info!(path = %path.display(), length = shmem.len(), "created log buffers");
                Ok(MappedLogBuffers {
                    shmem,
                    log_capacity: cfg.log_capacity,
                })
            }
            Err(ShmemError::LinkExists) => MappedLogBuffers::open(cfg),
            Err(e) => Err(e.into()),
        }
    }

    pub fn open(cfg: &LogBufferConfig) -> Result<MappedLogBuffers, LogBufferError> {
        descriptor::check_log_capacity(cfg.log_capacity)?;
        let path = cfg.flink_path();
        let shmem = ShmemConf::new().flink(&path).open()?;
        if shmem.len() < cfg.mapped_length() {
            return Err(LogBufferError::IllegalState(format!(
                "Mapped length {} less than required {} for {}",
                shmem.len(),
                cfg.mapped_length(),
                path.display()
            )));
        }
        info!(path = %path.display(), length = shmem.len(), "opened log buffers");
        Ok(MappedLogBuffers {
            shmem,
            log_capacity: cfg.log_capacity,
        })
    }

    pub fn is_owner(&self) -> bool {
        self.shmem.is_owner()
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    pub fn state_buffer(&self) -> Result<UnsafeBuffer<'_>, LogBufferError> {
        unsafe { UnsafeBuffer::from_raw_parts(self.shmem.as_ptr(), STATE_BUFFER_LENGTH) }
    }

    pub fn log_buffer(&self) -> Result<UnsafeBuffer<'_>, LogBufferError> {
        unsafe {
            UnsafeBuffer::from_raw_parts(
                self.shmem.as_ptr().add(STATE_BUFFER_LENGTH),
                self.log_capacity,
            )
        }
    }
}
