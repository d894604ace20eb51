use std::{
    collections::VecDeque,
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::{debug, warn};
use tokio::{
    io::{AsyncSeekExt, AsyncWriteExt},
    sync::mpsc,
};

use crate::{sync::transfer::error::TransferError, types::SessionId};

enum SpillCommand {
    Write { offset: u64, bytes: Vec<u8> },
    Remove,
}

enum SpillCompletion {
    Written,
    Failed(String),
}

/// A receive buffer backed by a temporary file.
///
/// Writes run on a background thread, strictly one after another in the order
/// they were queued; completions are collected here and picked up by
/// [`SpillFile::poll`] on the simulation tick. The file is removed on drop.
pub struct SpillFile {
    path: PathBuf,
    commands: mpsc::UnboundedSender<SpillCommand>,
    completions: Arc<Mutex<VecDeque<SpillCompletion>>>,
    queued: usize,
    failure: Option<String>,
}

impl SpillFile {
    pub fn create(dir: &Path, session: SessionId, total_length: u64) -> Result<Self, TransferError> {
        let path = dir.join(format!(
            "tilesync-{:016x}-{}.spill",
            fastrand::u64(..),
            session
        ));
        let (commands, receiver) = mpsc::unbounded_channel();
        let completions = Arc::new(Mutex::new(VecDeque::new()));

        let thread_path = path.clone();
        let thread_completions = completions.clone();
        std::thread::Builder::new()
            .name(format!("tilesync-spill-{}", session))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(error) => {
                        push_completion(
                            &thread_completions,
                            SpillCompletion::Failed(format!("cannot start spill runtime: {}", error)),
                        );
                        return;
                    }
                };
                runtime.block_on(run_writer(
                    thread_path,
                    total_length,
                    receiver,
                    thread_completions,
                ));
            })
            .map_err(|error| TransferError::SpillIo {
                reason: format!("cannot spawn spill writer: {}", error),
            })?;

        debug!("spilling session {} ({} bytes) to {}", session, total_length, path.display());
        Ok(Self {
            path,
            commands,
            completions,
            queued: 0,
            failure: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue `bytes` to be written at `offset`
    pub fn write(&mut self, offset: u64, bytes: Vec<u8>) -> Result<(), TransferError> {
        self.commands
            .send(SpillCommand::Write { offset, bytes })
            .map_err(|_| TransferError::SpillIo {
                reason: "spill writer has stopped".to_string(),
            })?;
        self.queued += 1;
        Ok(())
    }

    /// Collect finished writes. Fails once any write has failed.
    pub fn poll(&mut self) -> Result<(), TransferError> {
        let drained: Vec<SpillCompletion> = match self.completions.lock() {
            Ok(mut completions) => completions.drain(..).collect(),
            Err(_) => {
                return Err(TransferError::SpillIo {
                    reason: "spill completion queue poisoned".to_string(),
                })
            }
        };
        for completion in drained {
            match completion {
                SpillCompletion::Written => self.queued = self.queued.saturating_sub(1),
                SpillCompletion::Failed(reason) => {
                    self.failure.get_or_insert(reason);
                }
            }
        }
        match &self.failure {
            Some(reason) => Err(TransferError::SpillIo {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Every queued write has landed
    pub fn is_idle(&self) -> bool {
        self.queued == 0
    }

    pub fn queued_writes(&self) -> usize {
        self.queued
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        // the writer thread may already be gone after a failure
        let _ = self.commands.send(SpillCommand::Remove);
    }
}

fn push_completion(completions: &Arc<Mutex<VecDeque<SpillCompletion>>>, completion: SpillCompletion) {
    if let Ok(mut queue) = completions.lock() {
        queue.push_back(completion);
    }
}

async fn run_writer(
    path: PathBuf,
    total_length: u64,
    mut commands: mpsc::UnboundedReceiver<SpillCommand>,
    completions: Arc<Mutex<VecDeque<SpillCompletion>>>,
) {
    let mut file = match tokio::fs::File::create(&path).await {
        Ok(file) => file,
        Err(error) => {
            push_completion(
                &completions,
                SpillCompletion::Failed(format!("cannot create {}: {}", path.display(), error)),
            );
            return;
        }
    };
    if let Err(error) = file.set_len(total_length).await {
        push_completion(
            &completions,
            SpillCompletion::Failed(format!("cannot size {}: {}", path.display(), error)),
        );
    }

    while let Some(command) = commands.recv().await {
        match command {
            SpillCommand::Write { offset, bytes } => {
                let result = async {
                    file.seek(SeekFrom::Start(offset)).await?;
                    file.write_all(&bytes).await?;
                    file.flush().await
                }
                .await;
                let completion = match result {
                    Ok(()) => SpillCompletion::Written,
                    Err(error) => SpillCompletion::Failed(format!(
                        "writing {} bytes at {} to {}: {}",
                        bytes.len(),
                        offset,
                        path.display(),
                        error
                    )),
                };
                push_completion(&completions, completion);
            }
            SpillCommand::Remove => break,
        }
    }

    drop(file);
    if let Err(error) = tokio::fs::remove_file(&path).await {
        warn!("could not remove spill file {}: {}", path.display(), error);
    }
}
