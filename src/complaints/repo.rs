use std::{
    collections::HashMap,
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, info};

use super::repo_types::{Complaint, NotificationStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("complaint {0} not found")]
    NotFound(String),
    #[error("reference {0} already exists")]
    Duplicate(String),
    #[error("complaint store i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),
    #[error("complaint store document is invalid: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("complaint store is closed")]
    Closed,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Append {
        complaint: Complaint,
        reply: Reply<()>,
    },
    Find {
        reference: String,
        reply: Reply<Complaint>,
    },
    SetNotification {
        reference: String,
        status: NotificationStatus,
        reply: Reply<()>,
    },
}

/// Handle to the complaint collection.
///
/// A single worker task owns the records and the backing JSON file; every
/// read and write is a message to it, so mutations never interleave. The
/// file is replaced through a temp file and rename, so a crash mid-write
/// leaves the previous document intact.
#[derive(Clone)]
pub struct ComplaintStore {
    tx: mpsc::Sender<Command>,
}

impl ComplaintStore {
    /// Loads the collection at `path`, creating an empty one if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let complaints = load_or_init(&path).await?;
        info!(path = %path.display(), count = complaints.len(), "complaint store opened");

        let mut index = HashMap::with_capacity(complaints.len());
        for (i, c) in complaints.iter().enumerate() {
            index.entry(c.reference_id.clone()).or_insert(i);
        }

        let (tx, rx) = mpsc::channel(64);
        let worker = StoreWorker {
            path,
            complaints,
            index,
        };
        tokio::spawn(worker.run(rx));
        Ok(Self { tx })
    }

    pub async fn append(&self, complaint: Complaint) -> Result<(), StoreError> {
        self.request(|reply| Command::Append { complaint, reply })
            .await
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Complaint, StoreError> {
        let reference = reference.to_string();
        self.request(|reply| Command::Find { reference, reply })
            .await
    }

    pub async fn set_notification_status(
        &self,
        reference: &str,
        status: NotificationStatus,
    ) -> Result<(), StoreError> {
        let reference = reference.to_string();
        self.request(|reply| Command::SetNotification {
            reference,
            status,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }
}

struct StoreWorker {
    path: PathBuf,
    complaints: Vec<Complaint>,
    index: HashMap<String, usize>,
}

impl StoreWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Append { complaint, reply } => {
                    let _ = reply.send(self.append(complaint).await);
                }
                Command::Find { reference, reply } => {
                    let _ = reply.send(self.find(reference));
                }
                Command::SetNotification {
                    reference,
                    status,
                    reply,
                } => {
                    let _ = reply.send(self.set_notification(reference, status).await);
                }
            }
        }
        debug!(path = %self.path.display(), "complaint store worker stopped");
    }

    async fn append(&mut self, complaint: Complaint) -> Result<(), StoreError> {
        let reference = complaint.reference_id.clone();
        if self.index.contains_key(&reference) {
            return Err(StoreError::Duplicate(reference));
        }
        self.complaints.push(complaint);
        if let Err(e) = persist(&self.path, &self.complaints).await {
            self.complaints.pop();
            error!(error = %e, %reference, "persist failed; append rolled back");
            return Err(e);
        }
        self.index.insert(reference, self.complaints.len() - 1);
        Ok(())
    }

    fn find(&self, reference: String) -> Result<Complaint, StoreError> {
        self.index
            .get(&reference)
            .map(|&i| self.complaints[i].clone())
            .ok_or(StoreError::NotFound(reference))
    }

    async fn set_notification(
        &mut self,
        reference: String,
        status: NotificationStatus,
    ) -> Result<(), StoreError> {
        let Some(&i) = self.index.get(&reference) else {
            return Err(StoreError::NotFound(reference));
        };
        let previous = std::mem::replace(&mut self.complaints[i].notification_status, status);
        if let Err(e) = persist(&self.path, &self.complaints).await {
            self.complaints[i].notification_status = previous;
            error!(error = %e, %reference, "persist failed; notification status rolled back");
            return Err(e);
        }
        Ok(())
    }
}

async fn load_or_init(path: &Path) -> Result<Vec<Complaint>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            persist(path, &[]).await?;
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

async fn persist(path: &Path, complaints: &[Complaint]) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(complaints)?;

    let mut tmp_name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "complaints.json".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&body).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
